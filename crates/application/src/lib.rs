//! Application services and ports for tenant data lifecycle.

#![forbid(unsafe_code)]

mod dlq_ports;
mod dlq_redelivery_service;
mod dlq_service;
mod lifecycle_metrics;
mod purge_coordinator;
mod purge_sweep_service;
mod purge_targets;
mod retention_ports;

#[cfg(test)]
mod test_support;

pub use dlq_ports::{DlqDeliveryTransport, DlqQueue, DlqRepository};
pub use dlq_redelivery_service::{DlqRedeliveryService, RedeliveryReport};
pub use dlq_service::DlqService;
pub use lifecycle_metrics::LifecycleMetrics;
pub use purge_coordinator::{ExecutePurgeInput, PurgeCoordinator, PurgeRequest};
pub use purge_sweep_service::{PurgeSweepReport, PurgeSweepService, SWEEP_ACTOR};
pub use purge_targets::{DlqPurgeTarget, NoopPurgeTarget, PurgeTargetRegistry};
pub use retention_ports::{PurgeReceiptRepository, PurgeTarget, ReceiptSigner, RetentionStore};
