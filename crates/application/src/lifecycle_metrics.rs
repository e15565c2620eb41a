//! Counters for lifecycle events and the best-effort wrapper used to record them.

use std::future::Future;

use async_trait::async_trait;
use guardrail_core::{AppResult, TenantId};
use tracing::warn;

/// Port for per-tenant lifecycle counters.
#[async_trait]
pub trait LifecycleMetrics: Send + Sync {
    /// Adds `by` to one named counter.
    async fn increment(&self, tenant: &TenantId, metric: &str, by: u64) -> AppResult<()>;
}

/// Awaits a non-critical side effect and logs instead of propagating failure.
pub(crate) async fn best_effort<F>(operation: &'static str, side_effect: F)
where
    F: Future<Output = AppResult<()>>,
{
    if let Err(error) = side_effect.await {
        warn!(operation, error = %error, "best-effort side effect failed");
    }
}
