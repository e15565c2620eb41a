use std::sync::Arc;

use guardrail_core::{AppError, AppResult, NonEmptyString, TenantId, now_epoch_seconds};
use guardrail_domain::{
    PurgeMode, PurgeReceipt, PurgeReceiptInput, ReceiptMeta, RetentionPolicy,
    RetentionPolicyInput, RetentionResource, StoredPurgeReceipt,
};
use tracing::{debug, info};

use crate::lifecycle_metrics::{LifecycleMetrics, best_effort};
use crate::purge_targets::PurgeTargetRegistry;
use crate::retention_ports::{PurgeReceiptRepository, ReceiptSigner, RetentionStore};

mod execute;
mod plan;
mod receipts;


/// Inputs for one purge execution.
#[derive(Debug, Clone)]
pub struct ExecutePurgeInput {
    /// Tenant whose data is purged.
    pub tenant: TenantId,
    /// Resource kind.
    pub resource: RetentionResource,
    /// Ids to purge, usually the output of `plan`.
    pub ids: Vec<String>,
    /// Skip deletion and only record what would have happened.
    pub dry_run: bool,
    /// Who requested the purge.
    pub actor: String,
    /// Initiation mode.
    pub mode: PurgeMode,
}

/// Ad-hoc purge request received from the admin collaborator.
#[derive(Debug, Clone)]
pub struct PurgeRequest {
    /// Tenant identifier.
    pub tenant: String,
    /// Resource wire name.
    pub resource: String,
    /// Explicit ids; when absent the current expiry plan is used.
    pub ids: Option<Vec<String>>,
    /// Skip deletion.
    pub dry_run: bool,
    /// Requesting actor.
    pub actor: String,
    /// Mode label; unknown labels mean manual.
    pub mode: String,
}

/// Orchestrates policy lookup, target scans, deletion and signed receipts.
#[derive(Clone)]
pub struct PurgeCoordinator {
    policies: Arc<dyn RetentionStore>,
    targets: PurgeTargetRegistry,
    signer: Arc<dyn ReceiptSigner>,
    receipts: Arc<dyn PurgeReceiptRepository>,
    meta: ReceiptMeta,
    max_ids_per_run: usize,
    metrics: Option<Arc<dyn LifecycleMetrics>>,
}

impl PurgeCoordinator {
    /// Creates a coordinator.
    ///
    /// `max_ids_per_run` bounds every plan and execution; zero is raised to one.
    #[must_use]
    pub fn new(
        policies: Arc<dyn RetentionStore>,
        targets: PurgeTargetRegistry,
        signer: Arc<dyn ReceiptSigner>,
        receipts: Arc<dyn PurgeReceiptRepository>,
        meta: ReceiptMeta,
        max_ids_per_run: usize,
    ) -> Self {
        Self {
            policies,
            targets,
            signer,
            receipts,
            meta,
            max_ids_per_run: max_ids_per_run.max(1),
            metrics: None,
        }
    }

    /// Adds optional lifecycle counters.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn LifecycleMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the per-call id bound.
    #[must_use]
    pub fn max_ids_per_run(&self) -> usize {
        self.max_ids_per_run
    }

    /// Validates and stores a policy upsert.
    pub async fn set_policy(&self, input: RetentionPolicyInput) -> AppResult<RetentionPolicy> {
        let policy = RetentionPolicy::from_input(input)?;
        self.policies.set_policy(policy.clone()).await?;
        info!(
            tenant = %policy.tenant,
            resource = %policy.resource,
            ttl_seconds = policy.ttl_seconds,
            enabled = policy.enabled,
            "retention policy updated"
        );

        Ok(policy)
    }

    /// Lists stored policies for one tenant or for all tenants.
    pub async fn list_policies(
        &self,
        tenant: Option<&TenantId>,
    ) -> AppResult<Vec<RetentionPolicy>> {
        self.policies.list_policies(tenant).await
    }

    async fn record(&self, tenant: &TenantId, metric: &'static str, by: u64) {
        if let Some(metrics) = &self.metrics {
            best_effort(metric, metrics.increment(tenant, metric, by)).await;
        }
    }
}
