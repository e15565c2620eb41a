//! Scheduled retention sweep over every stored policy.

use guardrail_core::AppResult;
use guardrail_domain::{PurgeMode, PurgeReceipt, RetentionPolicy};
use tracing::{info, warn};

use crate::purge_coordinator::{ExecutePurgeInput, PurgeCoordinator};

/// Actor recorded on receipts produced by the scheduled sweep.
pub const SWEEP_ACTOR: &str = "system:retention-sweep";

/// Outcome counters for one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSweepReport {
    /// Policies inspected.
    pub policies_seen: usize,
    /// Tenant/resource pairs that produced a receipt.
    pub pairs_purged: usize,
    /// Items removed across all pairs.
    pub items_purged: u64,
    /// Pairs whose plan or execution failed.
    pub failures: usize,
}

/// Runs automatic purges for all enabled policies.
#[derive(Clone)]
pub struct PurgeSweepService {
    coordinator: PurgeCoordinator,
    per_resource_limit: usize,
    dry_run: bool,
}

impl PurgeSweepService {
    /// Creates a sweep service bounded to `per_resource_limit` ids per pair.
    #[must_use]
    pub fn new(coordinator: PurgeCoordinator, per_resource_limit: usize) -> Self {
        Self {
            coordinator,
            per_resource_limit,
            dry_run: false,
        }
    }

    /// Records receipts without deleting anything.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Plans and executes one pass at `now`.
    ///
    /// A failing pair is logged and counted; the remaining pairs still run.
    pub async fn sweep_once(&self, now: f64) -> AppResult<PurgeSweepReport> {
        let policies = self.coordinator.list_policies(None).await?;
        let mut report = PurgeSweepReport {
            policies_seen: policies.len(),
            ..PurgeSweepReport::default()
        };

        for policy in policies.into_iter().filter(|policy| policy.enabled) {
            let outcome = self.sweep_pair(&policy, now).await;

            match outcome {
                Ok(Some(receipt)) => {
                    report.pairs_purged += 1;
                    report.items_purged += receipt.count();
                }
                Ok(None) => {}
                Err(error) => {
                    report.failures += 1;
                    warn!(
                        tenant = %policy.tenant,
                        resource = %policy.resource,
                        error = %error,
                        "retention sweep failed for pair"
                    );
                }
            }
        }

        if report.pairs_purged > 0 || report.failures > 0 {
            info!(
                policies = report.policies_seen,
                pairs = report.pairs_purged,
                items = report.items_purged,
                failures = report.failures,
                dry_run = self.dry_run,
                "retention sweep finished"
            );
        }

        Ok(report)
    }

    async fn sweep_pair(
        &self,
        policy: &RetentionPolicy,
        now: f64,
    ) -> AppResult<Option<PurgeReceipt>> {
        let ids = self
            .coordinator
            .plan(&policy.tenant, policy.resource, now, self.per_resource_limit)
            .await?;
        if ids.is_empty() {
            return Ok(None);
        }

        self.coordinator
            .execute(ExecutePurgeInput {
                tenant: policy.tenant.clone(),
                resource: policy.resource,
                ids,
                dry_run: self.dry_run,
                actor: SWEEP_ACTOR.to_owned(),
                mode: PurgeMode::Auto,
            })
            .await
            .map(Some)
    }
}
