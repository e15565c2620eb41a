use async_trait::async_trait;
use guardrail_core::{AppResult, TenantId};

/// Capability over one purgeable resource kind.
#[async_trait]
pub trait PurgeTarget: Send + Sync {
    /// Returns up to `limit` ids whose age score is at or before `cutoff_ts`,
    /// oldest first.
    async fn list_expired(
        &self,
        tenant: &TenantId,
        cutoff_ts: f64,
        limit: usize,
    ) -> AppResult<Vec<String>>;

    /// Deletes the given ids and returns how many were actually removed.
    ///
    /// Ids that are already gone are skipped without error.
    async fn purge_ids(&self, tenant: &TenantId, ids: &[String]) -> AppResult<u64>;
}
