use async_trait::async_trait;
use guardrail_core::{AppResult, TenantId};
use guardrail_domain::StoredPurgeReceipt;

/// Append-only storage for signed purge receipts.
#[async_trait]
pub trait PurgeReceiptRepository: Send + Sync {
    /// Persists the receipt with its signature and indexes it for the tenant.
    async fn store_receipt(&self, stored: &StoredPurgeReceipt) -> AppResult<()>;

    /// Loads one receipt by id.
    async fn load_receipt(&self, receipt_id: &str) -> AppResult<Option<StoredPurgeReceipt>>;

    /// Returns up to `limit` receipts for the tenant, newest first.
    ///
    /// Index entries whose body is gone are skipped.
    async fn latest_receipts(
        &self,
        tenant: &TenantId,
        limit: usize,
    ) -> AppResult<Vec<StoredPurgeReceipt>>;
}
