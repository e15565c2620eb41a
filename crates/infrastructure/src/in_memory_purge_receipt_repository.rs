use std::collections::HashMap;

use async_trait::async_trait;
use guardrail_application::PurgeReceiptRepository;
use guardrail_core::{AppResult, TenantId};
use guardrail_domain::StoredPurgeReceipt;
use tokio::sync::RwLock;

/// In-memory purge receipt repository.
#[derive(Default)]
pub struct InMemoryPurgeReceiptRepository {
    receipts: RwLock<HashMap<String, StoredPurgeReceipt>>,
}

impl InMemoryPurgeReceiptRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PurgeReceiptRepository for InMemoryPurgeReceiptRepository {
    async fn store_receipt(&self, stored: &StoredPurgeReceipt) -> AppResult<()> {
        self.receipts
            .write()
            .await
            .insert(stored.receipt.id().to_owned(), stored.clone());

        Ok(())
    }

    async fn load_receipt(&self, receipt_id: &str) -> AppResult<Option<StoredPurgeReceipt>> {
        Ok(self.receipts.read().await.get(receipt_id).cloned())
    }

    async fn latest_receipts(
        &self,
        tenant: &TenantId,
        limit: usize,
    ) -> AppResult<Vec<StoredPurgeReceipt>> {
        let receipts = self.receipts.read().await;
        let mut matching: Vec<&StoredPurgeReceipt> = receipts
            .values()
            .filter(|stored| stored.receipt.tenant() == tenant)
            .collect();
        matching.sort_by(|left, right| {
            right
                .receipt
                .completed_ts()
                .total_cmp(&left.receipt.completed_ts())
                .then_with(|| right.receipt.id().cmp(left.receipt.id()))
        });

        Ok(matching.into_iter().take(limit).cloned().collect())
    }
}
