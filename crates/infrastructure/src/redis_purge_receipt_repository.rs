//! Redis-backed purge receipt repository.

use async_trait::async_trait;
use guardrail_application::PurgeReceiptRepository;
use guardrail_core::{AppError, AppResult, TenantId};
use guardrail_domain::StoredPurgeReceipt;
use redis::AsyncCommands;

use crate::redis_support::{connect, range_stop, storage_error};

/// Redis implementation of the purge receipt repository port.
#[derive(Clone)]
pub struct RedisPurgeReceiptRepository {
    client: redis::Client,
    key_prefix: String,
}

impl RedisPurgeReceiptRepository {
    /// Creates a repository with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn receipt_key(&self, receipt_id: &str) -> String {
        format!("{}:purge:receipt:{receipt_id}", self.key_prefix)
    }

    fn tenant_index_key(&self, tenant: &TenantId) -> String {
        format!("{}:purge:receipts:{tenant}", self.key_prefix)
    }
}

fn decode_receipt(value: &str) -> AppResult<StoredPurgeReceipt> {
    serde_json::from_str(value)
        .map_err(|error| AppError::Internal(format!("invalid stored purge receipt: {error}")))
}

#[async_trait]
impl PurgeReceiptRepository for RedisPurgeReceiptRepository {
    async fn store_receipt(&self, stored: &StoredPurgeReceipt) -> AppResult<()> {
        let encoded = serde_json::to_string(stored).map_err(|error| {
            AppError::Internal(format!("failed to encode purge receipt: {error}"))
        })?;
        let receipt = &stored.receipt;
        let mut connection = connect(&self.client).await?;

        redis::pipe()
            .atomic()
            .set(self.receipt_key(receipt.id()), encoded)
            .ignore()
            .zadd(
                self.tenant_index_key(receipt.tenant()),
                receipt.id(),
                receipt.completed_ts(),
            )
            .ignore()
            .query_async::<()>(&mut connection)
            .await
            .map_err(|error| storage_error("store purge receipt", error))
    }

    async fn load_receipt(&self, receipt_id: &str) -> AppResult<Option<StoredPurgeReceipt>> {
        let mut connection = connect(&self.client).await?;
        let encoded: Option<String> = connection
            .get(self.receipt_key(receipt_id))
            .await
            .map_err(|error| storage_error("load purge receipt", error))?;

        encoded.as_deref().map(decode_receipt).transpose()
    }

    async fn latest_receipts(
        &self,
        tenant: &TenantId,
        limit: usize,
    ) -> AppResult<Vec<StoredPurgeReceipt>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut connection = connect(&self.client).await?;
        let receipt_ids: Vec<String> = connection
            .zrevrange(self.tenant_index_key(tenant), 0, range_stop(limit))
            .await
            .map_err(|error| storage_error("read purge receipt index", error))?;
        if receipt_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipeline = redis::pipe();
        for receipt_id in &receipt_ids {
            pipeline.get(self.receipt_key(receipt_id));
        }
        let bodies: Vec<Option<String>> = pipeline
            .query_async(&mut connection)
            .await
            .map_err(|error| storage_error("load purge receipts", error))?;

        bodies
            .iter()
            .flatten()
            .map(|body| decode_receipt(body))
            .collect()
    }
}
