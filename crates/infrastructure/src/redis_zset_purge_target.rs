//! Purge target over Redis zset age indexes.

use async_trait::async_trait;
use guardrail_application::PurgeTarget;
use guardrail_core::{AppResult, TenantId};
use redis::AsyncCommands;

use crate::redis_support::{connect, limit_count, storage_error};

const PURGE_BATCH_SIZE: usize = 500;

/// Purges items indexed in a per-tenant zset scored by creation time.
///
/// Keys: `{prefix}:{namespace}:index:{tenant}` for the index and
/// `{prefix}:{namespace}:{item}:{tenant}:{id}` for each item's data.
#[derive(Clone)]
pub struct RedisZsetPurgeTarget {
    client: redis::Client,
    key_prefix: String,
    namespace: &'static str,
    item: &'static str,
}

impl RedisZsetPurgeTarget {
    /// Target for stored idempotency keys.
    #[must_use]
    pub fn idempotency_keys(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self::new(client, key_prefix, "idemp", "key")
    }

    /// Target for outbound webhook delivery logs.
    #[must_use]
    pub fn webhook_logs(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self::new(client, key_prefix, "webhook_logs", "log")
    }

    fn new(
        client: redis::Client,
        key_prefix: impl Into<String>,
        namespace: &'static str,
        item: &'static str,
    ) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            namespace,
            item,
        }
    }

    fn index_key(&self, tenant: &TenantId) -> String {
        format!("{}:{}:index:{tenant}", self.key_prefix, self.namespace)
    }

    fn data_key(&self, tenant: &TenantId, id: &str) -> String {
        format!("{}:{}:{}:{tenant}:{id}", self.key_prefix, self.namespace, self.item)
    }
}

#[async_trait]
impl PurgeTarget for RedisZsetPurgeTarget {
    async fn list_expired(
        &self,
        tenant: &TenantId,
        cutoff_ts: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut connection = connect(&self.client).await?;
        connection
            .zrangebyscore_limit(self.index_key(tenant), "-inf", cutoff_ts, 0, limit_count(limit))
            .await
            .map_err(|error| storage_error("read expired items", error))
    }

    async fn purge_ids(&self, tenant: &TenantId, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let index_key = self.index_key(tenant);
        let mut connection = connect(&self.client).await?;
        let mut purged = 0_u64;

        for batch in ids.chunks(PURGE_BATCH_SIZE) {
            let mut pipeline = redis::pipe();
            pipeline.atomic();
            for id in batch {
                pipeline
                    .zrem(index_key.as_str(), id.as_str())
                    .del(self.data_key(tenant, id));
            }

            let removed: Vec<u64> = pipeline
                .query_async(&mut connection)
                .await
                .map_err(|error| storage_error("purge expired items", error))?;

            // Two replies per id: the index removal and the data key removal.
            purged += removed
                .chunks(2)
                .filter(|counts| counts.iter().any(|count| *count > 0))
                .count() as u64;
        }

        Ok(purged)
    }
}
