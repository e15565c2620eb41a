//! Redis-backed lifecycle counters.

use async_trait::async_trait;
use guardrail_application::LifecycleMetrics;
use guardrail_core::{AppResult, TenantId};
use redis::AsyncCommands;

use crate::redis_support::{connect, storage_error};

/// Per-tenant counters kept in one Redis hash per tenant.
#[derive(Clone)]
pub struct RedisLifecycleMetrics {
    client: redis::Client,
    key_prefix: String,
}

impl RedisLifecycleMetrics {
    /// Creates a metrics adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, tenant: &TenantId) -> String {
        format!("{}:metrics:{tenant}", self.key_prefix)
    }
}

#[async_trait]
impl LifecycleMetrics for RedisLifecycleMetrics {
    async fn increment(&self, tenant: &TenantId, metric: &str, by: u64) -> AppResult<()> {
        if by == 0 {
            return Ok(());
        }

        let mut connection = connect(&self.client).await?;
        connection
            .hincr::<_, _, _, ()>(self.key_for(tenant), metric, by)
            .await
            .map_err(|error| storage_error("increment lifecycle metric", error))
    }
}
