use std::collections::HashMap;

use async_trait::async_trait;
use guardrail_application::LifecycleMetrics;
use guardrail_core::{AppResult, TenantId};
use tokio::sync::RwLock;

/// In-memory lifecycle counters.
#[derive(Default)]
pub struct InMemoryLifecycleMetrics {
    counters: RwLock<HashMap<(TenantId, String), u64>>,
}

impl InMemoryLifecycleMetrics {
    /// Creates an empty counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns one counter value, zero when never incremented.
    pub async fn get(&self, tenant: &TenantId, metric: &str) -> u64 {
        self.counters
            .read()
            .await
            .get(&(tenant.clone(), metric.to_owned()))
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LifecycleMetrics for InMemoryLifecycleMetrics {
    async fn increment(&self, tenant: &TenantId, metric: &str, by: u64) -> AppResult<()> {
        let mut counters = self.counters.write().await;
        let counter = counters
            .entry((tenant.clone(), metric.to_owned()))
            .or_default();
        *counter = counter.saturating_add(by);

        Ok(())
    }
}
