use std::collections::HashMap;

use async_trait::async_trait;
use guardrail_application::PurgeTarget;
use guardrail_core::{AppResult, TenantId};
use tokio::sync::RwLock;

/// In-memory age index standing in for zset-backed targets.
#[derive(Default)]
pub struct InMemoryPurgeTarget {
    items: RwLock<HashMap<TenantId, HashMap<String, f64>>>,
}

impl InMemoryPurgeTarget {
    /// Creates an empty target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or re-scores one item.
    pub async fn track(&self, tenant: &TenantId, id: &str, created_ts: f64) {
        self.items
            .write()
            .await
            .entry(tenant.clone())
            .or_default()
            .insert(id.to_owned(), created_ts);
    }

    /// Returns how many items the tenant still has.
    pub async fn len(&self, tenant: &TenantId) -> usize {
        self.items
            .read()
            .await
            .get(tenant)
            .map_or(0, HashMap::len)
    }
}

#[async_trait]
impl PurgeTarget for InMemoryPurgeTarget {
    async fn list_expired(
        &self,
        tenant: &TenantId,
        cutoff_ts: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let items = self.items.read().await;
        let Some(tenant_items) = items.get(tenant) else {
            return Ok(Vec::new());
        };

        let mut expired: Vec<(&String, f64)> = tenant_items
            .iter()
            .filter(|(_, created_ts)| **created_ts <= cutoff_ts)
            .map(|(id, created_ts)| (id, *created_ts))
            .collect();
        expired.sort_by(|left, right| left.1.total_cmp(&right.1).then_with(|| left.0.cmp(right.0)));

        Ok(expired
            .into_iter()
            .take(limit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn purge_ids(&self, tenant: &TenantId, ids: &[String]) -> AppResult<u64> {
        let mut items = self.items.write().await;
        let Some(tenant_items) = items.get_mut(tenant) else {
            return Ok(0);
        };

        Ok(ids
            .iter()
            .filter(|id| tenant_items.remove(id.as_str()).is_some())
            .count() as u64)
    }
}
