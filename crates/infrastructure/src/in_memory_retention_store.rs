use std::collections::BTreeMap;

use async_trait::async_trait;
use guardrail_application::RetentionStore;
use guardrail_core::{AppResult, TenantId};
use guardrail_domain::{RetentionPolicy, RetentionResource};
use tokio::sync::RwLock;

/// In-memory retention policy store.
#[derive(Default)]
pub struct InMemoryRetentionStore {
    policies: RwLock<BTreeMap<(TenantId, RetentionResource), RetentionPolicy>>,
}

impl InMemoryRetentionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RetentionStore for InMemoryRetentionStore {
    async fn get_policy(
        &self,
        tenant: &TenantId,
        resource: RetentionResource,
    ) -> AppResult<Option<RetentionPolicy>> {
        Ok(self
            .policies
            .read()
            .await
            .get(&(tenant.clone(), resource))
            .cloned())
    }

    async fn set_policy(&self, policy: RetentionPolicy) -> AppResult<()> {
        self.policies
            .write()
            .await
            .insert((policy.tenant.clone(), policy.resource), policy);

        Ok(())
    }

    async fn list_policies(&self, tenant: Option<&TenantId>) -> AppResult<Vec<RetentionPolicy>> {
        // BTreeMap iteration already yields (tenant, resource) order.
        Ok(self
            .policies
            .read()
            .await
            .values()
            .filter(|policy| tenant.is_none_or(|tenant| &policy.tenant == tenant))
            .cloned()
            .collect())
    }
}
