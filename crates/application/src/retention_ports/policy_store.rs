use async_trait::async_trait;
use guardrail_core::{AppResult, TenantId};
use guardrail_domain::{RetentionPolicy, RetentionResource};

/// Keyed storage of per-(tenant, resource) retention rules.
#[async_trait]
pub trait RetentionStore: Send + Sync {
    /// Returns the policy for one tenant resource.
    async fn get_policy(
        &self,
        tenant: &TenantId,
        resource: RetentionResource,
    ) -> AppResult<Option<RetentionPolicy>>;

    /// Upserts a policy; the last write wins.
    async fn set_policy(&self, policy: RetentionPolicy) -> AppResult<()>;

    /// Lists policies for one tenant, or for every tenant when `None`.
    ///
    /// Results are ordered by tenant, then resource.
    async fn list_policies(&self, tenant: Option<&TenantId>) -> AppResult<Vec<RetentionPolicy>>;
}
