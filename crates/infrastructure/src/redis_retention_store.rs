//! Redis-backed retention policy store.

use async_trait::async_trait;
use guardrail_application::RetentionStore;
use guardrail_core::{AppError, AppResult, TenantId};
use guardrail_domain::{RetentionPolicy, RetentionResource};
use redis::AsyncCommands;
use tracing::warn;

use crate::redis_support::{connect, storage_error};

/// Redis implementation of the retention store port.
///
/// Policies are JSON strings keyed by tenant and resource; two sets index the
/// known tenants and each tenant's configured resources.
#[derive(Clone)]
pub struct RedisRetentionStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisRetentionStore {
    /// Creates a store with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn policy_key(&self, tenant: &TenantId, resource: RetentionResource) -> String {
        format!("{}:retention:policy:{tenant}:{resource}", self.key_prefix)
    }

    fn tenants_key(&self) -> String {
        format!("{}:retention:tenants", self.key_prefix)
    }

    fn resources_key(&self, tenant: &TenantId) -> String {
        format!("{}:retention:resources:{tenant}", self.key_prefix)
    }

    async fn tenant_policies(
        &self,
        connection: &mut redis::aio::MultiplexedConnection,
        tenant: &TenantId,
    ) -> AppResult<Vec<RetentionPolicy>> {
        let names: Vec<String> = connection
            .smembers(self.resources_key(tenant))
            .await
            .map_err(|error| storage_error("list retention resources", error))?;
        let resources: Vec<RetentionResource> = names
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect();
        if resources.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipeline = redis::pipe();
        for resource in &resources {
            pipeline.get(self.policy_key(tenant, *resource));
        }
        let encoded: Vec<Option<String>> = pipeline
            .query_async(connection)
            .await
            .map_err(|error| storage_error("load retention policies", error))?;

        let mut policies = Vec::with_capacity(encoded.len());
        for value in encoded.iter().flatten() {
            policies.push(decode_policy(value)?);
        }

        Ok(policies)
    }
}

fn decode_policy(value: &str) -> AppResult<RetentionPolicy> {
    serde_json::from_str(value)
        .map_err(|error| AppError::Internal(format!("invalid stored retention policy: {error}")))
}

#[async_trait]
impl RetentionStore for RedisRetentionStore {
    async fn get_policy(
        &self,
        tenant: &TenantId,
        resource: RetentionResource,
    ) -> AppResult<Option<RetentionPolicy>> {
        let mut connection = connect(&self.client).await?;
        let encoded: Option<String> = connection
            .get(self.policy_key(tenant, resource))
            .await
            .map_err(|error| storage_error("load retention policy", error))?;

        encoded.as_deref().map(decode_policy).transpose()
    }

    async fn set_policy(&self, policy: RetentionPolicy) -> AppResult<()> {
        let encoded = serde_json::to_string(&policy).map_err(|error| {
            AppError::Internal(format!("failed to encode retention policy: {error}"))
        })?;
        let mut connection = connect(&self.client).await?;

        redis::pipe()
            .atomic()
            .set(self.policy_key(&policy.tenant, policy.resource), encoded)
            .ignore()
            .sadd(self.tenants_key(), policy.tenant.as_str())
            .ignore()
            .sadd(self.resources_key(&policy.tenant), policy.resource.as_str())
            .ignore()
            .query_async::<()>(&mut connection)
            .await
            .map_err(|error| storage_error("store retention policy", error))
    }

    async fn list_policies(&self, tenant: Option<&TenantId>) -> AppResult<Vec<RetentionPolicy>> {
        let mut connection = connect(&self.client).await?;
        let tenants = match tenant {
            Some(tenant) => vec![tenant.clone()],
            None => {
                let names: Vec<String> = connection
                    .smembers(self.tenants_key())
                    .await
                    .map_err(|error| storage_error("list retention tenants", error))?;
                names
                    .into_iter()
                    .filter_map(|name| match TenantId::new(name.as_str()) {
                        Ok(tenant) => Some(tenant),
                        Err(error) => {
                            warn!(
                                tenant = %name,
                                error = %error,
                                "ignoring invalid retention tenant entry"
                            );
                            None
                        }
                    })
                    .collect()
            }
        };

        let mut policies = Vec::new();
        for tenant in &tenants {
            policies.extend(self.tenant_policies(&mut connection, tenant).await?);
        }
        policies.sort_by(|left, right| {
            (&left.tenant, left.resource).cmp(&(&right.tenant, right.resource))
        });

        Ok(policies)
    }
}
