//! Purge target implementations that live above storage adapters, and the
//! resource registry used by the coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use guardrail_core::{AppResult, TenantId};
use guardrail_domain::RetentionResource;

use crate::dlq_service::DlqService;
use crate::retention_ports::PurgeTarget;

/// Exposes expired DLQ messages to the purge coordinator.
#[derive(Clone)]
pub struct DlqPurgeTarget {
    dlq_service: DlqService,
}

impl DlqPurgeTarget {
    /// Wraps a DLQ service.
    #[must_use]
    pub fn new(dlq_service: DlqService) -> Self {
        Self { dlq_service }
    }
}

#[async_trait]
impl PurgeTarget for DlqPurgeTarget {
    async fn list_expired(
        &self,
        tenant: &TenantId,
        cutoff_ts: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        self.dlq_service.list_expired(tenant, cutoff_ts, limit).await
    }

    async fn purge_ids(&self, tenant: &TenantId, ids: &[String]) -> AppResult<u64> {
        self.dlq_service.purge(tenant, ids).await
    }
}

/// Stand-in for resources without a wired backend: never lists, never purges.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPurgeTarget;

#[async_trait]
impl PurgeTarget for NoopPurgeTarget {
    async fn list_expired(
        &self,
        _tenant: &TenantId,
        _cutoff_ts: f64,
        _limit: usize,
    ) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn purge_ids(&self, _tenant: &TenantId, _ids: &[String]) -> AppResult<u64> {
        Ok(0)
    }
}

/// Resource-to-target map built once at process start.
#[derive(Clone)]
pub struct PurgeTargetRegistry {
    targets: HashMap<RetentionResource, Arc<dyn PurgeTarget>>,
    fallback: Arc<dyn PurgeTarget>,
}

impl Default for PurgeTargetRegistry {
    fn default() -> Self {
        Self {
            targets: HashMap::new(),
            fallback: Arc::new(NoopPurgeTarget),
        }
    }
}

impl PurgeTargetRegistry {
    /// Creates an empty registry; every resource resolves to the no-op target.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the target for one resource, replacing any previous one.
    #[must_use]
    pub fn with_target(
        mut self,
        resource: RetentionResource,
        target: Arc<dyn PurgeTarget>,
    ) -> Self {
        self.targets.insert(resource, target);
        self
    }

    /// Returns the target for a resource, or the no-op target when none is wired.
    #[must_use]
    pub fn target_for(&self, resource: RetentionResource) -> Arc<dyn PurgeTarget> {
        self.targets
            .get(&resource)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Returns whether a real target is registered for the resource.
    #[must_use]
    pub fn is_wired(&self, resource: RetentionResource) -> bool {
        self.targets.contains_key(&resource)
    }
}
