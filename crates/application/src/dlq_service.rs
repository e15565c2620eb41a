use std::sync::Arc;

use guardrail_core::{AppError, AppResult, TenantId, now_epoch_seconds};
use guardrail_domain::{DlqMessage, DlqRetryPolicy};
use serde_json::Value;
use tracing::{debug, info};

use crate::dlq_ports::{DlqQueue, DlqRepository};
use crate::lifecycle_metrics::{LifecycleMetrics, best_effort};

mod listing;
mod retry;

#[cfg(test)]
mod tests;

/// Retry-queue engine for failed outbound deliveries.
#[derive(Clone)]
pub struct DlqService {
    repository: Arc<dyn DlqRepository>,
    retry_policy: DlqRetryPolicy,
    metrics: Option<Arc<dyn LifecycleMetrics>>,
}

impl DlqService {
    /// Creates a DLQ service; the retry policy is sanitized first.
    #[must_use]
    pub fn new(repository: Arc<dyn DlqRepository>, retry_policy: DlqRetryPolicy) -> Self {
        Self {
            repository,
            retry_policy: retry_policy.sanitized(),
            metrics: None,
        }
    }

    /// Adds optional lifecycle counters.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn LifecycleMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the effective retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> DlqRetryPolicy {
        self.retry_policy
    }

    /// Dead-letters a failed delivery; the message is due immediately.
    pub async fn enqueue(
        &self,
        tenant: &TenantId,
        topic: &str,
        payload: Value,
        error: Option<&str>,
    ) -> AppResult<DlqMessage> {
        let message = DlqMessage::new_failed(
            uuid::Uuid::new_v4().to_string(),
            tenant.clone(),
            topic,
            payload,
            error.map(ToOwned::to_owned),
            now_epoch_seconds(),
        )?;

        self.repository.insert(&message).await?;
        self.record(tenant, "dlq_enqueued").await;
        debug!(
            tenant = %tenant,
            topic = %message.topic,
            message_id = %message.id,
            "dlq message enqueued"
        );

        Ok(message)
    }

    /// Returns scheduled messages due at or before `now`, oldest due first.
    pub async fn next_due(
        &self,
        tenant: &TenantId,
        topic: &str,
        now: f64,
        limit: usize,
    ) -> AppResult<Vec<DlqMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let queue = queue_for(tenant, topic)?;
        let ids = self.repository.due_ids(&queue, now, limit).await?;
        self.repository.find_many(&ids).await
    }

    /// Removes a delivered message; returns `false` for unknown ids.
    pub async fn ack(&self, message_id: &str) -> AppResult<bool> {
        let Some(message) = self.repository.find(message_id).await? else {
            return Ok(false);
        };

        let deleted = self.repository.delete(&message).await?;
        if deleted {
            self.record(&message.tenant, "dlq_acked").await;
        }

        Ok(deleted)
    }

    /// Makes a message due now, releasing it from quarantine if needed.
    pub async fn replay_now(&self, message_id: &str) -> AppResult<Option<DlqMessage>> {
        let Some(mut message) = self.repository.find(message_id).await? else {
            return Ok(None);
        };

        message.next_attempt_ts = now_epoch_seconds().max(message.created_ts);
        self.repository.release(&message).await?;
        self.record(&message.tenant, "dlq_replayed").await;
        info!(
            tenant = %message.tenant,
            topic = %message.topic,
            message_id = %message.id,
            tries = message.tries,
            "dlq message replayed"
        );

        Ok(Some(message))
    }

    async fn record(&self, tenant: &TenantId, metric: &'static str) {
        if let Some(metrics) = &self.metrics {
            best_effort(metric, metrics.increment(tenant, metric, 1)).await;
        }
    }
}

fn queue_for(tenant: &TenantId, topic: &str) -> AppResult<DlqQueue> {
    if topic.trim().is_empty() {
        return Err(AppError::Validation(
            "dlq topic must not be empty".to_owned(),
        ));
    }

    Ok(DlqQueue {
        tenant: tenant.clone(),
        topic: topic.to_owned(),
    })
}
