use async_trait::async_trait;
use guardrail_core::{AppResult, TenantId};
use guardrail_domain::DlqMessage;

/// One (tenant, topic) queue known to the DLQ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DlqQueue {
    /// Owning tenant.
    pub tenant: TenantId,
    /// Delivery topic.
    pub topic: String,
}

/// Storage port for dead-letter messages and their indexes.
///
/// Every message lives in exactly one of two per-queue indexes: the scheduled
/// index scored by `next_attempt_ts`, or the quarantine set. A per-tenant
/// creation index scored by `created_ts` backs retention purges.
#[async_trait]
pub trait DlqRepository: Send + Sync {
    /// Persists a new message and adds it to the scheduled and creation indexes.
    async fn insert(&self, message: &DlqMessage) -> AppResult<()>;

    /// Loads one message.
    async fn find(&self, message_id: &str) -> AppResult<Option<DlqMessage>>;

    /// Loads several messages, preserving input order and skipping missing ids.
    async fn find_many(&self, message_ids: &[String]) -> AppResult<Vec<DlqMessage>>;

    /// Returns scheduled ids with `next_attempt_ts <= now`, oldest due first.
    async fn due_ids(
        &self,
        queue: &DlqQueue,
        now: f64,
        limit: usize,
    ) -> AppResult<Vec<String>>;

    /// Returns up to `limit` scheduled ids in due order.
    async fn scheduled_ids(&self, queue: &DlqQueue, limit: usize) -> AppResult<Vec<String>>;

    /// Returns every quarantined id, in no particular order.
    async fn quarantined_ids(&self, queue: &DlqQueue) -> AppResult<Vec<String>>;

    /// Returns scheduled and quarantined counts for one queue.
    async fn queue_depth(&self, queue: &DlqQueue) -> AppResult<(u64, u64)>;

    /// Returns every queue that ever received a message.
    async fn list_queues(&self) -> AppResult<Vec<DlqQueue>>;

    /// Atomically increments `tries` and records the failure.
    ///
    /// Returns the updated message, or `None` when the id is unknown.
    async fn record_failure(
        &self,
        message_id: &str,
        error: &str,
        attempt_ts: f64,
    ) -> AppResult<Option<DlqMessage>>;

    /// Stores a new `next_attempt_ts` and re-scores the scheduled index.
    ///
    /// Applies only while the stored `tries` still equals `message.tries` and
    /// the id is not quarantined; returns whether the update applied.
    async fn reschedule(&self, message: &DlqMessage) -> AppResult<bool>;

    /// Moves the message from the scheduled index to quarantine.
    async fn quarantine(&self, message: &DlqMessage) -> AppResult<()>;

    /// Stores `next_attempt_ts` and moves the message from quarantine back to
    /// the scheduled index.
    async fn release(&self, message: &DlqMessage) -> AppResult<()>;

    /// Deletes the message and every index entry; returns whether the record
    /// existed.
    async fn delete(&self, message: &DlqMessage) -> AppResult<bool>;

    /// Returns ids created at or before `cutoff`, oldest first.
    async fn created_before(
        &self,
        tenant: &TenantId,
        cutoff: f64,
        limit: usize,
    ) -> AppResult<Vec<String>>;

    /// Deletes several messages with their index entries in batched round
    /// trips; returns how many records existed.
    async fn delete_many(&self, messages: &[DlqMessage]) -> AppResult<u64>;

    /// Drops dangling creation-index entries whose records are already gone.
    async fn untrack(&self, tenant: &TenantId, message_ids: &[String]) -> AppResult<()>;
}
