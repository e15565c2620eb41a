//! In-memory dead-letter queue repository for local runs and tests.

use std::collections::{BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use guardrail_application::{DlqQueue, DlqRepository};
use guardrail_core::{AppResult, TenantId};
use guardrail_domain::DlqMessage;
use tokio::sync::RwLock;

#[derive(Default)]
struct DlqState {
    messages: HashMap<String, DlqMessage>,
    quarantined: HashSet<String>,
    queues: BTreeSet<DlqQueue>,
}

impl DlqState {
    fn queue_messages<'a>(&'a self, queue: &DlqQueue) -> impl Iterator<Item = &'a DlqMessage> {
        self.messages
            .values()
            .filter(move |message| message.tenant == queue.tenant && message.topic == queue.topic)
    }

    fn scheduled(&self, queue: &DlqQueue) -> Vec<&DlqMessage> {
        let mut scheduled: Vec<&DlqMessage> = self
            .queue_messages(queue)
            .filter(|message| !self.quarantined.contains(&message.id))
            .collect();
        scheduled.sort_by(|left, right| {
            left.next_attempt_ts
                .total_cmp(&right.next_attempt_ts)
                .then_with(|| left.id.cmp(&right.id))
        });
        scheduled
    }
}

/// Process-local DLQ storage with the same index semantics as the Redis adapter.
#[derive(Default)]
pub struct InMemoryDlqRepository {
    state: RwLock<DlqState>,
}

impl InMemoryDlqRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DlqRepository for InMemoryDlqRepository {
    async fn insert(&self, message: &DlqMessage) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.queues.insert(DlqQueue {
            tenant: message.tenant.clone(),
            topic: message.topic.clone(),
        });
        state.quarantined.remove(&message.id);
        state.messages.insert(message.id.clone(), message.clone());

        Ok(())
    }

    async fn find(&self, message_id: &str) -> AppResult<Option<DlqMessage>> {
        Ok(self.state.read().await.messages.get(message_id).cloned())
    }

    async fn find_many(&self, message_ids: &[String]) -> AppResult<Vec<DlqMessage>> {
        let state = self.state.read().await;
        Ok(message_ids
            .iter()
            .filter_map(|message_id| state.messages.get(message_id).cloned())
            .collect())
    }

    async fn due_ids(
        &self,
        queue: &DlqQueue,
        now: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .scheduled(queue)
            .into_iter()
            .take_while(|message| message.next_attempt_ts <= now)
            .take(limit)
            .map(|message| message.id.clone())
            .collect())
    }

    async fn scheduled_ids(&self, queue: &DlqQueue, limit: usize) -> AppResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .scheduled(queue)
            .into_iter()
            .take(limit)
            .map(|message| message.id.clone())
            .collect())
    }

    async fn quarantined_ids(&self, queue: &DlqQueue) -> AppResult<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .queue_messages(queue)
            .filter(|message| state.quarantined.contains(&message.id))
            .map(|message| message.id.clone())
            .collect())
    }

    async fn queue_depth(&self, queue: &DlqQueue) -> AppResult<(u64, u64)> {
        let state = self.state.read().await;
        let (quarantined, scheduled): (Vec<&DlqMessage>, Vec<&DlqMessage>) = state
            .queue_messages(queue)
            .partition(|message| state.quarantined.contains(&message.id));

        Ok((scheduled.len() as u64, quarantined.len() as u64))
    }

    async fn list_queues(&self) -> AppResult<Vec<DlqQueue>> {
        Ok(self.state.read().await.queues.iter().cloned().collect())
    }

    async fn record_failure(
        &self,
        message_id: &str,
        error: &str,
        attempt_ts: f64,
    ) -> AppResult<Option<DlqMessage>> {
        let mut state = self.state.write().await;
        Ok(state.messages.get_mut(message_id).map(|message| {
            message.tries = message.tries.saturating_add(1);
            message.last_error = Some(error.to_owned()).filter(|value| !value.is_empty());
            message.last_attempt_ts = Some(attempt_ts);
            message.clone()
        }))
    }

    async fn reschedule(&self, message: &DlqMessage) -> AppResult<bool> {
        let mut state = self.state.write().await;
        if state.quarantined.contains(&message.id) {
            return Ok(false);
        }

        match state.messages.get_mut(&message.id) {
            Some(stored) if stored.tries == message.tries => {
                stored.next_attempt_ts = message.next_attempt_ts;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn quarantine(&self, message: &DlqMessage) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state.messages.contains_key(&message.id) {
            state.quarantined.insert(message.id.clone());
        }

        Ok(())
    }

    async fn release(&self, message: &DlqMessage) -> AppResult<()> {
        let mut state = self.state.write().await;
        let Some(stored) = state.messages.get_mut(&message.id) else {
            return Ok(());
        };

        stored.next_attempt_ts = message.next_attempt_ts;
        state.quarantined.remove(&message.id);

        Ok(())
    }

    async fn delete(&self, message: &DlqMessage) -> AppResult<bool> {
        let mut state = self.state.write().await;
        state.quarantined.remove(&message.id);

        Ok(state.messages.remove(&message.id).is_some())
    }

    async fn created_before(
        &self,
        tenant: &TenantId,
        cutoff: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let state = self.state.read().await;
        let mut expired: Vec<&DlqMessage> = state
            .messages
            .values()
            .filter(|message| &message.tenant == tenant && message.created_ts <= cutoff)
            .collect();
        expired.sort_by(|left, right| {
            left.created_ts
                .total_cmp(&right.created_ts)
                .then_with(|| left.id.cmp(&right.id))
        });

        Ok(expired
            .into_iter()
            .take(limit)
            .map(|message| message.id.clone())
            .collect())
    }

    async fn delete_many(&self, messages: &[DlqMessage]) -> AppResult<u64> {
        let mut state = self.state.write().await;
        let mut deleted = 0_u64;
        for message in messages {
            state.quarantined.remove(&message.id);
            if state.messages.remove(&message.id).is_some() {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn untrack(&self, _tenant: &TenantId, _message_ids: &[String]) -> AppResult<()> {
        // Records and the creation index are the same map here.
        Ok(())
    }
}
