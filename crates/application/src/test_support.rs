use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use guardrail_core::{AppError, AppResult, TenantId};
use guardrail_domain::{
    DlqMessage, PurgeReceipt, ReceiptSignature, RetentionPolicy, RetentionResource,
    SignatureAlgorithm, StoredPurgeReceipt,
};
use tokio::sync::Mutex;

use crate::dlq_ports::{DlqQueue, DlqRepository};
use crate::lifecycle_metrics::LifecycleMetrics;
use crate::retention_ports::{PurgeReceiptRepository, PurgeTarget, ReceiptSigner, RetentionStore};

pub(crate) fn tenant(value: &str) -> TenantId {
    TenantId::new(value).unwrap_or_else(|error| panic!("invalid test tenant: {error}"))
}

#[derive(Default)]
struct FakeDlqState {
    messages: HashMap<String, DlqMessage>,
    quarantined: HashSet<String>,
    queues: BTreeSet<DlqQueue>,
}

#[derive(Default)]
pub(crate) struct FakeDlqRepository {
    state: Mutex<FakeDlqState>,
    failing_due_tenant: Option<TenantId>,
    record_round_trips: AtomicUsize,
}

impl FakeDlqRepository {
    /// Repository whose due-id reads fail for one tenant's queues.
    pub(crate) fn failing_due_for(tenant: TenantId) -> Self {
        Self {
            failing_due_tenant: Some(tenant),
            ..Self::default()
        }
    }

    /// Record-level reads and deletes issued so far.
    pub(crate) fn record_round_trips(&self) -> usize {
        self.record_round_trips.load(Ordering::SeqCst)
    }

    fn count_round_trip(&self) {
        self.record_round_trips.fetch_add(1, Ordering::SeqCst);
    }
}

fn in_queue(message: &DlqMessage, queue: &DlqQueue) -> bool {
    message.tenant == queue.tenant && message.topic == queue.topic
}

#[async_trait]
impl DlqRepository for FakeDlqRepository {
    async fn insert(&self, message: &DlqMessage) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.queues.insert(DlqQueue {
            tenant: message.tenant.clone(),
            topic: message.topic.clone(),
        });
        state.messages.insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn find(&self, message_id: &str) -> AppResult<Option<DlqMessage>> {
        self.count_round_trip();
        Ok(self.state.lock().await.messages.get(message_id).cloned())
    }

    async fn find_many(&self, message_ids: &[String]) -> AppResult<Vec<DlqMessage>> {
        self.count_round_trip();
        let state = self.state.lock().await;
        Ok(message_ids
            .iter()
            .filter_map(|id| state.messages.get(id).cloned())
            .collect())
    }

    async fn due_ids(
        &self,
        queue: &DlqQueue,
        now: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        if self.failing_due_tenant.as_ref() == Some(&queue.tenant) {
            return Err(AppError::Internal(
                "dlq record is missing field 'payload'".to_owned(),
            ));
        }

        let ids = self.scheduled_ids(queue, usize::MAX).await?;
        let state = self.state.lock().await;
        Ok(ids
            .into_iter()
            .filter(|id| {
                state
                    .messages
                    .get(id)
                    .is_some_and(|message| message.next_attempt_ts <= now)
            })
            .take(limit)
            .collect())
    }

    async fn scheduled_ids(&self, queue: &DlqQueue, limit: usize) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
        let mut scheduled: Vec<&DlqMessage> = state
            .messages
            .values()
            .filter(|message| in_queue(message, queue) && !state.quarantined.contains(&message.id))
            .collect();
        scheduled.sort_by(|left, right| {
            left.next_attempt_ts
                .total_cmp(&right.next_attempt_ts)
                .then_with(|| left.id.cmp(&right.id))
        });

        Ok(scheduled
            .into_iter()
            .take(limit)
            .map(|message| message.id.clone())
            .collect())
    }

    async fn quarantined_ids(&self, queue: &DlqQueue) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state
            .quarantined
            .iter()
            .filter(|id| {
                state
                    .messages
                    .get(*id)
                    .is_some_and(|message| in_queue(message, queue))
            })
            .cloned()
            .collect())
    }

    async fn queue_depth(&self, queue: &DlqQueue) -> AppResult<(u64, u64)> {
        let pending = self.scheduled_ids(queue, usize::MAX).await?.len() as u64;
        let quarantined = self.quarantined_ids(queue).await?.len() as u64;
        Ok((pending, quarantined))
    }

    async fn list_queues(&self) -> AppResult<Vec<DlqQueue>> {
        Ok(self.state.lock().await.queues.iter().cloned().collect())
    }

    async fn record_failure(
        &self,
        message_id: &str,
        error: &str,
        attempt_ts: f64,
    ) -> AppResult<Option<DlqMessage>> {
        let mut state = self.state.lock().await;
        Ok(state.messages.get_mut(message_id).map(|message| {
            message.tries = message.tries.saturating_add(1);
            message.last_error = Some(error.to_owned());
            message.last_attempt_ts = Some(attempt_ts);
            message.clone()
        }))
    }

    async fn reschedule(&self, message: &DlqMessage) -> AppResult<bool> {
        let mut state = self.state.lock().await;
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
        self.state
            .lock()
            .await
            .quarantined
            .insert(message.id.clone());
        Ok(())
    }

    async fn release(&self, message: &DlqMessage) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.quarantined.remove(&message.id);
        if let Some(stored) = state.messages.get_mut(&message.id) {
            stored.next_attempt_ts = message.next_attempt_ts;
        }
        Ok(())
    }

    async fn delete(&self, message: &DlqMessage) -> AppResult<bool> {
        self.count_round_trip();
        let mut state = self.state.lock().await;
        state.quarantined.remove(&message.id);
        Ok(state.messages.remove(&message.id).is_some())
    }

    async fn delete_many(&self, messages: &[DlqMessage]) -> AppResult<u64> {
        self.count_round_trip();
        let mut state = self.state.lock().await;
        let mut deleted = 0_u64;
        for message in messages {
            state.quarantined.remove(&message.id);
            if state.messages.remove(&message.id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn created_before(
        &self,
        tenant: &TenantId,
        cutoff: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
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

    async fn untrack(&self, _tenant: &TenantId, _message_ids: &[String]) -> AppResult<()> {
        self.count_round_trip();
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeRetentionStore {
    policies: Mutex<HashMap<(TenantId, RetentionResource), RetentionPolicy>>,
}

#[async_trait]
impl RetentionStore for FakeRetentionStore {
    async fn get_policy(
        &self,
        tenant: &TenantId,
        resource: RetentionResource,
    ) -> AppResult<Option<RetentionPolicy>> {
        Ok(self
            .policies
            .lock()
            .await
            .get(&(tenant.clone(), resource))
            .cloned())
    }

    async fn set_policy(&self, policy: RetentionPolicy) -> AppResult<()> {
        self.policies
            .lock()
            .await
            .insert((policy.tenant.clone(), policy.resource), policy);
        Ok(())
    }

    async fn list_policies(&self, tenant: Option<&TenantId>) -> AppResult<Vec<RetentionPolicy>> {
        let mut policies: Vec<RetentionPolicy> = self
            .policies
            .lock()
            .await
            .values()
            .filter(|policy| tenant.is_none_or(|tenant| &policy.tenant == tenant))
            .cloned()
            .collect();
        policies.sort_by(|left, right| {
            (&left.tenant, left.resource).cmp(&(&right.tenant, right.resource))
        });
        Ok(policies)
    }
}

/// Zset-like target: `(tenant, id) -> score`, optionally failing on purge.
#[derive(Default)]
pub(crate) struct FakePurgeTarget {
    entries: Mutex<HashMap<(TenantId, String), f64>>,
    fail_purge: AtomicBool,
}

impl FakePurgeTarget {
    pub(crate) async fn seed(&self, tenant: &TenantId, id: &str, score: f64) {
        self.entries
            .lock()
            .await
            .insert((tenant.clone(), id.to_owned()), score);
    }

    pub(crate) fn fail_purges(&self) {
        self.fail_purge.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl PurgeTarget for FakePurgeTarget {
    async fn list_expired(
        &self,
        tenant: &TenantId,
        cutoff_ts: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        let entries = self.entries.lock().await;
        let mut expired: Vec<(&String, f64)> = entries
            .iter()
            .filter(|((owner, _), score)| owner == tenant && **score <= cutoff_ts)
            .map(|((_, id), score)| (id, *score))
            .collect();
        expired.sort_by(|left, right| left.1.total_cmp(&right.1).then_with(|| left.0.cmp(right.0)));

        Ok(expired
            .into_iter()
            .take(limit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn purge_ids(&self, tenant: &TenantId, ids: &[String]) -> AppResult<u64> {
        if self.fail_purge.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("fake target is down".to_owned()));
        }

        let mut entries = self.entries.lock().await;
        Ok(ids
            .iter()
            .filter(|id| entries.remove(&(tenant.clone(), (*id).clone())).is_some())
            .count() as u64)
    }
}

#[derive(Default)]
pub(crate) struct FakeReceiptRepository {
    receipts: Mutex<Vec<StoredPurgeReceipt>>,
}

impl FakeReceiptRepository {
    pub(crate) async fn len(&self) -> usize {
        self.receipts.lock().await.len()
    }

    pub(crate) async fn replace(&self, stored: StoredPurgeReceipt) {
        let mut receipts = self.receipts.lock().await;
        receipts.retain(|existing| existing.receipt.id() != stored.receipt.id());
        receipts.push(stored);
    }
}

#[async_trait]
impl PurgeReceiptRepository for FakeReceiptRepository {
    async fn store_receipt(&self, stored: &StoredPurgeReceipt) -> AppResult<()> {
        self.receipts.lock().await.push(stored.clone());
        Ok(())
    }

    async fn load_receipt(&self, receipt_id: &str) -> AppResult<Option<StoredPurgeReceipt>> {
        Ok(self
            .receipts
            .lock()
            .await
            .iter()
            .find(|stored| stored.receipt.id() == receipt_id)
            .cloned())
    }

    async fn latest_receipts(
        &self,
        tenant: &TenantId,
        limit: usize,
    ) -> AppResult<Vec<StoredPurgeReceipt>> {
        let mut receipts: Vec<StoredPurgeReceipt> = self
            .receipts
            .lock()
            .await
            .iter()
            .filter(|stored| stored.receipt.tenant() == tenant)
            .cloned()
            .collect();
        receipts.sort_by(|left, right| {
            right
                .receipt
                .completed_ts()
                .total_cmp(&left.receipt.completed_ts())
        });
        receipts.truncate(limit);
        Ok(receipts)
    }
}

/// Signs with the canonical payload itself; enough to detect tampering.
pub(crate) struct FakeSigner;

impl ReceiptSigner for FakeSigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::HmacSha256
    }

    fn key_id(&self) -> &str {
        "fake"
    }

    fn sign(&self, receipt: &PurgeReceipt) -> AppResult<ReceiptSignature> {
        let input = receipt.signing_input()?;
        Ok(ReceiptSignature {
            alg: self.algorithm(),
            kid: self.key_id().to_owned(),
            sig: String::from_utf8_lossy(&input).into_owned(),
        })
    }

    fn verify(&self, receipt: &PurgeReceipt, signature: &ReceiptSignature) -> bool {
        receipt
            .signing_input()
            .is_ok_and(|input| signature.sig.as_bytes() == input.as_slice())
    }
}

#[derive(Default)]
pub(crate) struct RecordingMetrics {
    counters: Mutex<HashMap<String, u64>>,
    fail: AtomicBool,
}

impl RecordingMetrics {
    pub(crate) fn failing() -> Self {
        Self {
            counters: Mutex::default(),
            fail: AtomicBool::new(true),
        }
    }

    pub(crate) async fn get(&self, metric: &str) -> u64 {
        self.counters
            .lock()
            .await
            .get(metric)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl LifecycleMetrics for RecordingMetrics {
    async fn increment(&self, _tenant: &TenantId, metric: &str, by: u64) -> AppResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("metrics backend down".to_owned()));
        }

        *self
            .counters
            .lock()
            .await
            .entry(metric.to_owned())
            .or_default() += by;
        Ok(())
    }
}
