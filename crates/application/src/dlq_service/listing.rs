use std::collections::HashSet;

use super::*;

impl DlqService {
    /// Lists scheduled messages ordered by `next_attempt_ts`.
    pub async fn list_pending(
        &self,
        tenant: &TenantId,
        topic: &str,
        limit: usize,
    ) -> AppResult<Vec<DlqMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let queue = queue_for(tenant, topic)?;
        let ids = self.repository.scheduled_ids(&queue, limit).await?;
        let mut messages = self.repository.find_many(&ids).await?;

        // Bulk record fetches do not guarantee index order.
        messages.sort_by(|left, right| {
            left.next_attempt_ts
                .total_cmp(&right.next_attempt_ts)
                .then_with(|| left.id.cmp(&right.id))
        });

        Ok(messages)
    }

    /// Lists quarantined messages ordered by id.
    pub async fn list_quarantine(
        &self,
        tenant: &TenantId,
        topic: &str,
        limit: usize,
    ) -> AppResult<Vec<DlqMessage>> {
        let queue = queue_for(tenant, topic)?;
        let mut ids = self.repository.quarantined_ids(&queue).await?;
        ids.sort_unstable();
        ids.truncate(limit);

        self.repository.find_many(&ids).await
    }

    /// Returns `(pending, quarantined)` counts for one queue.
    pub async fn queue_depth(&self, tenant: &TenantId, topic: &str) -> AppResult<(u64, u64)> {
        let queue = queue_for(tenant, topic)?;
        self.repository.queue_depth(&queue).await
    }

    /// Lists every queue that has received messages.
    pub async fn list_queues(&self) -> AppResult<Vec<DlqQueue>> {
        let mut queues = self.repository.list_queues().await?;
        queues.sort();
        Ok(queues)
    }

    /// Returns ids of messages created at or before `cutoff`, oldest first.
    pub async fn list_expired(
        &self,
        tenant: &TenantId,
        cutoff: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.repository.created_before(tenant, cutoff, limit).await
    }

    /// Deletes the tenant's messages among `ids`; returns how many were removed.
    ///
    /// Ids owned by another tenant are left untouched. Records are loaded and
    /// deleted in bulk so the cost does not grow with one round trip per id.
    pub async fn purge(&self, tenant: &TenantId, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let found = self.repository.find_many(ids).await?;
        let found_ids: HashSet<&str> = found
            .iter()
            .map(|message| message.id.as_str())
            .collect();

        let mut owned_ids = HashSet::new();
        let mut owned = Vec::with_capacity(found.len());
        for message in &found {
            if &message.tenant != tenant {
                debug!(
                    tenant = %tenant,
                    message_id = %message.id,
                    "skipping purge of dlq message owned by another tenant"
                );
                continue;
            }
            if owned_ids.insert(message.id.as_str()) {
                owned.push(message.clone());
            }
        }

        let dangling: Vec<String> = ids
            .iter()
            .filter(|id| !found_ids.contains(id.as_str()))
            .cloned()
            .collect();
        if !dangling.is_empty() {
            self.repository.untrack(tenant, &dangling).await?;
        }

        if owned.is_empty() {
            return Ok(0);
        }

        self.repository.delete_many(&owned).await
    }
}
