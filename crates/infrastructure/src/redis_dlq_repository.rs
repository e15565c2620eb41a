//! Redis-backed dead-letter queue repository.

use std::collections::HashMap;

use async_trait::async_trait;
use guardrail_application::{DlqQueue, DlqRepository};
use guardrail_core::{AppResult, TenantId};
use guardrail_domain::DlqMessage;
use redis::{AsyncCommands, Script};
use tracing::warn;

use crate::redis_support::{connect, limit_count, range_stop, storage_error};

mod codec;


use codec::{decode_message, encode_message, parse_queue_member, queue_member};

const DELETE_BATCH_SIZE: usize = 500;

const RECORD_FAILURE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return nil
end
redis.call('HINCRBY', KEYS[1], 'tries', 1)
redis.call('HSET', KEYS[1], 'last_error', ARGV[1], 'last_attempt_ts', ARGV[2])
return redis.call('HGETALL', KEYS[1])
"#;

const RESCHEDULE_SCRIPT: &str = r#"
if redis.call('SISMEMBER', KEYS[3], ARGV[3]) == 1 then
  return 0
end
local tries = redis.call('HGET', KEYS[1], 'tries')
if not tries or tonumber(tries) ~= tonumber(ARGV[1]) then
  return 0
end
redis.call('HSET', KEYS[1], 'next_attempt_ts', ARGV[2])
redis.call('ZADD', KEYS[2], ARGV[2], ARGV[3])
return 1
"#;

const QUARANTINE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 0
end
redis.call('ZREM', KEYS[2], ARGV[1])
redis.call('SADD', KEYS[3], ARGV[1])
return 1
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return 0
end
redis.call('HSET', KEYS[1], 'next_attempt_ts', ARGV[2])
redis.call('SREM', KEYS[3], ARGV[1])
redis.call('ZADD', KEYS[2], ARGV[2], ARGV[1])
return 1
"#;

/// Redis implementation of the DLQ repository port.
///
/// Messages are hashes; each queue keeps a scheduled zset scored by
/// `next_attempt_ts` and a quarantine set, and each tenant a creation zset.
#[derive(Clone)]
pub struct RedisDlqRepository {
    client: redis::Client,
    key_prefix: String,
}

impl RedisDlqRepository {
    /// Creates a repository with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn message_key(&self, message_id: &str) -> String {
        format!("{}:dlq:msg:{message_id}", self.key_prefix)
    }

    fn scheduled_key(&self, tenant: &TenantId, topic: &str) -> String {
        format!("{}:dlq:sched:{tenant}:{topic}", self.key_prefix)
    }

    fn quarantine_key(&self, tenant: &TenantId, topic: &str) -> String {
        format!("{}:dlq:quarantine:{tenant}:{topic}", self.key_prefix)
    }

    fn created_key(&self, tenant: &TenantId) -> String {
        format!("{}:dlq:created:{tenant}", self.key_prefix)
    }

    fn queues_key(&self) -> String {
        format!("{}:dlq:queues", self.key_prefix)
    }

    async fn move_with_script(
        &self,
        script_source: &str,
        message: &DlqMessage,
        action: &str,
    ) -> AppResult<()> {
        let mut connection = connect(&self.client).await?;
        Script::new(script_source)
            .key(self.message_key(&message.id))
            .key(self.scheduled_key(&message.tenant, &message.topic))
            .key(self.quarantine_key(&message.tenant, &message.topic))
            .arg(message.id.as_str())
            .arg(message.next_attempt_ts)
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| storage_error(action, error))?;

        Ok(())
    }
}

#[async_trait]
impl DlqRepository for RedisDlqRepository {
    async fn insert(&self, message: &DlqMessage) -> AppResult<()> {
        let fields = encode_message(message)?;
        let mut connection = connect(&self.client).await?;

        redis::pipe()
            .atomic()
            .hset_multiple(self.message_key(&message.id), &fields)
            .ignore()
            .zadd(
                self.scheduled_key(&message.tenant, &message.topic),
                message.id.as_str(),
                message.next_attempt_ts,
            )
            .ignore()
            .zadd(
                self.created_key(&message.tenant),
                message.id.as_str(),
                message.created_ts,
            )
            .ignore()
            .sadd(
                self.queues_key(),
                queue_member(&message.tenant, &message.topic),
            )
            .ignore()
            .query_async::<()>(&mut connection)
            .await
            .map_err(|error| storage_error("insert dlq message", error))
    }

    async fn find(&self, message_id: &str) -> AppResult<Option<DlqMessage>> {
        let mut connection = connect(&self.client).await?;
        let fields: HashMap<String, String> = connection
            .hgetall(self.message_key(message_id))
            .await
            .map_err(|error| storage_error("load dlq message", error))?;

        decode_message(&fields)
    }

    async fn find_many(&self, message_ids: &[String]) -> AppResult<Vec<DlqMessage>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipeline = redis::pipe();
        for message_id in message_ids {
            pipeline.hgetall(self.message_key(message_id));
        }

        let mut connection = connect(&self.client).await?;
        let records: Vec<HashMap<String, String>> = pipeline
            .query_async(&mut connection)
            .await
            .map_err(|error| storage_error("load dlq messages", error))?;

        let mut messages = Vec::with_capacity(records.len());
        for fields in &records {
            if let Some(message) = decode_message(fields)? {
                messages.push(message);
            }
        }

        Ok(messages)
    }

    async fn due_ids(
        &self,
        queue: &DlqQueue,
        now: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut connection = connect(&self.client).await?;
        connection
            .zrangebyscore_limit(
                self.scheduled_key(&queue.tenant, &queue.topic),
                "-inf",
                now,
                0,
                limit_count(limit),
            )
            .await
            .map_err(|error| storage_error("read due dlq messages", error))
    }

    async fn scheduled_ids(&self, queue: &DlqQueue, limit: usize) -> AppResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut connection = connect(&self.client).await?;
        connection
            .zrange(
                self.scheduled_key(&queue.tenant, &queue.topic),
                0,
                range_stop(limit),
            )
            .await
            .map_err(|error| storage_error("read scheduled dlq messages", error))
    }

    async fn quarantined_ids(&self, queue: &DlqQueue) -> AppResult<Vec<String>> {
        let mut connection = connect(&self.client).await?;
        connection
            .smembers(self.quarantine_key(&queue.tenant, &queue.topic))
            .await
            .map_err(|error| storage_error("read dlq quarantine", error))
    }

    async fn queue_depth(&self, queue: &DlqQueue) -> AppResult<(u64, u64)> {
        let mut connection = connect(&self.client).await?;
        redis::pipe()
            .zcard(self.scheduled_key(&queue.tenant, &queue.topic))
            .scard(self.quarantine_key(&queue.tenant, &queue.topic))
            .query_async::<(u64, u64)>(&mut connection)
            .await
            .map_err(|error| storage_error("read dlq queue depth", error))
    }

    async fn list_queues(&self) -> AppResult<Vec<DlqQueue>> {
        let mut connection = connect(&self.client).await?;
        let members: Vec<String> = connection
            .smembers(self.queues_key())
            .await
            .map_err(|error| storage_error("list dlq queues", error))?;

        Ok(members
            .iter()
            .filter_map(|member| {
                let queue = parse_queue_member(member);
                if queue.is_none() {
                    warn!(member = %member, "ignoring malformed dlq queue registry entry");
                }
                queue
            })
            .collect())
    }

    async fn record_failure(
        &self,
        message_id: &str,
        error: &str,
        attempt_ts: f64,
    ) -> AppResult<Option<DlqMessage>> {
        let mut connection = connect(&self.client).await?;
        let fields = Script::new(RECORD_FAILURE_SCRIPT)
            .key(self.message_key(message_id))
            .arg(error)
            .arg(attempt_ts)
            .invoke_async::<Option<HashMap<String, String>>>(&mut connection)
            .await
            .map_err(|error| storage_error("record dlq failure", error))?;

        match fields {
            Some(fields) => decode_message(&fields),
            None => Ok(None),
        }
    }

    async fn reschedule(&self, message: &DlqMessage) -> AppResult<bool> {
        let mut connection = connect(&self.client).await?;
        let applied = Script::new(RESCHEDULE_SCRIPT)
            .key(self.message_key(&message.id))
            .key(self.scheduled_key(&message.tenant, &message.topic))
            .key(self.quarantine_key(&message.tenant, &message.topic))
            .arg(message.tries)
            .arg(message.next_attempt_ts)
            .arg(message.id.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| storage_error("reschedule dlq message", error))?;

        Ok(applied == 1)
    }

    async fn quarantine(&self, message: &DlqMessage) -> AppResult<()> {
        self.move_with_script(QUARANTINE_SCRIPT, message, "quarantine dlq message")
            .await
    }

    async fn release(&self, message: &DlqMessage) -> AppResult<()> {
        self.move_with_script(RELEASE_SCRIPT, message, "release dlq message")
            .await
    }

    async fn delete(&self, message: &DlqMessage) -> AppResult<bool> {
        let mut connection = connect(&self.client).await?;
        let (deleted, _, _, _): (u64, u64, u64, u64) = redis::pipe()
            .atomic()
            .del(self.message_key(&message.id))
            .zrem(
                self.scheduled_key(&message.tenant, &message.topic),
                message.id.as_str(),
            )
            .srem(
                self.quarantine_key(&message.tenant, &message.topic),
                message.id.as_str(),
            )
            .zrem(self.created_key(&message.tenant), message.id.as_str())
            .query_async(&mut connection)
            .await
            .map_err(|error| storage_error("delete dlq message", error))?;

        Ok(deleted > 0)
    }

    async fn created_before(
        &self,
        tenant: &TenantId,
        cutoff: f64,
        limit: usize,
    ) -> AppResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut connection = connect(&self.client).await?;
        connection
            .zrangebyscore_limit(self.created_key(tenant), "-inf", cutoff, 0, limit_count(limit))
            .await
            .map_err(|error| storage_error("read expired dlq messages", error))
    }

    async fn delete_many(&self, messages: &[DlqMessage]) -> AppResult<u64> {
        if messages.is_empty() {
            return Ok(0);
        }

        let mut connection = connect(&self.client).await?;
        let mut deleted = 0_u64;

        for batch in messages.chunks(DELETE_BATCH_SIZE) {
            let mut pipeline = redis::pipe();
            pipeline.atomic();
            for message in batch {
                pipeline
                    .del(self.message_key(&message.id))
                    .zrem(
                        self.scheduled_key(&message.tenant, &message.topic),
                        message.id.as_str(),
                    )
                    .ignore()
                    .srem(
                        self.quarantine_key(&message.tenant, &message.topic),
                        message.id.as_str(),
                    )
                    .ignore()
                    .zrem(self.created_key(&message.tenant), message.id.as_str())
                    .ignore();
            }

            let removed: Vec<u64> = pipeline
                .query_async(&mut connection)
                .await
                .map_err(|error| storage_error("delete dlq messages", error))?;
            deleted += removed.iter().filter(|count| **count > 0).count() as u64;
        }

        Ok(deleted)
    }

    async fn untrack(&self, tenant: &TenantId, message_ids: &[String]) -> AppResult<()> {
        if message_ids.is_empty() {
            return Ok(());
        }

        let mut connection = connect(&self.client).await?;
        connection
            .zrem::<_, _, ()>(self.created_key(tenant), message_ids)
            .await
            .map_err(|error| storage_error("untrack dlq messages", error))
    }
}
