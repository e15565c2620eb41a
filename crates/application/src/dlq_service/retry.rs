use rand::Rng;
use tracing::{debug, warn};

use super::*;

impl DlqService {
    /// Records a failed redelivery.
    ///
    /// Returns the rescheduled message, or `None` when the id is unknown or the
    /// retry budget is exhausted and the message was quarantined.
    pub async fn nack(&self, message_id: &str, error: &str) -> AppResult<Option<DlqMessage>> {
        let now = now_epoch_seconds();
        let Some(mut message) = self
            .repository
            .record_failure(message_id, error, now)
            .await?
        else {
            return Ok(None);
        };

        if self.retry_policy.is_exhausted(message.tries) {
            self.repository.quarantine(&message).await?;
            self.record(&message.tenant, "dlq_quarantined").await;
            warn!(
                tenant = %message.tenant,
                topic = %message.topic,
                message_id = %message.id,
                tries = message.tries,
                "dlq message quarantined after exhausting retries"
            );
            return Ok(None);
        }

        let delay = self
            .retry_policy
            .jittered_delay(message.tries, unit_sample(self.retry_policy.jitter_frac));
        message.next_attempt_ts = (now + delay).max(message.created_ts);

        if !self.repository.reschedule(&message).await? {
            // A concurrent nack or quarantine changed the record first.
            debug!(
                message_id = %message.id,
                tries = message.tries,
                "dlq reschedule superseded by concurrent update"
            );
            let current = self.repository.find(message_id).await?;
            return Ok(current.filter(|stored| !self.retry_policy.is_exhausted(stored.tries)));
        }

        self.record(&message.tenant, "dlq_rescheduled").await;
        Ok(Some(message))
    }
}

fn unit_sample(jitter_frac: f64) -> f64 {
    if jitter_frac <= 0.0 {
        return 0.0;
    }

    rand::thread_rng().gen_range(-1.0..=1.0)
}
