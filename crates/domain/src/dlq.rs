use guardrail_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One failed outbound delivery held for retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlqMessage {
    /// Stable message identifier.
    pub id: String,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Delivery topic, for example `webhooks`.
    pub topic: String,
    /// Opaque delivery payload.
    pub payload: Value,
    /// Number of failed redelivery attempts recorded so far.
    pub tries: u32,
    /// Enqueue time in epoch seconds.
    pub created_ts: f64,
    /// Time of the failure that caused the enqueue.
    pub first_failure_ts: f64,
    /// Time of the latest failed redelivery, if any.
    pub last_attempt_ts: Option<f64>,
    /// Earliest time the message is due for redelivery.
    pub next_attempt_ts: f64,
    /// Latest recorded failure reason.
    pub last_error: Option<String>,
}

impl DlqMessage {
    /// Creates a message that is due immediately.
    pub fn new_failed(
        id: impl Into<String>,
        tenant: TenantId,
        topic: impl Into<String>,
        payload: Value,
        error: Option<String>,
        now: f64,
    ) -> AppResult<Self> {
        let id = id.into();
        let topic = topic.into();
        if id.trim().is_empty() {
            return Err(AppError::Validation(
                "dlq message id must not be empty".to_owned(),
            ));
        }

        if topic.trim().is_empty() {
            return Err(AppError::Validation(
                "dlq topic must not be empty".to_owned(),
            ));
        }

        if !now.is_finite() {
            return Err(AppError::Validation(
                "dlq enqueue timestamp must be finite".to_owned(),
            ));
        }

        Ok(Self {
            id,
            tenant,
            topic,
            payload,
            tries: 0,
            created_ts: now,
            first_failure_ts: now,
            last_attempt_ts: None,
            next_attempt_ts: now,
            last_error: error.filter(|value| !value.is_empty()),
        })
    }
}

/// Retry budget and backoff curve for DLQ redelivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DlqRetryPolicy {
    /// Attempts allowed before a message is quarantined.
    pub max_tries: u32,
    /// Delay applied after the first failure.
    pub base_delay_sec: f64,
    /// Growth factor applied per additional failure.
    pub backoff_mult: f64,
    /// Upper bound for the un-jittered delay.
    pub max_delay_sec: f64,
    /// Fraction of the delay used as the symmetric jitter window.
    pub jitter_frac: f64,
}

impl Default for DlqRetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 8,
            base_delay_sec: 5.0,
            backoff_mult: 6.0,
            max_delay_sec: 900.0,
            jitter_frac: 0.15,
        }
    }
}

impl DlqRetryPolicy {
    /// Returns a copy with every field forced into its sane range.
    ///
    /// Non-finite values fall back to the defaults; finite values outside the
    /// allowed range are clamped.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();

        Self {
            max_tries: self.max_tries.max(1),
            base_delay_sec: finite_or(self.base_delay_sec, defaults.base_delay_sec).max(0.0),
            backoff_mult: finite_or(self.backoff_mult, defaults.backoff_mult).max(1.0),
            max_delay_sec: finite_or(self.max_delay_sec, defaults.max_delay_sec).max(0.0),
            jitter_frac: finite_or(self.jitter_frac, defaults.jitter_frac).clamp(0.0, 1.0),
        }
    }

    /// Returns whether a message with this many tries must be quarantined.
    #[must_use]
    pub fn is_exhausted(&self, tries: u32) -> bool {
        tries >= self.max_tries
    }

    /// Returns the un-jittered delay after the given number of failures.
    #[must_use]
    pub fn backoff_delay(&self, tries: u32) -> f64 {
        let exponent = i32::try_from(tries.max(1) - 1).unwrap_or(i32::MAX);
        let delay = self.base_delay_sec * self.backoff_mult.powi(exponent);

        if delay.is_finite() {
            delay.min(self.max_delay_sec)
        } else {
            self.max_delay_sec
        }
    }

    /// Applies jitter to the backoff delay.
    ///
    /// `unit_sample` is a uniform draw from `[-1, 1]`; the result is floored
    /// at zero.
    #[must_use]
    pub fn jittered_delay(&self, tries: u32, unit_sample: f64) -> f64 {
        let delay = self.backoff_delay(tries);
        let jitter = delay * self.jitter_frac * unit_sample.clamp(-1.0, 1.0);

        (delay + jitter).max(0.0)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}
