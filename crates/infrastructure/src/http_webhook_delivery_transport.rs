use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use guardrail_application::DlqDeliveryTransport;
use guardrail_core::{AppError, AppResult};
use guardrail_domain::DlqMessage;
use serde::Deserialize;
use serde_json::Value;

/// Delivery instructions stored in a DLQ webhook payload.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    url: String,
    #[serde(default)]
    body: Value,
    #[serde(default)]
    headers: BTreeMap<String, Value>,
}

fn parse_payload(payload: &Value) -> AppResult<WebhookPayload> {
    let parsed = WebhookPayload::deserialize(payload).map_err(|error| {
        AppError::Validation(format!("dlq webhook payload is invalid: {error}"))
    })?;

    if !(parsed.url.starts_with("https://") || parsed.url.starts_with("http://")) {
        return Err(AppError::Validation(format!(
            "dlq webhook url must be http(s), got '{}'",
            parsed.url
        )));
    }

    Ok(parsed)
}

/// Re-posts dead-lettered webhooks once per redelivery attempt.
///
/// Retry pacing belongs to the DLQ, so the transport never retries itself.
pub struct HttpWebhookDeliveryTransport {
    http_client: reqwest::Client,
    timeout: Duration,
}

impl HttpWebhookDeliveryTransport {
    /// Creates a transport with a per-request timeout.
    #[must_use]
    pub fn new(http_client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }
}

#[async_trait]
impl DlqDeliveryTransport for HttpWebhookDeliveryTransport {
    async fn deliver(&self, message: &DlqMessage) -> AppResult<()> {
        let payload = parse_payload(&message.payload)?;

        let mut builder = self
            .http_client
            .post(payload.url.as_str())
            .timeout(self.timeout)
            .header("Idempotency-Key", message.id.as_str());
        for (key, value) in &payload.headers {
            if let Some(header_value) = value.as_str() {
                builder = builder.header(key, header_value);
            }
        }
        if !payload.body.is_null() {
            builder = builder.json(&payload.body);
        }

        let response = builder.send().await.map_err(|error| {
            AppError::Unavailable(format!("webhook redelivery transport error: {error}"))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        Err(AppError::Unavailable(format!(
            "webhook redelivery failed with status {status}"
        )))
    }
}
