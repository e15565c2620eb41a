use std::collections::HashMap;

use guardrail_application::DlqQueue;
use guardrail_core::{AppError, AppResult, TenantId};
use guardrail_domain::DlqMessage;

pub(super) fn queue_member(tenant: &TenantId, topic: &str) -> String {
    format!("{tenant}:{topic}")
}

/// Tenant ids never contain `:`, so the first separator splits the pair.
pub(super) fn parse_queue_member(member: &str) -> Option<DlqQueue> {
    let (tenant, topic) = member.split_once(':')?;
    if topic.is_empty() {
        return None;
    }

    Some(DlqQueue {
        tenant: TenantId::new(tenant).ok()?,
        topic: topic.to_owned(),
    })
}

pub(super) fn encode_message(message: &DlqMessage) -> AppResult<Vec<(&'static str, String)>> {
    let payload = serde_json::to_string(&message.payload).map_err(|error| {
        AppError::Internal(format!("failed to encode dlq payload: {error}"))
    })?;

    Ok(vec![
        ("id", message.id.clone()),
        ("tenant", message.tenant.to_string()),
        ("topic", message.topic.clone()),
        ("payload", payload),
        ("tries", message.tries.to_string()),
        ("created_ts", message.created_ts.to_string()),
        ("first_failure_ts", message.first_failure_ts.to_string()),
        (
            "last_attempt_ts",
            message
                .last_attempt_ts
                .map(|value| value.to_string())
                .unwrap_or_default(),
        ),
        ("next_attempt_ts", message.next_attempt_ts.to_string()),
        ("last_error", message.last_error.clone().unwrap_or_default()),
    ])
}

/// Decodes a message hash; an empty hash means the record does not exist.
pub(super) fn decode_message(fields: &HashMap<String, String>) -> AppResult<Option<DlqMessage>> {
    if fields.is_empty() {
        return Ok(None);
    }

    let payload = serde_json::from_str(required(fields, "payload")?).map_err(|error| {
        AppError::Internal(format!("invalid dlq payload field: {error}"))
    })?;

    Ok(Some(DlqMessage {
        id: required(fields, "id")?.to_owned(),
        tenant: TenantId::new(required(fields, "tenant")?)?,
        topic: required(fields, "topic")?.to_owned(),
        payload,
        tries: parse_field(fields, "tries")?,
        created_ts: parse_field(fields, "created_ts")?,
        first_failure_ts: parse_field(fields, "first_failure_ts")?,
        last_attempt_ts: optional(fields, "last_attempt_ts")
            .map(|value| parse_value(value, "last_attempt_ts"))
            .transpose()?,
        next_attempt_ts: parse_field(fields, "next_attempt_ts")?,
        last_error: optional(fields, "last_error").map(ToOwned::to_owned),
    }))
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> AppResult<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| AppError::Internal(format!("dlq record is missing field '{name}'")))
}

fn optional<'a>(fields: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

fn parse_field<T: std::str::FromStr>(fields: &HashMap<String, String>, name: &str) -> AppResult<T> {
    parse_value(required(fields, name)?, name)
}

fn parse_value<T: std::str::FromStr>(value: &str, name: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|_| AppError::Internal(format!("invalid dlq record field '{name}': '{value}'")))
}
