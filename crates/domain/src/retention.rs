use std::fmt::{Display, Formatter};
use std::str::FromStr;

use guardrail_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};

/// Tenant resource kinds that retention policies can expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionResource {
    /// SQL-backed audit log entries.
    Audit,
    /// Dead-letter queue messages.
    DlqMsg,
    /// Idempotency markers.
    IdempKeys,
    /// Outbound webhook delivery logs.
    WebhookLogs,
}

impl RetentionResource {
    /// Every known resource, in stable order.
    pub const ALL: [Self; 4] = [Self::Audit, Self::DlqMsg, Self::IdempKeys, Self::WebhookLogs];

    /// Returns the stable wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audit => "audit",
            Self::DlqMsg => "dlq_msg",
            Self::IdempKeys => "idemp_keys",
            Self::WebhookLogs => "webhook_logs",
        }
    }
}

impl Display for RetentionResource {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for RetentionResource {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|resource| resource.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown retention resource '{value}'")))
    }
}

/// Time-to-live rule for one tenant resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Owning tenant.
    pub tenant: TenantId,
    /// Resource kind governed by this rule.
    pub resource: RetentionResource,
    /// Maximum age in seconds before an item becomes purgeable.
    pub ttl_seconds: u64,
    /// Disabled policies never yield purge candidates.
    pub enabled: bool,
}

impl RetentionPolicy {
    /// Creates a retention policy.
    #[must_use]
    pub fn new(
        tenant: TenantId,
        resource: RetentionResource,
        ttl_seconds: u64,
        enabled: bool,
    ) -> Self {
        Self {
            tenant,
            resource,
            ttl_seconds,
            enabled,
        }
    }

    /// Builds a policy from unvalidated admin input.
    pub fn from_input(input: RetentionPolicyInput) -> AppResult<Self> {
        let tenant = TenantId::new(input.tenant)?;
        let resource = input.resource.parse::<RetentionResource>()?;
        let ttl_seconds = u64::try_from(input.ttl_seconds).map_err(|_| {
            AppError::Validation(format!(
                "ttl_seconds must be zero or greater, got {}",
                input.ttl_seconds
            ))
        })?;

        Ok(Self::new(tenant, resource, ttl_seconds, input.enabled))
    }

    /// Returns the expiry cutoff for `now`, or `None` when the policy must not
    /// delete anything.
    #[must_use]
    pub fn cutoff(&self, now: f64) -> Option<f64> {
        if !self.enabled || self.ttl_seconds == 0 {
            return None;
        }

        Some(now - self.ttl_seconds as f64)
    }
}

/// Unvalidated policy upsert received from the admin collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicyInput {
    /// Tenant identifier.
    pub tenant: String,
    /// Resource wire name.
    pub resource: String,
    /// Requested ttl in seconds.
    pub ttl_seconds: i64,
    /// Whether the policy is active.
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> TenantId {
        TenantId::new("acme").unwrap_or_else(|_| panic!("tenant"))
    }

    #[test]
    fn resource_names_round_trip() {
        for resource in RetentionResource::ALL {
            assert_eq!(resource.as_str().parse::<RetentionResource>().ok(), Some(resource));
        }
        assert!("audit_log".parse::<RetentionResource>().is_err());
    }

    #[test]
    fn resource_serializes_as_wire_name() {
        let encoded = serde_json::to_string(&RetentionResource::DlqMsg).unwrap_or_default();
        assert_eq!(encoded, "\"dlq_msg\"");
    }

    #[test]
    fn cutoff_is_none_for_disabled_or_zero_ttl() {
        let disabled = RetentionPolicy::new(acme(), RetentionResource::DlqMsg, 60, false);
        let zero_ttl = RetentionPolicy::new(acme(), RetentionResource::DlqMsg, 0, true);
        let active = RetentionPolicy::new(acme(), RetentionResource::DlqMsg, 60, true);

        assert_eq!(disabled.cutoff(1_000.0), None);
        assert_eq!(zero_ttl.cutoff(1_000.0), None);
        assert_eq!(active.cutoff(1_000.0), Some(940.0));
    }

    #[test]
    fn input_with_negative_ttl_is_rejected() {
        let result = RetentionPolicy::from_input(RetentionPolicyInput {
            tenant: "acme".to_owned(),
            resource: "idemp_keys".to_owned(),
            ttl_seconds: -1,
            enabled: true,
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn input_with_unknown_resource_is_rejected() {
        let result = RetentionPolicy::from_input(RetentionPolicyInput {
            tenant: "acme".to_owned(),
            resource: "sessions".to_owned(),
            ttl_seconds: 60,
            enabled: true,
        });
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
