use std::fmt::{Display, Formatter};

use guardrail_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::canonical_json::canonical_json;
use crate::retention::RetentionResource;

/// Maximum number of purged ids echoed in one receipt.
pub const RECEIPT_ID_SAMPLE_LIMIT: usize = 100;

/// How a purge was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeMode {
    /// Scheduled retention sweep.
    Auto,
    /// Operator-requested purge.
    Manual,
}

impl PurgeMode {
    /// Parses a mode label; anything other than `auto` is treated as manual.
    #[must_use]
    pub fn from_label(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("auto") {
            Self::Auto
        } else {
            Self::Manual
        }
    }

    /// Returns the stable wire label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

impl Display for PurgeMode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Identifies the process that produced a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptMeta {
    /// Host name.
    pub host: String,
    /// Worker or API instance identifier.
    pub instance: String,
    /// Build version.
    pub version: String,
}

/// Inputs for building one purge receipt.
#[derive(Debug, Clone)]
pub struct PurgeReceiptInput {
    /// Tenant whose data was purged.
    pub tenant: TenantId,
    /// Purged resource.
    pub resource: RetentionResource,
    /// Every id the purge targeted.
    pub affected_ids: Vec<String>,
    /// Items actually removed by the target.
    pub purged_count: u64,
    /// Purge start time in epoch seconds.
    pub started_ts: f64,
    /// Purge completion time in epoch seconds.
    pub completed_ts: f64,
    /// Who requested the purge.
    pub actor: String,
    /// Initiation mode.
    pub mode: PurgeMode,
    /// Whether deletion was skipped.
    pub dry_run: bool,
    /// Producing process.
    pub meta: ReceiptMeta,
}

/// Immutable audit record of one purge execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurgeReceipt {
    id: String,
    tenant: TenantId,
    resource: RetentionResource,
    count: u64,
    ids: Vec<String>,
    truncated_ids: bool,
    started_ts: f64,
    completed_ts: f64,
    actor: String,
    mode: PurgeMode,
    dry_run: bool,
    meta: ReceiptMeta,
}

impl PurgeReceipt {
    /// Builds a receipt with a fresh id.
    ///
    /// The id sample is capped at [`RECEIPT_ID_SAMPLE_LIMIT`]; dry runs always
    /// report a count of zero.
    #[must_use]
    pub fn new(input: PurgeReceiptInput) -> Self {
        let truncated_ids = input.affected_ids.len() > RECEIPT_ID_SAMPLE_LIMIT;
        let mut ids = input.affected_ids;
        ids.truncate(RECEIPT_ID_SAMPLE_LIMIT);

        Self {
            id: Uuid::new_v4().to_string(),
            tenant: input.tenant,
            resource: input.resource,
            count: if input.dry_run { 0 } else { input.purged_count },
            ids,
            truncated_ids,
            started_ts: input.started_ts,
            completed_ts: input.completed_ts,
            actor: input.actor,
            mode: input.mode,
            dry_run: input.dry_run,
            meta: input.meta,
        }
    }

    /// Rebuilds a receipt from its payload form.
    pub fn from_payload(payload: Value) -> AppResult<Self> {
        serde_json::from_value(payload)
            .map_err(|error| AppError::Internal(format!("invalid purge receipt payload: {error}")))
    }

    /// Returns the plain payload exchanged with the export layer.
    pub fn to_payload(&self) -> AppResult<Value> {
        serde_json::to_value(self)
            .map_err(|error| AppError::Internal(format!("failed to encode purge receipt: {error}")))
    }

    /// Returns the exact bytes that signatures cover.
    pub fn signing_input(&self) -> AppResult<Vec<u8>> {
        Ok(canonical_json(&self.to_payload()?).into_bytes())
    }

    /// Returns the receipt id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the tenant.
    #[must_use]
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Returns the purged resource.
    #[must_use]
    pub fn resource(&self) -> RetentionResource {
        self.resource
    }

    /// Returns the number of items actually purged.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the echoed id sample.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        self.ids.as_slice()
    }

    /// Returns whether the id sample was capped.
    #[must_use]
    pub fn truncated_ids(&self) -> bool {
        self.truncated_ids
    }

    /// Returns the start time.
    #[must_use]
    pub fn started_ts(&self) -> f64 {
        self.started_ts
    }

    /// Returns the completion time.
    #[must_use]
    pub fn completed_ts(&self) -> f64 {
        self.completed_ts
    }

    /// Returns the requesting actor.
    #[must_use]
    pub fn actor(&self) -> &str {
        self.actor.as_str()
    }

    /// Returns the initiation mode.
    #[must_use]
    pub fn mode(&self) -> PurgeMode {
        self.mode
    }

    /// Returns whether deletion was skipped.
    #[must_use]
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns the producing process metadata.
    #[must_use]
    pub fn meta(&self) -> &ReceiptMeta {
        &self.meta
    }
}

/// Signature algorithms accepted for purge receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// Symmetric HMAC-SHA256.
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
    /// Asymmetric Ed25519.
    #[serde(rename = "ed25519")]
    Ed25519,
}

/// Detached signature over a receipt's canonical payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSignature {
    /// Signing algorithm.
    pub alg: SignatureAlgorithm,
    /// Key identifier.
    pub kid: String,
    /// Base64 signature bytes.
    pub sig: String,
}

/// A receipt persisted together with its signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPurgeReceipt {
    /// Signed receipt.
    pub receipt: PurgeReceipt,
    /// Signature over the receipt payload.
    pub signature: ReceiptSignature,
}
