//! Shared primitives for all Rust crates in Guardrail.

#![forbid(unsafe_code)]

/// Epoch-second clock helpers shared by storage scores and receipts.
pub mod time;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use time::{epoch_seconds, now_epoch_seconds};

/// Result type used across Guardrail crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Tenant identifier used as the partition key for every persisted resource.
///
/// Tenant ids are embedded in storage keys, so they may not contain
/// whitespace or the `:` key separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Creates a validated tenant identifier.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(AppError::Validation(
                "tenant id must not be empty".to_owned(),
            ));
        }

        if value
            .chars()
            .any(|character| character.is_whitespace() || character == ':')
        {
            return Err(AppError::Validation(format!(
                "tenant id '{value}' must not contain whitespace or ':'"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the underlying identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for TenantId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl Display for TenantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Process configuration is missing or unusable. Raised at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A storage backend or remote endpoint could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
