use chrono::{DateTime, Utc};

/// Converts a UTC instant to fractional Unix epoch seconds.
///
/// Microsecond precision is kept so values survive a round trip through
/// Redis sorted-set scores.
#[must_use]
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// Returns the current time as fractional Unix epoch seconds.
#[must_use]
pub fn now_epoch_seconds() -> f64 {
    epoch_seconds(Utc::now())
}
