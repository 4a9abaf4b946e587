//! Timestamp helpers.
//!
//! Persisted timestamps are RFC 3339 strings in UTC with a fixed microsecond
//! precision, so they compare correctly both as instants and as text.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format an instant the way the store persists it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in persisted form.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Parse a persisted timestamp. Returns `None` for malformed input.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whole seconds elapsed from `start` to `end`, never negative.
pub fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds().max(0)
}
