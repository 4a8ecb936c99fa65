//! Timestamp helpers
//!
//! Write timestamps are stored as RFC 3339 strings with millisecond
//! precision. `now()` truncates to that precision so a timestamp survives a
//! format/parse round trip unchanged.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

/// Current time, truncated to milliseconds.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Render a timestamp the way it is stored in documents.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp. Returns `None` for anything not RFC 3339.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
