//! Timestamp utilities
//!
//! The database stores instants as Unix milliseconds (`INTEGER` columns).

use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix milliseconds back to a UTC timestamp
///
/// Out-of-range values clamp to the Unix epoch.
pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
}

/// Convert a duration to whole milliseconds, saturating at `i64::MAX`
pub fn duration_to_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Time remaining until `due_ms`, zero if already due
pub fn until_ms(due_ms: i64, now_ms: i64) -> Duration {
    Duration::from_millis(due_ms.saturating_sub(now_ms).max(0) as u64)
}
