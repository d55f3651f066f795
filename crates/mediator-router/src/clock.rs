//! Wall-clock rendering of monotonic timestamps for log output

use chrono::{Duration as ChronoDuration, Utc};
use chrono_tz::Tz;
use std::time::Instant;

/// Render `at` as an ISO local date-time in `tz`.
///
/// Instants in the future are rendered as the current time.
pub fn wall_time(at: Instant, tz: Tz) -> String {
    let age = ChronoDuration::from_std(at.elapsed()).unwrap_or_else(|_| ChronoDuration::zero());
    (Utc::now() - age)
        .with_timezone(&tz)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}
