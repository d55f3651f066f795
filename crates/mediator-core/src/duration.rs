//! ISO-8601 durations (`PT10M`, `PT6H`, `P1DT2H30M`, `PT1.5S`)
//!
//! Only the day/time subset is supported: years, months and weeks have no
//! fixed length and are rejected, as are negative durations.

use std::time::Duration;

use crate::error::{Error, Result};

const SECS_PER_DAY: u64 = 86_400;

/// Parse an ISO-8601 duration
pub fn parse(text: &str) -> Result<Duration> {
    let invalid = || Error::InvalidDuration(text.to_string());

    let upper = text.trim().to_ascii_uppercase();
    let rest = upper.strip_prefix('P').ok_or_else(invalid)?;
    let (date, time) = match rest.split_once('T') {
        Some((_, "")) => return Err(invalid()),
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };
    if date.is_empty() && time.is_none() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    if !date.is_empty() {
        let days: u64 = date
            .strip_suffix('D')
            .and_then(|d| d.parse().ok())
            .ok_or_else(invalid)?;
        let secs = days.checked_mul(SECS_PER_DAY).ok_or_else(invalid)?;
        total += Duration::from_secs(secs);
    }

    if let Some(time) = time {
        let mut number = String::new();
        let mut last_rank = 0;
        for c in time.chars() {
            let (rank, unit_secs) = match c {
                '0'..='9' | '.' => {
                    number.push(c);
                    continue;
                }
                'H' => (1, 3600),
                'M' => (2, 60),
                'S' => (3, 1),
                _ => return Err(invalid()),
            };
            if number.is_empty() || rank <= last_rank {
                return Err(invalid());
            }
            last_rank = rank;
            let part = if rank == 3 {
                let secs: f64 = number.parse().map_err(|_| invalid())?;
                Duration::try_from_secs_f64(secs).map_err(|_| invalid())?
            } else {
                let count: u64 = number.parse().map_err(|_| invalid())?;
                Duration::from_secs(count.checked_mul(unit_secs).ok_or_else(invalid)?)
            };
            total = total.checked_add(part).ok_or_else(invalid)?;
            number.clear();
        }
        if !number.is_empty() {
            return Err(invalid());
        }
    }

    Ok(total)
}

/// Format a duration in the ISO-8601 form accepted by [`parse`]
pub fn format(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, secs % 3600 / 60, secs % 60);
    let nanos = duration.subsec_nanos();

    let mut out = String::from("PT");
    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if nanos > 0 {
        let fraction = format!("{:09}", nanos);
        out.push_str(&format!("{}.{}S", seconds, fraction.trim_end_matches('0')));
    } else if seconds > 0 || out.len() == 2 {
        out.push_str(&format!("{}S", seconds));
    }
    out
}
