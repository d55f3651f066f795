//! Router configuration

use chrono_tz::Tz;
use mediator_core::{duration, Locale, MAX_MESSAGE_LEN};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, RouterError};

/// Router configuration.
///
/// Durations are wall-clock intervals. All of them must be non-zero.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Minimum time between two cleanup passes
    pub cleanup_interval: Duration,
    /// Sessions and connections older than this are evicted
    pub max_age: Duration,
    /// Minimum time between two statistics dumps
    pub statistics_interval: Duration,
    /// Idle timeout applied to every accepted connection
    pub idle_timeout: Duration,
    /// Locale used to case-fold names and session ids
    pub locale: Locale,
    /// Time zone of timestamps written to the log
    pub time_zone: Tz,
    /// Directory with `<lang>.json` dictionaries, consulted before the built-in ones
    pub dictionary_dir: Option<PathBuf>,
    /// Maximum message length in characters
    pub max_message_len: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(10 * 60),
            max_age: Duration::from_secs(6 * 60 * 60),
            statistics_interval: Duration::from_secs(60 * 60),
            idle_timeout: Duration::from_secs(30 * 60),
            locale: Locale::default(),
            time_zone: chrono_tz::Europe::Berlin,
            dictionary_dir: None,
            max_message_len: MAX_MESSAGE_LEN,
        }
    }
}

impl RouterConfig {
    /// Check the configuration for values the router cannot work with
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("cleanup interval", self.cleanup_interval),
            ("max age", self.max_age),
            ("statistics interval", self.statistics_interval),
            ("idle timeout", self.idle_timeout),
        ];
        for (what, value) in durations {
            if value.is_zero() {
                return Err(RouterError::Config(format!("{} must not be zero", what)));
            }
        }
        if self.max_message_len == 0 {
            return Err(RouterError::Config(
                "max message length must not be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse an ISO-8601 duration setting such as `PT10M`
pub fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    duration::parse(value).map_err(|e| RouterError::Config(format!("{}: {}", key, e)))
}

/// Parse a locale setting such as `de` or `tr-TR`
pub fn parse_locale(value: &str) -> Result<Locale> {
    Locale::new(value).map_err(|e| RouterError::Config(e.to_string()))
}

/// Parse an IANA time zone name such as `Europe/Berlin`
pub fn parse_time_zone(value: &str) -> Result<Tz> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|e| RouterError::Config(format!("unknown time zone {}: {}", value, e)))
}
