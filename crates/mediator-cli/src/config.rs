//! Layered configuration
//!
//! Built-in defaults, then the optional TOML file, then environment
//! variables and command-line flags.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! send_queue = 256
//!
//! [router]
//! cleanup_interval = "PT10M"
//! max_age = "PT6H"
//! statistics_interval = "PT1H"
//! idle_timeout = "PT30M"
//! locale = "de"
//! time_zone = "Europe/Berlin"
//! dictionary_dir = "/etc/stream-mediator/lang"
//! ```

use anyhow::{Context, Result};
use mediator_router::config::{parse_duration, parse_locale, parse_time_zone};
use mediator_router::RouterConfig;
use mediator_transport::WebSocketConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SEND_QUEUE: usize = 256;

/// Settings as read from a file or collected from the command line.
/// Every value is optional; unset values fall through to the next layer.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub router: RouterSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub send_queue: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterSection {
    pub cleanup_interval: Option<String>,
    pub max_age: Option<String>,
    pub statistics_interval: Option<String>,
    pub idle_timeout: Option<String>,
    pub locale: Option<String>,
    pub time_zone: Option<String>,
    pub dictionary_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Layer `overrides` on top of `self`
    pub fn merge(self, overrides: FileConfig) -> FileConfig {
        let (server, router) = (self.server, self.router);
        let (top, top_router) = (overrides.server, overrides.router);
        FileConfig {
            server: ServerSection {
                host: top.host.or(server.host),
                port: top.port.or(server.port),
                send_queue: top.send_queue.or(server.send_queue),
            },
            router: RouterSection {
                cleanup_interval: top_router.cleanup_interval.or(router.cleanup_interval),
                max_age: top_router.max_age.or(router.max_age),
                statistics_interval: top_router
                    .statistics_interval
                    .or(router.statistics_interval),
                idle_timeout: top_router.idle_timeout.or(router.idle_timeout),
                locale: top_router.locale.or(router.locale),
                time_zone: top_router.time_zone.or(router.time_zone),
                dictionary_dir: top_router.dictionary_dir.or(router.dictionary_dir),
            },
        }
    }
}

/// Fully resolved server settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub websocket: WebSocketConfig,
    pub router: RouterConfig,
}

impl Settings {
    pub fn resolve(config: FileConfig) -> Result<Self> {
        let mut router = RouterConfig::default();
        let section = config.router;

        if let Some(value) = section.cleanup_interval {
            router.cleanup_interval = parse_duration("cleanup_interval", &value)?;
        }
        if let Some(value) = section.max_age {
            router.max_age = parse_duration("max_age", &value)?;
        }
        if let Some(value) = section.statistics_interval {
            router.statistics_interval = parse_duration("statistics_interval", &value)?;
        }
        if let Some(value) = section.idle_timeout {
            router.idle_timeout = parse_duration("idle_timeout", &value)?;
        }
        if let Some(value) = section.locale {
            router.locale = parse_locale(&value)?;
        }
        if let Some(value) = section.time_zone {
            router.time_zone = parse_time_zone(&value)?;
        }
        if section.dictionary_dir.is_some() {
            router.dictionary_dir = section.dictionary_dir;
        }
        router.validate()?;

        let host = config
            .server
            .host
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = config.server.port.unwrap_or(DEFAULT_PORT);
        let send_queue = config.server.send_queue.unwrap_or(DEFAULT_SEND_QUEUE);
        if send_queue == 0 {
            anyhow::bail!("send_queue must not be zero");
        }

        Ok(Self {
            bind: format!("{}:{}", host, port),
            // The router applies its idle timeout to every handle it greets
            websocket: WebSocketConfig {
                send_queue,
                idle_timeout: None,
                ..Default::default()
            },
            router,
        })
    }
}
