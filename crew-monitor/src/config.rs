//! Dashboard configuration.
//!
//! Defaults suit a backend running on the same host. Every field can be
//! overridden from the environment, which is how both binaries are
//! configured.

use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Poll cadence, measured from the end of one cycle to the start of the
/// next.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const ENV_API_URL: &str = "CREW_API_URL";
pub const ENV_POLL_INTERVAL: &str = "CREW_POLL_INTERVAL_SECS";
pub const ENV_AUTO_REFRESH: &str = "CREW_AUTO_REFRESH";
pub const ENV_REQUEST_TIMEOUT: &str = "CREW_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Base URL of the crew backend, without a trailing path.
    pub api_url: String,

    /// Delay between the end of a poll cycle and the next one while
    /// auto-refresh is on.
    pub poll_interval: Duration,

    /// Start with auto-refresh enabled. When off, the dashboard polls
    /// once at start and then only on operator request.
    pub auto_refresh: bool,

    /// Upper bound on any single HTTP request.
    pub request_timeout: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            auto_refresh: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl DashboardConfig {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            let url = url.trim().trim_end_matches('/');
            if url.is_empty() {
                return Err(Error::Config(format!("{ENV_API_URL} is empty")));
            }
            config.api_url = url.to_string();
        }

        if let Some(secs) = lookup(ENV_POLL_INTERVAL) {
            let secs = parse_secs(ENV_POLL_INTERVAL, &secs)?;
            if secs == 0 {
                return Err(Error::Config(format!("{ENV_POLL_INTERVAL} must be positive")));
            }
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Some(flag) = lookup(ENV_AUTO_REFRESH) {
            config.auto_refresh = parse_flag(ENV_AUTO_REFRESH, &flag)?;
        }

        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT) {
            config.request_timeout = Duration::from_secs(parse_secs(ENV_REQUEST_TIMEOUT, &secs)?);
        }

        Ok(config)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: expected whole seconds, got {value:?}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::Config(format!("{key}: expected a boolean, got {value:?}"))),
    }
}
