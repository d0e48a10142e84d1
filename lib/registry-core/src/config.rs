//! Console configuration: defaults, YAML file, environment

use crate::{ReachabilityClassifier, RegistryError, Result, DEFAULT_ONLINE_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_BASE_URL: &str = "PEER_CONSOLE_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "PEER_CONSOLE_TIMEOUT_SECS";
pub const ENV_ONLINE_THRESHOLD_SECS: &str = "PEER_CONSOLE_ONLINE_THRESHOLD_SECS";
pub const ENV_REFRESH_DELAY_MS: &str = "PEER_CONSOLE_REFRESH_DELAY_MS";
pub const ENV_WATCH_INTERVAL_SECS: &str = "PEER_CONSOLE_WATCH_INTERVAL_SECS";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Gateway management API root, e.g. `http://10.9.0.1:8000`
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Freshness window for deriving `is_online` from the handshake time.
    /// `null` keeps the backend's own flag.
    pub online_threshold_secs: Option<u64>,

    /// Pause between a batch of mutations and the refresh that follows it
    pub refresh_delay_ms: u64,

    /// Poll period of the watch loop
    pub watch_interval_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 10,
            online_threshold_secs: Some(DEFAULT_ONLINE_THRESHOLD.as_secs()),
            refresh_delay_ms: 500,
            watch_interval_secs: 30,
        }
    }
}

impl ConsoleConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|e| RegistryError::InvalidConfiguration(e.to_string()))
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        debug!("Loaded console config from {}", path.display());
        Self::from_yaml_str(&raw)
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_var(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ONLINE_THRESHOLD_SECS) {
            self.online_threshold_secs = Some(parse_var(ENV_ONLINE_THRESHOLD_SECS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_REFRESH_DELAY_MS) {
            self.refresh_delay_ms = parse_var(ENV_REFRESH_DELAY_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_WATCH_INTERVAL_SECS) {
            self.watch_interval_secs = parse_var(ENV_WATCH_INTERVAL_SECS, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RegistryError::InvalidConfiguration(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(RegistryError::InvalidConfiguration(
                "request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.watch_interval_secs == 0 {
            return Err(RegistryError::InvalidConfiguration(
                "watch_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }

    pub fn classifier(&self) -> Option<ReachabilityClassifier> {
        self.online_threshold_secs
            .map(|secs| ReachabilityClassifier::new(Duration::from_secs(secs)))
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        RegistryError::InvalidConfiguration(format!("{} has invalid value '{}'", key, raw))
    })
}
