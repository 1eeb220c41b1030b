//! Runtime settings for the polling core.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

const DEFAULT_MIN_CHECK_INTERVAL: u64 = 300;
const DEFAULT_MAX_CHECK_INTERVAL: u64 = 600;
const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("check interval window is inverted ({min}..{max})")]
    InvalidIntervalWindow { min: u64, max: u64 },
    #[error("invalid proxy url: {0}")]
    InvalidProxy(String),
}

/// Settings consumed by the fetch controller and the monitor scheduler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Forward proxy every profile poll is issued through. Polling without a
    /// proxy is a configuration error, not a degraded mode.
    pub proxy_url: Option<String>,
    /// Lower bound of the per-iteration check interval, in seconds.
    pub min_check_interval: u64,
    /// Upper bound of the per-iteration check interval, in seconds.
    pub max_check_interval: u64,
    pub max_retries: u32,
    pub generate_screenshots: bool,
    /// Session credentials handed to the default rotating pool.
    pub session_ids: Vec<String>,
    pub verification_badge_path: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            min_check_interval: DEFAULT_MIN_CHECK_INTERVAL,
            max_check_interval: DEFAULT_MAX_CHECK_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            generate_screenshots: true,
            session_ids: Vec::new(),
            verification_badge_path: None,
        }
    }
}

impl MonitorConfig {
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::new()
    }

    /// Loads settings from a JSON file; absent keys fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MonitorConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_check_interval < self.min_check_interval {
            return Err(ConfigError::InvalidIntervalWindow {
                min: self.min_check_interval,
                max: self.max_check_interval,
            });
        }
        if let Some(proxy) = self.proxy_url.as_deref()
            && Url::parse(proxy).is_err()
        {
            return Err(ConfigError::InvalidProxy(proxy.to_string()));
        }
        Ok(())
    }
}

/// Fluent builder for [`MonitorConfig`].
#[derive(Debug, Default)]
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
        }
    }

    pub fn with_proxy_url(mut self, proxy: impl Into<String>) -> Self {
        self.config.proxy_url = Some(proxy.into());
        self
    }

    pub fn with_check_interval(mut self, min_secs: u64, max_secs: u64) -> Self {
        self.config.min_check_interval = min_secs;
        self.config.max_check_interval = max_secs;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn with_screenshots(mut self, enabled: bool) -> Self {
        self.config.generate_screenshots = enabled;
        self
    }

    pub fn with_session_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.session_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_verification_badge_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.verification_badge_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<MonitorConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
