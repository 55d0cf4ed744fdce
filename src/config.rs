//! Configuration management for the sliding limiter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

use crate::error::{LimiterError, Result};

/// Longest accepted window: timestamps are `i64` seconds and the record
/// TTL adds one second on top.
const MAX_WINDOW_SECS: u64 = i64::MAX as u64 - 1;

/// Prefix for environment variable overrides, e.g. `SLIDING_LIMITER__LIMITER__LIMIT`.
const ENV_PREFIX: &str = "SLIDING_LIMITER";

/// Top-level settings: limiter parameters plus the backing store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Rate limiting parameters
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// In-memory store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Immutable parameters of a limiter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum unexpired events allowed per key
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Trailing window, in whole seconds, over which events count
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_limit() -> usize {
    100
}

fn default_window_secs() -> u64 {
    60
}

impl LimiterConfig {
    /// Build a validated configuration. The window is truncated to whole seconds.
    pub fn new(limit: usize, window: Duration) -> Result<Self> {
        let config = Self {
            limit,
            window_secs: window.as_secs(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject a zero limit, a window shorter than one second, or a window
    /// too long for its record TTL to be scheduled.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(LimiterError::Config("limit must be at least 1".to_string()));
        }
        if self.window_secs == 0 {
            return Err(LimiterError::Config(
                "window must be at least one second".to_string(),
            ));
        }
        if self.window_secs > MAX_WINDOW_SECS
            || Instant::now().checked_add(self.record_ttl()).is_none()
        {
            return Err(LimiterError::Config(format!(
                "window of {} seconds is too long",
                self.window_secs
            )));
        }
        Ok(())
    }

    /// The window as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Entry length at which an increment prunes first.
    pub fn prune_threshold(&self) -> usize {
        self.limit.saturating_mul(2)
    }

    /// Store TTL attached to every write: one second past the window.
    pub fn record_ttl(&self) -> Duration {
        self.window().saturating_add(Duration::from_secs(1))
    }
}

/// In-memory store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Interval between background sweeps; defaults to the record TTL
    #[serde(default)]
    pub sweep_interval_ms: Option<u64>,

    /// Number of keys to pre-allocate room for
    #[serde(default)]
    pub initial_capacity: usize,
}

impl StoreConfig {
    /// Resolve the sweep interval, falling back to the limiter's record TTL.
    pub fn sweep_interval(&self, limiter: &LimiterConfig) -> Duration {
        match self.sweep_interval_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms),
            _ => limiter.record_ttl(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file, layered with environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        if !path.exists() {
            return Err(LimiterError::Config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let settings: Settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.limiter.validate()?;
        Ok(settings)
    }

    /// Parse settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)
            .map_err(|e| LimiterError::Config(format!("Failed to parse settings: {}", e)))?;
        settings.limiter.validate()?;
        Ok(settings)
    }
}
