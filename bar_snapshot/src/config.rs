//! Listener configuration: parsing, validation, and loading.
//!
//! A config file is a small TOML table:
//!
//! ```toml
//! interval_len = 60
//! interval_type = "s"
//! fire_bars = true
//! mkt_snapshot_depth = 50
//! key_suffix = "_1m"
//! timezone = "America/New_York"
//! ```
//!
//! Entrypoints:
//! - Parse + validate from a TOML string: [`ListenerConfig::from_toml_str`]
//! - Parse + validate from a file path: [`ListenerConfig::from_path`]
//! - Path taken from `BAR_SNAPSHOT_CONFIG`: [`ListenerConfig::from_env`]

use std::{fs, path::Path};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use shared_utils::env::{MissingEnvVarError, get_env_path};
use thiserror::Error;

use crate::{
    models::interval::{Interval, IntervalError, IntervalType},
    snapshot::{expansion_steps, lattice::Lattice},
};

/// Environment variable holding the config file path.
pub const CONFIG_ENV_VAR: &str = "BAR_SNAPSHOT_CONFIG";

pub const DEFAULT_TIMEZONE: &str = "America/New_York";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Env(#[from] MissingEnvVarError),

    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("unknown timezone: {0}")]
    Timezone(String),

    #[error("market snapshots need a time-based interval, got `{0}`")]
    SnapshotInterval(IntervalType),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListenerConfig {
    /// Bar length in units of `interval_type`.
    pub interval_len: u32,

    #[serde(default)]
    pub interval_type: IntervalType,

    /// Publish a `bar` event for every bar received.
    #[serde(default = "default_fire_bars")]
    pub fire_bars: bool,

    /// Rows kept per symbol in the market snapshot; 0 disables the cache.
    #[serde(default)]
    pub mkt_snapshot_depth: usize,

    /// Appended to every output record key.
    #[serde(default)]
    pub key_suffix: String,

    /// IANA zone the vendor's bar dates and times are local to.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_fire_bars() -> bool {
    true
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

impl ListenerConfig {
    /// Config with defaults for everything but the interval.
    pub fn new(interval: Interval) -> Self {
        Self {
            interval_len: interval.len,
            interval_type: interval.kind,
            fire_bars: default_fire_bars(),
            mkt_snapshot_depth: 0,
            key_suffix: String::new(),
            timezone: default_timezone(),
        }
    }

    pub fn with_snapshot_depth(mut self, depth: usize) -> Self {
        self.mkt_snapshot_depth = depth;
        self
    }

    pub fn with_fire_bars(mut self, fire_bars: bool) -> Self {
        self.fire_bars = fire_bars;
        self
    }

    pub fn with_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.key_suffix = suffix.into();
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Loads the file named by [`CONFIG_ENV_VAR`].
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = get_env_path(CONFIG_ENV_VAR)?;
        Self::from_path(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.interval()?;
        self.tz()?;
        if self.mkt_snapshot_depth > 0 && !interval.kind.is_time_based() {
            return Err(ConfigError::SnapshotInterval(interval.kind));
        }
        Ok(())
    }

    pub fn interval(&self) -> Result<Interval, IntervalError> {
        Interval::new(self.interval_len, self.interval_type)
    }

    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::Timezone(self.timezone.clone()))
    }

    /// Time lattice of the snapshot grid. `None` for activity-based bars.
    pub fn snapshot_lattice(&self) -> Result<Option<Lattice>, ConfigError> {
        Ok(Lattice::for_interval(self.interval()?, self.tz()?))
    }

    /// Slots pre-allocated each time the snapshot grid grows.
    pub fn expansion_steps(&self) -> usize {
        expansion_steps(self.mkt_snapshot_depth)
    }
}
