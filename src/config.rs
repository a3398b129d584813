//! Service configuration.
//!
//! Resolution order:
//! 1. explicit path (`--config`)
//! 2. `HMI_TELEMETRY_CONFIG` environment variable
//! 3. `./hmi-telemetry.toml`
//! 4. built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::catalog::{default_specs, SignalCatalog, SignalSpec};

pub const CONFIG_ENV: &str = "HMI_TELEMETRY_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "hmi-telemetry.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Built-in synthetic vehicle.
    Simulated,
    /// Newline-delimited JSON frames on stdin.
    Stdin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// A signal older than this is reported `is_stale`.
    #[serde(default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: u64,

    /// Silence on the bus longer than this reports `connected: false`.
    #[serde(default = "default_disconnect_threshold_ms")]
    pub disconnect_threshold_ms: u64,

    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: u64,

    /// Signals not seen for this long are evicted.
    #[serde(default = "default_prune_max_age_ms")]
    pub prune_max_age_ms: u64,

    #[serde(default = "default_prune_interval_ms")]
    pub prune_interval_ms: u64,

    #[serde(default = "default_true")]
    pub enforce_allow_list: bool,

    #[serde(default = "default_source")]
    pub source: SourceKind,

    #[serde(default = "default_simulated_period_ms")]
    pub simulated_period_ms: u64,

    #[serde(default = "default_specs")]
    pub signals: Vec<SignalSpec>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_stale_threshold_ms() -> u64 {
    500
}

fn default_disconnect_threshold_ms() -> u64 {
    500
}

fn default_rate_window_ms() -> u64 {
    5_000
}

fn default_prune_max_age_ms() -> u64 {
    60_000
}

fn default_prune_interval_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_source() -> SourceKind {
    SourceKind::Simulated
}

fn default_simulated_period_ms() -> u64 {
    50
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            stale_threshold_ms: default_stale_threshold_ms(),
            disconnect_threshold_ms: default_disconnect_threshold_ms(),
            rate_window_ms: default_rate_window_ms(),
            prune_max_age_ms: default_prune_max_age_ms(),
            prune_interval_ms: default_prune_interval_ms(),
            enforce_allow_list: default_true(),
            source: default_source(),
            simulated_period_ms: default_simulated_period_ms(),
            signals: default_specs(),
        }
    }
}

impl ServiceConfig {
    /// Loads from an explicit path, the environment, the working directory, or falls
    /// back to defaults, in that order.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let candidate = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(|| {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                local.exists().then_some(local)
            });

        let config = match candidate {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("stale_threshold_ms", self.stale_threshold_ms),
            ("disconnect_threshold_ms", self.disconnect_threshold_ms),
            ("rate_window_ms", self.rate_window_ms),
            ("prune_interval_ms", self.prune_interval_ms),
            ("simulated_period_ms", self.simulated_period_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be > 0", name)));
            }
        }
        if self.prune_max_age_ms <= self.stale_threshold_ms {
            return Err(ConfigError::Invalid(format!(
                "prune_max_age_ms ({}) must exceed stale_threshold_ms ({})",
                self.prune_max_age_ms, self.stale_threshold_ms
            )));
        }
        for spec in &self.signals {
            if let (Some(min), Some(max)) = (spec.min, spec.max) {
                if min > max {
                    return Err(ConfigError::Invalid(format!(
                        "signal '{}' has min {} > max {}",
                        spec.id, min, max
                    )));
                }
            }
            if spec.scale == 0.0 || !spec.scale.is_finite() {
                return Err(ConfigError::Invalid(format!("signal '{}' has invalid scale", spec.id)));
            }
            if spec.length == 0 || spec.length > 64 {
                return Err(ConfigError::Invalid(format!(
                    "signal '{}' bit length must be 1..=64",
                    spec.id
                )));
            }
        }
        Ok(())
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_millis(self.stale_threshold_ms)
    }

    pub fn disconnect_threshold(&self) -> Duration {
        Duration::from_millis(self.disconnect_threshold_ms)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    pub fn prune_max_age(&self) -> Duration {
        Duration::from_millis(self.prune_max_age_ms)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms)
    }

    pub fn simulated_period(&self) -> Duration {
        Duration::from_millis(self.simulated_period_ms)
    }

    pub fn catalog(&self) -> SignalCatalog {
        SignalCatalog::new(self.signals.clone(), self.enforce_allow_list)
    }
}
