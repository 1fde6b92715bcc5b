//! # Configuration
//!
//! Settings come from an optional `carbonflow.toml`, then environment
//! overrides. Every field has a default, so an empty file and no env vars is
//! a valid configuration.
//!
//! ## Environment Variables
//!
//! - `CARBONFLOW_OPTIMIZER_URL`: base URL of the per-stage optimizer
//! - `CARBONFLOW_OPTIMIZER_API_KEY`: bearer token for the optimizer
//! - `CARBONFLOW_OPTIMIZER_TIMEOUT_SECS`: per-request timeout
//! - `CARBONFLOW_WORKERS`: concurrent optimizer requests (1 = sequential)
//! - `CARBONFLOW_PROPAGATION`: `one_hop` or `descendants`
//! - `CARBONFLOW_CORS_ORIGINS`: read by the HTTP layer, see `api`

use carbonflow_core::{LayoutConfig, PropagationPolicy, StoreSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "carbonflow.toml";

/// Default optimizer timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },
}

/// Optimizer client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Concurrent optimizer requests; `1` keeps the batch strictly sequential.
    pub workers: usize,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

/// Engine settings handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub propagation: PropagationPolicy,
    pub history_limit: Option<usize>,
    pub seed: Option<u64>,
    pub layout: LayoutConfig,
}

/// Full application configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub optimizer: OptimizerConfig,
    pub completion: CompletionConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Load `path` if given, else `carbonflow.toml` when it exists, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(url) = lookup("CARBONFLOW_OPTIMIZER_URL") {
            self.optimizer.base_url = url;
        }
        if let Some(key) = lookup("CARBONFLOW_OPTIMIZER_API_KEY") {
            self.optimizer.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(secs) = lookup("CARBONFLOW_OPTIMIZER_TIMEOUT_SECS") {
            self.optimizer.timeout_secs = parse_env("CARBONFLOW_OPTIMIZER_TIMEOUT_SECS", &secs)?;
        }
        if let Some(workers) = lookup("CARBONFLOW_WORKERS") {
            self.completion.workers = parse_env("CARBONFLOW_WORKERS", &workers)?;
        }
        if let Some(policy) = lookup("CARBONFLOW_PROPAGATION") {
            self.engine.propagation = policy.parse().map_err(|e| ConfigError::Env {
                var: "CARBONFLOW_PROPAGATION",
                message: format!("{}", e),
            })?;
        }
        Ok(())
    }

    /// Store settings derived from the engine section.
    #[must_use]
    pub fn store_settings(&self) -> StoreSettings {
        let defaults = StoreSettings::default();
        StoreSettings {
            propagation: self.engine.propagation,
            layout: self.engine.layout,
            history_limit: self.engine.history_limit.unwrap_or(defaults.history_limit),
            seed: self.engine.seed.unwrap_or(defaults.seed),
        }
    }

    /// Worker count, never below one.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.completion.workers.max(1)
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        message: e.to_string(),
    })
}
