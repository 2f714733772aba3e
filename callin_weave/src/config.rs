//! Engine configuration.
//!
//! Loaded from a TOML file (every key optional) and then adjusted by
//! environment variables:
//!
//! ```toml
//! lift_method_prefix = "_OT$liftTo$"
//! missing_after_binding = "stop"   # or "fail"
//! plan_cache = true
//! resolution_cache = true
//! ```
//!
//! - `CALLIN_WEAVE_DISABLE_PLAN_CACHE=1` turns the plan cache off.
//! - `CALLIN_WEAVE_DISABLE_RESOLUTION_CACHE=1` turns lift/role method caching off.
//! - `CALLIN_WEAVE_AFTER_POLICY=stop|fail` overrides `missing_after_binding`.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LIFT_PREFIX: &str = "_OT$liftTo$";

pub const ENV_DISABLE_PLAN_CACHE: &str = "CALLIN_WEAVE_DISABLE_PLAN_CACHE";
pub const ENV_DISABLE_RESOLUTION_CACHE: &str = "CALLIN_WEAVE_DISABLE_RESOLUTION_CACHE";
pub const ENV_AFTER_POLICY: &str = "CALLIN_WEAVE_AFTER_POLICY";

/// What the after stage does when a slot has no matching after binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingAfterBindingPolicy {
    /// Log a warning, skip the remaining after callins and keep the result.
    #[default]
    Stop,
    /// Abort the dispatch with a configuration error.
    Fail,
}

impl fmt::Display for MissingAfterBindingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingAfterBindingPolicy::Stop => f.write_str("stop"),
            MissingAfterBindingPolicy::Fail => f.write_str("fail"),
        }
    }
}

impl FromStr for MissingAfterBindingPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(MissingAfterBindingPolicy::Stop),
            "fail" => Ok(MissingAfterBindingPolicy::Fail),
            other => Err(ConfigError::InvalidValue {
                key: "missing_after_binding",
                value: other.to_string(),
            }),
        }
    }
}

/// Error loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeaveConfig {
    /// Prefix of generated lift methods; the role class name is appended.
    pub lift_method_prefix: String,
    pub missing_after_binding: MissingAfterBindingPolicy,
    pub plan_cache: bool,
    pub resolution_cache: bool,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        WeaveConfig {
            lift_method_prefix: DEFAULT_LIFT_PREFIX.to_string(),
            missing_after_binding: MissingAfterBindingPolicy::Stop,
            plan_cache: true,
            resolution_cache: true,
        }
    }
}

impl WeaveConfig {
    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        let config: WeaveConfig = toml::from_str(src)?;
        if config.lift_method_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "lift_method_prefix",
                value: String::new(),
            });
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    /// Apply overrides read through `lookup`, which maps a variable name to
    /// its value.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup(ENV_DISABLE_PLAN_CACHE).is_some_and(|v| is_truthy(&v)) {
            self.plan_cache = false;
        }
        if lookup(ENV_DISABLE_RESOLUTION_CACHE).is_some_and(|v| is_truthy(&v)) {
            self.resolution_cache = false;
        }
        if let Some(policy) = lookup(ENV_AFTER_POLICY) {
            self.missing_after_binding = policy.parse()?;
        }
        Ok(self)
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Defaults adjusted by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}
