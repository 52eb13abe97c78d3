//! Configuration loading and validation for llmloop.
//!
//! Loads configuration from `~/.llmloop/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.llmloop/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Turn budget applied to request options built from this config
    #[serde(default = "default_turns")]
    pub default_turns: u32,

    /// Model override; when unset the adapter's default model is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Retry policy for provider calls that fail before producing output
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_turns() -> u32 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_turns: default_turns(),
            default_model: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Shape of the delay growth between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,

    #[serde(default)]
    pub initial_delay_ms: u64,

    #[serde(default = "default_backoff")]
    pub backoff: BackoffKind,

    /// Growth factor for exponential backoff
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound on a single delay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

fn default_backoff() -> BackoffKind {
    BackoffKind::Exponential
}
fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 0,
            backoff: default_backoff(),
            multiplier: default_multiplier(),
            max_delay_ms: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default path (~/.llmloop/config.toml).
    ///
    /// Environment variables override file values:
    /// - `LLMLOOP_MODEL`
    /// - `LLMLOOP_TURNS`
    /// - `LLMLOOP_MAX_RETRIES`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment-like lookup.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(model) = lookup("LLMLOOP_MODEL") {
            self.default_model = Some(model);
        }
        if let Some(turns) = lookup("LLMLOOP_TURNS") {
            self.default_turns = parse_env("LLMLOOP_TURNS", &turns)?;
        }
        if let Some(retries) = lookup("LLMLOOP_MAX_RETRIES") {
            self.retry.max_retries = parse_env("LLMLOOP_MAX_RETRIES", &retries)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".llmloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_turns == 0 {
            return Err(ConfigError::ValidationError(
                "default_turns must be at least 1".into(),
            ));
        }

        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "retry.multiplier must be >= 1.0".into(),
            ));
        }

        if let Some(max_delay_ms) = self.retry.max_delay_ms
            && max_delay_ms < self.retry.initial_delay_ms
        {
            return Err(ConfigError::ValidationError(
                "retry.max_delay_ms must be >= retry.initial_delay_ms".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!("{key} must be a non-negative integer, got '{value}'"))
    })
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
