//! Core runtime configuration.
//!
//! # Responsibility
//! - Describe logging, storage and live-view retry settings.
//! - Load them from a JSON file, falling back to defaults when absent.
//!
//! # Invariants
//! - A returned `CoreConfig` has passed `validate()`.
//! - Missing keys take their default values.

use crate::logging::{default_log_level, init_logging, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_RESUBSCRIBE_ATTEMPTS: u32 = 3;
const DEFAULT_RESUBSCRIBE_DELAY_MS: u64 = 200;

/// Configuration load/validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Io { path: PathBuf, message: String },
    Parse(String),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "cannot read config `{}`: {message}", path.display())
            }
            Self::Parse(message) => write!(f, "cannot parse config: {message}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// Retry policy used when a live subscription fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResubscribePolicy {
    /// Attempts per recovery before the view reports `StoreUnavailable`.
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * retry_delay_ms`.
    pub retry_delay_ms: u64,
}

impl ResubscribePolicy {
    /// Policy retrying `max_attempts` times with no delay.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            retry_delay_ms: 0,
        }
    }

    /// Delay before the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

impl Default for ResubscribePolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RESUBSCRIBE_ATTEMPTS,
            retry_delay_ms: DEFAULT_RESUBSCRIBE_DELAY_MS,
        }
    }
}

/// Top-level configuration for hosts embedding the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling logs; logging stays off when absent.
    pub log_dir: Option<PathBuf>,
    /// SQLite database file; hosts choose their own default when absent.
    pub database_path: Option<PathBuf>,
    pub resubscribe: ResubscribePolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            database_path: None,
            resubscribe: ResubscribePolicy::default(),
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON config document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads config from `path`; a missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        if self.resubscribe.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "resubscribe.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Starts file logging when `log_dir` is set.
    ///
    /// Returns `Ok(false)` when logging is not configured.
    pub fn init_logging(&self) -> Result<bool, String> {
        let Some(dir) = &self.log_dir else {
            return Ok(false);
        };
        let dir = dir
            .to_str()
            .ok_or_else(|| format!("log_dir `{}` is not valid UTF-8", dir.display()))?;
        init_logging(&self.log_level, dir)?;
        Ok(true)
    }
}
