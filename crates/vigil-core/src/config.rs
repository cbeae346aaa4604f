//! Configuration parsing and validation
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attempts::DEFAULT_LOCKOUT_THRESHOLD;
use crate::policy::AuthorizationPolicy;

/// Default OTP lifetime in seconds
pub const DEFAULT_OTP_TTL_SECS: u64 = 300;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Validation(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VigilConfig {
    /// Amount tiers
    #[serde(default)]
    pub policy: AuthorizationPolicy,

    /// Wrong-PIN lockout
    #[serde(default)]
    pub lockout: LockoutConfig,

    /// One-time codes
    #[serde(default)]
    pub otp: OtpConfig,

    /// Alert wording
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Where state and artifacts live
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Lockout settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// Consecutive failures before lockout
    #[serde(default = "default_lockout_threshold")]
    pub threshold: u32,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOCKOUT_THRESHOLD,
        }
    }
}

fn default_lockout_threshold() -> u32 {
    DEFAULT_LOCKOUT_THRESHOLD
}

/// One-time code settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpConfig {
    /// Code lifetime in seconds; 0 disables expiry
    #[serde(default = "default_otp_ttl")]
    pub ttl_secs: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_OTP_TTL_SECS,
        }
    }
}

impl OtpConfig {
    /// Lifetime as a duration, `None` when expiry is disabled
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

fn default_otp_ttl() -> u64 {
    DEFAULT_OTP_TTL_SECS
}

/// Alert wording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Name used in lockout alerts
    #[serde(default = "default_subject_name")]
    pub subject_name: String,

    /// Currency prefix used in high-value alerts
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            subject_name: default_subject_name(),
            currency: default_currency(),
        }
    }
}

fn default_subject_name() -> String {
    "User".to_string()
}

fn default_currency() -> String {
    "₹".to_string()
}

/// Storage locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for state, artifacts and the alert outbox
    #[serde(default = "StorageConfig::default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
        }
    }
}

impl StorageConfig {
    /// Platform data directory, falling back to the working directory
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vigil")
    }
}

impl VigilConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy.low_threshold >= self.policy.high_threshold {
            return Err(ConfigError::Validation(format!(
                "policy.low_threshold ({}) must be below policy.high_threshold ({})",
                self.policy.low_threshold, self.policy.high_threshold
            )));
        }

        if self.lockout.threshold == 0 {
            return Err(ConfigError::Validation(
                "lockout.threshold must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
