//! # Manager Configuration
//!
//! All tuning lives in a TOML file that is loaded once at startup:
//!
//! ```toml
//! initial_capacity = 512
//! max_slots = 100000
//! fixed_delta_time = 0.016666668
//! frame_budget_us = 16666
//! ```
//!
//! Every key is optional; missing keys fall back to [`ManagerConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or has wrongly typed keys.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Object manager configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Slots reserved up front.
    pub initial_capacity: usize,
    /// Hard ceiling on the slot table size. `None` means the index space limit.
    pub max_slots: Option<u32>,
    /// Seconds per frame, handed to callbacks through their context.
    pub fixed_delta_time: f32,
    /// Frames slower than this are reported by the stage (microseconds).
    pub frame_budget_us: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 256,
            max_slots: None,
            fixed_delta_time: 1.0 / 60.0,
            frame_budget_us: 16_666,
        }
    }
}

impl ManagerConfig {
    /// Largest usable slot count; `u32::MAX` is reserved for [`crate::Handle::INVALID`].
    pub const SLOT_LIMIT: u32 = u32::MAX - 1;

    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed input and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`ManagerConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fixed_delta_time.is_finite() || self.fixed_delta_time <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "fixed_delta_time must be positive, got {}",
                self.fixed_delta_time
            )));
        }
        if let Some(max) = self.max_slots {
            if max == 0 || max > Self::SLOT_LIMIT {
                return Err(ConfigError::Invalid(format!(
                    "max_slots must be in 1..={}, got {max}",
                    Self::SLOT_LIMIT
                )));
            }
        }
        Ok(())
    }

    /// Effective slot ceiling.
    #[must_use]
    pub fn slot_limit(&self) -> u32 {
        self.max_slots.unwrap_or(Self::SLOT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ManagerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.slot_limit(), ManagerConfig::SLOT_LIMIT);
    }

    #[test]
    fn test_partial_toml() {
        let config = ManagerConfig::from_toml_str("max_slots = 8\n").unwrap();
        assert_eq!(config.max_slots, Some(8));
        assert_eq!(config.initial_capacity, 256);
        assert_eq!(config.slot_limit(), 8);
    }

    #[test]
    fn test_rejects_bad_delta() {
        let err = ManagerConfig::from_toml_str("fixed_delta_time = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = ManagerConfig::from_toml_str("warp_speed = 9\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ManagerConfig::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
