//! Configuration for a Lodestone Raft actor.
//!
//! Configuration is loaded from TOML files and environment variables.
//! Values are validated at construction time via the fallible builder;
//! post-deserialization validation is available via [`RaftConfig::validate`].

use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Configuration validation error.
///
/// Returned when a configuration value is outside its valid range.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Raft actor configuration.
///
/// # Validation Rules
///
/// - `journal_recovery_log_batch_size` must be > 0
///
/// # Example
///
/// ```no_run
/// # use lodestone_types::config::RaftConfig;
/// let config = RaftConfig::builder()
///     .journal_recovery_log_batch_size(100)
///     .recovery_snapshot_interval_seconds(120)
///     .build()
///     .expect("valid raft config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaftConfig {
    /// Maximum number of journal entries replayed into the cohort per batch
    /// during recovery.
    ///
    /// Must be > 0.
    #[serde(default = "default_journal_recovery_log_batch_size")]
    pub journal_recovery_log_batch_size: u32,
    /// Interval between opportunistic snapshots taken while recovery is
    /// replaying a long journal, in whole seconds.
    ///
    /// 0 disables mid-recovery snapshotting.
    #[serde(default = "default_recovery_snapshot_interval_seconds")]
    pub recovery_snapshot_interval_seconds: u32,
}

#[bon::bon]
impl RaftConfig {
    /// Creates a new Raft configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if
    /// `journal_recovery_log_batch_size` is 0.
    #[builder]
    pub fn new(
        #[builder(default = default_journal_recovery_log_batch_size())]
        journal_recovery_log_batch_size: u32,
        #[builder(default = default_recovery_snapshot_interval_seconds())]
        recovery_snapshot_interval_seconds: u32,
    ) -> Result<Self, ConfigError> {
        let config = Self { journal_recovery_log_batch_size, recovery_snapshot_interval_seconds };
        config.validate()?;
        Ok(config)
    }
}

impl RaftConfig {
    /// Validates the configuration values.
    ///
    /// Call after deserialization to ensure values are within valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.journal_recovery_log_batch_size == 0 {
            return Err(ConfigError::Validation {
                message: "journal_recovery_log_batch_size must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            journal_recovery_log_batch_size: default_journal_recovery_log_batch_size(),
            recovery_snapshot_interval_seconds: default_recovery_snapshot_interval_seconds(),
        }
    }
}

fn default_journal_recovery_log_batch_size() -> u32 {
    1000
}

fn default_recovery_snapshot_interval_seconds() -> u32 {
    0
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn builder_with_defaults() {
        let config = RaftConfig::builder().build().unwrap();
        assert_eq!(config, RaftConfig::default());
        assert_eq!(config.journal_recovery_log_batch_size, 1000);
        assert_eq!(config.recovery_snapshot_interval_seconds, 0);
    }

    #[test]
    fn builder_rejects_zero_batch_size() {
        let err = RaftConfig::builder().journal_recovery_log_batch_size(0).build().unwrap_err();
        assert!(err.to_string().contains("journal_recovery_log_batch_size"));
    }

    #[test]
    fn deserialization_applies_defaults() {
        let config: RaftConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, RaftConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn validate_catches_bad_deserialized_values() {
        let config: RaftConfig =
            serde_json::from_str(r#"{"journal_recovery_log_batch_size":0}"#).unwrap();
        assert!(config.validate().is_err());
    }
}
