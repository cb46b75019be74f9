//! State layer configuration.
//!
//! Loaded from a TOML document such as:
//!
//! ```toml
//! [notifications]
//! default_timeout_ms = 3000
//! failure_timeout_ms = 5000
//!
//! [history]
//! recent_capacity = 5
//! hydrate_page_size = 50
//! ```
//!
//! Every field is optional and falls back to its default.

use crate::error::{AimError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Timeout used when a caller does not pick one.
    pub default_timeout_ms: u64,
    /// Timeout for "recorded but not saved" notifications.
    pub failure_timeout_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 3000,
            failure_timeout_ms: 5000,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Size of the recent-activity window.
    pub recent_capacity: usize,
    /// Number of games fetched from the backend on startup hydration.
    pub hydrate_page_size: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            recent_capacity: 5,
            hydrate_page_size: 50,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct StateConfig {
    pub notifications: NotificationConfig,
    pub history: HistoryConfig,
}

impl StateConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StateConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(source) => Self::from_toml_str(&source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.notifications.validate()?;
        self.history.validate()
    }
}

impl NotificationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_ms == 0 {
            return Err(AimError::config("notifications.default_timeout_ms must be positive"));
        }
        if self.failure_timeout_ms == 0 {
            return Err(AimError::config("notifications.failure_timeout_ms must be positive"));
        }
        Ok(())
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.recent_capacity == 0 {
            return Err(AimError::config("history.recent_capacity must be positive"));
        }
        if self.hydrate_page_size == 0 {
            return Err(AimError::config("history.hydrate_page_size must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = StateConfig::default();
        assert_eq!(config.history.recent_capacity, 5);
        assert_eq!(config.notifications.default_timeout_ms, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config = StateConfig::from_toml_str(
            r#"
            [notifications]
            failure_timeout_ms = 8000
            "#,
        )
        .unwrap();

        assert_eq!(config.notifications.failure_timeout_ms, 8000);
        assert_eq!(config.notifications.default_timeout_ms, 3000);
        assert_eq!(config.history, HistoryConfig::default());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = StateConfig::from_toml_str("[history]\nrecent_capacity = 0\n").unwrap_err();
        assert!(matches!(err, AimError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_toml_is_serialization_error() {
        let err = StateConfig::from_toml_str("[history\n").unwrap_err();
        assert!(matches!(err, AimError::Serialization { ref format, .. } if format == "TOML"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StateConfig::load(&dir.path().join("state.toml")).unwrap();
        assert_eq!(config, StateConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[history]\nhydrate_page_size = 10").unwrap();

        let config = StateConfig::load(file.path()).unwrap();
        assert_eq!(config.history.hydrate_page_size, 10);
        assert_eq!(config.history.recent_capacity, 5);
    }
}
