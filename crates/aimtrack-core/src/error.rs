//! Error types for the aimtrack state layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the aimtrack crates.
///
/// The type is `Clone` and serializable so the same value can be handed to
/// every failure subscriber and forwarded to a UI layer unchanged.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AimError {
    /// A notification was enqueued with a timeout that is not positive.
    #[error("Invalid notification timeout: {timeout_ms}ms (must be positive)")]
    InvalidTimeout { timeout_ms: u64 },

    /// Configuration error
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// Data access error (repository/storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON"
        message: String,
    },

    /// The write-behind worker has shut down and no longer accepts writes.
    #[error("Persistence worker is closed")]
    WorkerClosed,

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AimError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is an invalid timeout error
    pub fn is_invalid_timeout(&self) -> bool {
        matches!(self, Self::InvalidTimeout { .. })
    }

    /// Check if the write-behind worker rejected the request
    pub fn is_worker_closed(&self) -> bool {
        matches!(self, Self::WorkerClosed)
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for AimError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for AimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for AimError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion for repository implementations built on `anyhow`.
impl From<anyhow::Error> for AimError {
    fn from(err: anyhow::Error) -> Self {
        Self::DataAccess(format!("{:#}", err))
    }
}

impl From<String> for AimError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, AimError>`.
pub type Result<T> = std::result::Result<T, AimError>;
