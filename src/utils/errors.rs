// src/utils/errors.rs
//! Error types for the watcher
//!
//! Usage errors (reentrant capture, missing notifier credentials) are fatal
//! and surface immediately. Persistence failures propagate unmasked.
//! Notifier delivery failures never reach this type; they are downgraded to
//! warnings at the notifier boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, WatchdogError>;

/// Errors raised by the interception core and call recorder
#[derive(Debug, Error)]
pub enum WatchdogError {
    /// A capture scope was requested while another one is still active
    #[error("capture scope already active for '{active}'")]
    Reentrancy { active: String },

    /// Notification was requested but no bot token is configured
    #[error("notification requested for '{0}' but no notifier credential is configured")]
    MissingNotifierCredential(String),

    /// Notification support was not compiled in
    #[error("notifications require the `telegram` feature")]
    NotifierUnavailable,

    /// The notifier rejected the configured credential at setup time
    #[error("unable to create notifier, check the bot token: {0}")]
    InvalidNotifierToken(String),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Log or vault persistence failed
    #[error("storage failed at {path:?}: {source}")]
    StorageFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A value could not be converted to or from JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WatchdogError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageFailed {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a usage error that should never be retried
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::Reentrancy { .. }
                | Self::MissingNotifierCredential(_)
                | Self::NotifierUnavailable
                | Self::InvalidNotifierToken(_)
                | Self::ConfigError(_)
        )
    }
}

impl From<config::ConfigError> for WatchdogError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_errors() {
        let err = WatchdogError::Reentrancy {
            active: "train".to_string(),
        };
        assert!(err.is_usage_error());
        assert!(err.to_string().contains("train"));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = WatchdogError::storage("/tmp/x.json", io);
        assert!(!err.is_usage_error());
    }
}
