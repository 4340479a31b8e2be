//! Error kinds raised by the reconciliation engine and its collaborators.

use thiserror::Error;

/// Errors that can occur while reconciling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Remote document could not be retrieved.
    #[error("fetch failed for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// Text is not a well-formed document.
    #[error("parse error at byte {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// A local document could not be read.
    #[error("local store error for {key}: {reason}")]
    LocalStore { key: String, reason: String },

    /// A document could not be written or deleted.
    #[error("persist failed for {key}: {reason}")]
    Persist { key: String, reason: String },

    /// Location name cannot be used as a URL path segment.
    #[error("invalid location name '{0}'")]
    InvalidLocation(String),

    /// Merge options are inconsistent.
    #[error("invalid merge options: {0}")]
    MergeConfig(String),
}

impl ConfigError {
    /// Shorthand for a transport failure.
    pub fn transport(url: &str, reason: impl Into<String>) -> Self {
        ConfigError::Transport {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a local read failure.
    pub fn local_store(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::LocalStore {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a write/delete failure.
    pub fn persist(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Persist {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
