//! Error types for loading and configuration.
//!
//! Load errors never tear down the view. The widget keeps the last good
//! snapshot and hands the error to the host for a toast.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while loading or expanding a snapshot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    /// Backing store request failed (network, HTTP status, service error).
    #[error("Backing store request failed: {0}")]
    Backend(String),

    /// Response could not be decoded into rows.
    #[error("Malformed backing store response: {0}")]
    Decode(String),

    /// A request for the same trigger is still outstanding.
    #[error("Request already in flight: {0}")]
    Duplicate(String),

    /// The scope resolved to no node keys.
    #[error("Scope {0} contains no items")]
    EmptyScope(String),
}

impl LoadError {
    /// Whether retrying the same request can succeed. A malformed response
    /// or an empty scope fails the same way every time.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LoadError::Backend(_) | LoadError::Duplicate(_))
    }

    /// Whether the host should be told. Dropped duplicates are silent.
    pub fn should_surface(&self) -> bool {
        !matches!(self, LoadError::Duplicate(_))
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LoadError::Decode(err.to_string())
        } else {
            LoadError::Backend(err.to_string())
        }
    }
}

/// Failure inside the free-layout relaxation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("Relaxation produced non-finite positions at iteration {0}")]
    Diverged(usize),
}

/// Failure while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_silent() {
        assert!(!LoadError::Duplicate("expand COMP1511".into()).should_surface());
        assert!(LoadError::Backend("timeout".into()).should_surface());
        assert!(LoadError::Backend("timeout".into()).is_recoverable());
    }

    #[test]
    fn bad_payloads_and_empty_scopes_are_not_retryable() {
        assert!(!LoadError::Decode("expected array".into()).is_recoverable());
        assert!(!LoadError::EmptyScope("program 0000".into()).is_recoverable());
        assert!(LoadError::Duplicate("initial".into()).is_recoverable());
    }
}
