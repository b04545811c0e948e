//! Error types for deckgen.
//!
//! Library crates use [`DeckgenError`] via `thiserror`.
//! The `deckgen` binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all deckgen operations.
#[derive(Debug, thiserror::Error)]
pub enum DeckgenError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure talking to a model service.
    #[error("network error: {0}")]
    Network(String),

    /// A model service rejected the call or returned something unusable.
    #[error("{service} error: {message}")]
    Model {
        service: &'static str,
        message: String,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Request input failed validation.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DeckgenError>;

impl DeckgenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a model error attributed to the named service.
    pub fn model(service: &'static str, msg: impl Into<String>) -> Self {
        Self::Model {
            service,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error was caused by the caller's input rather than by deckgen or a model.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
