//! Error types for the Clausewise core library.
//!
//! Uses `thiserror` for public API error types. The analysis taxonomy mirrors
//! the four ways a submission can end badly: bad input, no response, a
//! non-success response, or an unreadable success body.

use std::path::PathBuf;

/// Top-level error type for the Clausewise core library.
///
/// Storage failures stop at [`crate::storage::StorageAdapter`] and have no
/// variant here.
#[derive(Debug, thiserror::Error)]
pub enum ClausewiseError {
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a single analyze (or health) call against the backend.
///
/// Every variant is terminal for the current submission.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// Missing credentials or an invalid request. No network call was made.
    #[error("{message}")]
    Configuration { message: String },

    /// The request never produced a response (connect, DNS, timeout).
    #[error("Request failed: {message}")]
    Transport { message: String },

    /// The backend answered with a non-success status.
    ///
    /// `message` is the backend's `detail` field, or the raw body when the
    /// body is not JSON, shown verbatim. Otherwise `"Analysis failed"`.
    #[error("{message}")]
    Application { status: u16, message: String },

    /// Success status, but the body did not decode into the expected shape.
    #[error("Invalid response: {message}")]
    Parse { message: String },
}

impl AnalysisError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the error was raised before any network traffic.
    pub fn is_pre_flight(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}

/// Errors from the dashboard controller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DashboardError {
    #[error("An analysis is already in progress")]
    Busy,

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors raised by a storage medium.
///
/// These never escape the [`crate::storage::StorageAdapter`]; they exist so
/// backends can report what went wrong before the adapter logs and drops it.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("Failed to read key '{key}': {message}")]
    ReadFailed { key: String, message: String },

    #[error("Failed to write key '{key}': {message}")]
    WriteFailed { key: String, message: String },
}

/// A type alias for results using the top-level `ClausewiseError`.
pub type Result<T> = std::result::Result<T, ClausewiseError>;
