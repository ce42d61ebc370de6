//! Telemetry error types.

use thiserror::Error;

/// Why logging could not be set up.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// `logging.format` is not one of the known formats.
    #[error("unknown log format '{0}' (expected pretty, compact, json or full)")]
    UnknownFormat(String),

    /// `logging.target` is neither stdout nor stderr.
    #[error("unknown log target '{0}'")]
    UnknownTarget(String),

    /// The level or a directive is not a valid filter.
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
