//! Core error types

use thiserror::Error;

/// Core error type for Trustgate
#[derive(Debug, Error)]
pub enum CoreError {
    /// Local configuration cannot be turned into a trust policy.
    ///
    /// Always fatal: the process must not start with an undecidable policy.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Logging subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
