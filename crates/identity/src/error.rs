//! Error types for Trustgate identity operations.

use crate::registry::FactCategory;
use thiserror::Error;

/// Errors that can occur in identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Caller supplied key material that cannot be parsed
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Well-formed key that is not on the allow-list for the category
    #[error("Signer {public_key} is not trusted for {category}")]
    UntrustedSigner {
        category: FactCategory,
        public_key: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Core errors
    #[error("Core error: {0}")]
    Core(#[from] trustgate_core::CoreError),
}

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;
