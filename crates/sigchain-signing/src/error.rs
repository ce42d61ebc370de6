//! Error types for signing.

use sigchain_crypto::CryptoError;
use sigchain_kms::KmsError;
use thiserror::Error;

/// Errors raised while resolving keys or signing.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Invalid or contradictory signing configuration.
    #[error("signing configuration error: {0}")]
    Config(String),

    /// A configured key source produced unusable material.
    #[error("key source {kind} failed: {message}")]
    Source {
        /// Source label (`inline`, `file`, `url`, `kms`).
        kind: &'static str,
        /// What went wrong.
        message: String,
    },

    /// Key parsing or the signing primitive failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The remote KMS failed.
    #[error(transparent)]
    Kms(#[from] KmsError),
}

/// Result type for signing operations.
pub type SigningResult<T> = Result<T, SigningError>;
