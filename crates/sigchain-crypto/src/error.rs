//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },

    /// Key material could not be parsed for the requested algorithm.
    #[error("invalid {algorithm} key: {reason}")]
    InvalidKey {
        /// Algorithm the key was parsed for.
        algorithm: String,
        /// Why parsing failed.
        reason: String,
    },

    /// Unknown algorithm name.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The key's algorithm does not match what the caller asked for.
    #[error("algorithm mismatch: key is {key}, requested {requested}")]
    AlgorithmMismatch {
        /// Algorithm of the key.
        key: String,
        /// Algorithm requested by the caller.
        requested: String,
    },

    /// Signature verification failed.
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// The private-key operation failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Digest input was not 32 bytes.
    #[error("invalid digest length: expected 32, got {0}")]
    InvalidDigestLength(usize),

    /// Invalid hex encoding.
    #[error("invalid hex encoding")]
    InvalidHexEncoding,

    /// Invalid base64 encoding.
    #[error("invalid base64 encoding")]
    InvalidBase64Encoding,

    /// A value could not be converted to its canonical form.
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    /// The registry document could not be parsed.
    #[error("invalid key registry: {0}")]
    InvalidRegistry(String),

    /// Key id is not present in the registry.
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    /// I/O error (e.g. reading key files).
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
