//! KMS error types.

use thiserror::Error;

/// Errors from KMS operations.
#[derive(Debug, Error)]
pub enum KmsError {
    /// No KMS endpoint or key id configured.
    #[error("KMS not configured: {0}")]
    NotConfigured(String),

    /// Client construction failed (bad CA bundle, bad client identity).
    #[error("KMS client configuration error: {0}")]
    Config(String),

    /// Network-level failure (connect, TLS, timeout).
    #[error("KMS transport error: {0}")]
    Transport(String),

    /// The KMS refused the credentials.
    #[error("KMS permission denied (HTTP {status})")]
    PermissionDenied {
        /// HTTP status code (401 or 403).
        status: u16,
    },

    /// Any other non-success status.
    #[error("KMS HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The key cannot sign a precomputed digest for this algorithm.
    #[error("KMS cannot sign digests for {algorithm}")]
    UnsupportedDigestSigning {
        /// Algorithm that was requested.
        algorithm: String,
    },

    /// The response was missing fields or malformed.
    #[error("invalid KMS response: {0}")]
    InvalidResponse(String),
}

impl KmsError {
    /// Whether a single retry may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            // 501 is the gateway's final answer for unsupported digest signing.
            Self::Http { status, .. } => *status != 501 && (500..600).contains(status),
            _ => false,
        }
    }
}

/// Result type for KMS operations.
pub type KmsResult<T> = Result<T, KmsError>;
