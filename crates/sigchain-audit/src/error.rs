//! Audit-related error types.

use thiserror::Error;

/// Errors from recording or verifying audit events.
#[derive(Debug, Error)]
pub enum AuditError {
    /// No signature was produced and the policy forbids unsigned events.
    #[error("refusing to persist unsigned audit event {event_type}: signing is required")]
    UnsignedRejected {
        /// Event type that was being recorded.
        event_type: String,
    },

    /// The signing provider failed.
    #[error("signing failed: {0}")]
    Signing(#[from] sigchain_signing::SigningError),

    /// Persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] sigchain_storage::StorageError),

    /// Canonicalization or hashing failed.
    #[error("crypto error: {0}")]
    Crypto(#[from] sigchain_crypto::CryptoError),

    /// A stored row cannot be used to extend the chain.
    #[error("chain integrity violation at event {event_id}: {reason}")]
    IntegrityViolation {
        /// Offending event.
        event_id: String,
        /// What is wrong.
        reason: String,
    },

    /// Concurrent writers kept moving the chain head.
    #[error("audit chain head kept moving after {attempts} attempts")]
    AppendContention {
        /// Attempts made.
        attempts: u32,
    },
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
