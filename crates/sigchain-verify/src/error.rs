//! Rejection reasons and error types.

use serde::Serialize;
use thiserror::Error;

/// Why an inbound request was refused.
///
/// Every variant maps to a stable machine-readable code and an
/// unauthorized-class status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Signature, timestamp, or nonce header absent.
    MissingHeaders,
    /// Timestamp outside the allowed skew, or not a unix time.
    StaleTimestamp,
    /// Nonce already used or still claimed.
    ReplayedNonce,
    /// Signature header in neither accepted form.
    InvalidSignatureFormat,
    /// No key registered for the header's kid.
    UnknownKeyId,
    /// Signature did not verify, or the algorithm did not match the key.
    InvalidSignature,
}

impl RejectReason {
    /// Stable code for responses and logs.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingHeaders => "missing_headers",
            Self::StaleTimestamp => "stale_timestamp",
            Self::ReplayedNonce => "replayed_nonce",
            Self::InvalidSignatureFormat => "invalid_signature_format",
            Self::UnknownKeyId => "unknown_key_id",
            Self::InvalidSignature => "invalid_signature",
        }
    }

    /// HTTP status for the rejection (always 401).
    #[must_use]
    pub const fn status(self) -> u16 {
        401
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors from inbound verification.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The request was refused.
    #[error("unauthorized: {0}")]
    Rejected(RejectReason),

    /// The nonce store failed; the request is refused.
    #[error("nonce store error: {0}")]
    Storage(#[from] sigchain_storage::StorageError),

    /// Invalid verifier configuration.
    #[error("verifier configuration error: {0}")]
    Config(String),
}

impl VerifyError {
    /// The rejection reason, if this is a rejection.
    #[must_use]
    pub const fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected(reason) => Some(*reason),
            _ => None,
        }
    }

    /// 401 for rejections, 500 otherwise.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Rejected(reason) => reason.status(),
            _ => 500,
        }
    }
}

impl From<RejectReason> for VerifyError {
    fn from(reason: RejectReason) -> Self {
        Self::Rejected(reason)
    }
}

/// Result type for inbound verification.
pub type VerifyResult<T> = Result<T, VerifyError>;

/// Why a signed manifest is invalid.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The document lacks `manifest`, `signature`, or `kid`.
    #[error("invalid manifest: missing field {0}")]
    MissingField(&'static str),

    /// The document is not valid JSON of the expected shape.
    #[error("invalid manifest: {0}")]
    Malformed(String),

    /// No key registered for the kid.
    #[error("invalid manifest: unknown key id {0}")]
    UnknownKeyId(String),

    /// The registry key is symmetric; manifests need a public key.
    #[error("invalid manifest: key {kid} uses {algorithm}, which cannot sign manifests")]
    UnsupportedAlgorithm {
        /// Key id.
        kid: String,
        /// Algorithm of the registered key.
        algorithm: String,
    },

    /// The signature is not base64.
    #[error("invalid manifest: signature is not base64")]
    SignatureEncoding,

    /// The signature did not verify.
    #[error("invalid manifest: signature verification failed for key {0}")]
    InvalidSignature(String),
}

/// Result type for manifest verification.
pub type ManifestResult<T> = Result<T, ManifestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let all = [
            (RejectReason::MissingHeaders, "missing_headers"),
            (RejectReason::StaleTimestamp, "stale_timestamp"),
            (RejectReason::ReplayedNonce, "replayed_nonce"),
            (RejectReason::InvalidSignatureFormat, "invalid_signature_format"),
            (RejectReason::UnknownKeyId, "unknown_key_id"),
            (RejectReason::InvalidSignature, "invalid_signature"),
        ];
        for (reason, code) in all {
            assert_eq!(reason.code(), code);
            assert_eq!(reason.status(), 401);
            assert_eq!(serde_json::to_value(reason).unwrap(), code);
        }
    }

    #[test]
    fn storage_errors_are_server_errors() {
        let err = VerifyError::from(sigchain_storage::StorageError::Internal("x".into()));
        assert_eq!(err.status(), 500);
        assert!(err.reason().is_none());
        assert_eq!(VerifyError::from(RejectReason::ReplayedNonce).status(), 401);
    }
}
