//! Digest chain construction and offline verification.

use sigchain_crypto::{CryptoResult, Digest, PublicKeyRegistry, canonical_bytes, decode_base64};
use sigchain_storage::AuditEventRow;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{AuditError, AuditResult};

/// `SHA-256(canonical(payload) || prev_hash_bytes)`.
///
/// `prev` is `None` for the genesis event, which contributes no bytes.
#[must_use]
pub fn compute_digest(payload: &serde_json::Value, prev: Option<&Digest>) -> Digest {
    let canonical = canonical_bytes(payload);
    match prev {
        Some(prev) => Digest::sha256_multi(&[&canonical, prev.as_bytes()]),
        None => Digest::sha256(&canonical),
    }
}

/// Decode a stored hex `prev_hash`. Empty strings count as absent.
///
/// # Errors
///
/// Returns an error if the value is not 64 hex characters.
pub fn parse_prev_hash(prev_hash: Option<&str>) -> CryptoResult<Option<Digest>> {
    match prev_hash.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hex) => Digest::from_hex(hex)
            .map(Some)
            .map_err(|_| sigchain_crypto::CryptoError::InvalidHexEncoding),
        None => Ok(None),
    }
}

/// Digest of a stored event, computed from its stored payload and stored
/// `prev_hash`.
///
/// # Errors
///
/// Returns [`AuditError::IntegrityViolation`] if `prev_hash` is malformed.
pub fn event_digest(event: &AuditEventRow) -> AuditResult<Digest> {
    let prev = parse_prev_hash(event.prev_hash.as_deref()).map_err(|e| {
        AuditError::IntegrityViolation {
            event_id: event.id.to_string(),
            reason: format!("malformed prev_hash: {e}"),
        }
    })?;
    Ok(compute_digest(&event.payload, prev.as_ref()))
}

/// A problem found while walking the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainIssue {
    /// The first event carries a `prev_hash`.
    InvalidGenesis {
        /// Offending event.
        event_id: Uuid,
    },
    /// Stored `prev_hash` is not the recomputed digest of the previous event.
    BrokenLink {
        /// Offending event.
        event_id: Uuid,
        /// Hex digest of the previous event.
        expected: String,
        /// Stored value.
        actual: Option<String>,
    },
    /// Stored `prev_hash` is not valid hex.
    MalformedPrevHash {
        /// Offending event.
        event_id: Uuid,
    },
    /// The event names a signer the registry does not know.
    UnknownSigner {
        /// Offending event.
        event_id: Uuid,
        /// Key id recorded on the event.
        kid: String,
    },
    /// The signature does not verify against the recomputed digest.
    InvalidSignature {
        /// Offending event.
        event_id: Uuid,
        /// Key id recorded on the event.
        kid: String,
    },
    /// The event has no signature and signatures are required.
    Unsigned {
        /// Offending event.
        event_id: Uuid,
    },
}

impl ChainIssue {
    /// Event the issue is attached to.
    #[must_use]
    pub const fn event_id(&self) -> Uuid {
        match self {
            Self::InvalidGenesis { event_id }
            | Self::BrokenLink { event_id, .. }
            | Self::MalformedPrevHash { event_id }
            | Self::UnknownSigner { event_id, .. }
            | Self::InvalidSignature { event_id, .. }
            | Self::Unsigned { event_id } => *event_id,
        }
    }
}

impl std::fmt::Display for ChainIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidGenesis { event_id } => {
                write!(f, "genesis event {event_id} has a prev_hash")
            },
            Self::BrokenLink {
                event_id,
                expected,
                actual,
            } => write!(
                f,
                "broken link at {event_id}: expected prev_hash {expected}, found {}",
                actual.as_deref().unwrap_or("<none>")
            ),
            Self::MalformedPrevHash { event_id } => {
                write!(f, "malformed prev_hash at {event_id}")
            },
            Self::UnknownSigner { event_id, kid } => {
                write!(f, "unknown signer {kid} for event {event_id}")
            },
            Self::InvalidSignature { event_id, kid } => {
                write!(f, "invalid signature on event {event_id} (signer {kid})")
            },
            Self::Unsigned { event_id } => write!(f, "event {event_id} is unsigned"),
        }
    }
}

/// Outcome of a chain walk.
#[derive(Debug, Clone)]
pub struct ChainVerificationResult {
    /// Whether no issue was found.
    pub valid: bool,
    /// Events examined.
    pub events_checked: usize,
    /// Events before the first broken one.
    pub events_verified: usize,
    /// Position (0-based) of the first broken event.
    pub first_broken_index: Option<usize>,
    /// All issues, in chain order.
    pub issues: Vec<ChainIssue>,
}

impl ChainVerificationResult {
    /// The first issue, which marks where the chain stops being trustworthy.
    #[must_use]
    pub fn first_issue(&self) -> Option<&ChainIssue> {
        self.issues.first()
    }
}

/// Walks stored events from genesis and checks links and signatures.
///
/// Each event's digest is recomputed from its *stored* payload and stored
/// `prev_hash`; the signature is verified against that digest with the key
/// the registry holds for `signer_kid`. Links are checked by comparing the
/// stored `prev_hash` with the digest recomputed for the previous event.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainVerifier<'a> {
    registry: Option<&'a PublicKeyRegistry>,
    require_signatures: bool,
}

impl<'a> ChainVerifier<'a> {
    /// Verifier that checks signatures against `registry`.
    #[must_use]
    pub const fn new(registry: &'a PublicKeyRegistry) -> Self {
        Self {
            registry: Some(registry),
            require_signatures: false,
        }
    }

    /// Verifier that only checks hash links.
    #[must_use]
    pub const fn links_only() -> Self {
        Self {
            registry: None,
            require_signatures: false,
        }
    }

    /// Report unsigned events as issues.
    #[must_use]
    pub const fn require_signatures(mut self, require: bool) -> Self {
        self.require_signatures = require;
        self
    }

    /// Verify `events`, which must be in chain order (oldest first).
    #[must_use]
    pub fn verify(&self, events: &[AuditEventRow]) -> ChainVerificationResult {
        let mut issues = Vec::new();
        let mut first_broken_index = None;
        let mut previous_digest: Option<Digest> = None;

        for (index, event) in events.iter().enumerate() {
            let before = issues.len();
            let stored_prev = event.prev_hash.as_deref().filter(|h| !h.trim().is_empty());
            let parsed_prev = parse_prev_hash(stored_prev);
            let linked = parsed_prev.as_ref().ok().copied().flatten();

            match (&previous_digest, stored_prev) {
                (None, Some(_)) if index == 0 => {
                    issues.push(ChainIssue::InvalidGenesis { event_id: event.id });
                },
                (Some(expected), actual) if linked.as_ref() != Some(expected) => {
                    warn!(event_id = %event.id, "audit chain link broken");
                    issues.push(ChainIssue::BrokenLink {
                        event_id: event.id,
                        expected: expected.to_hex(),
                        actual: actual.map(str::to_string),
                    });
                },
                _ => {},
            }

            let digest = match parsed_prev {
                Ok(prev) => compute_digest(&event.payload, prev.as_ref()),
                Err(_) => {
                    issues.push(ChainIssue::MalformedPrevHash { event_id: event.id });
                    compute_digest(&event.payload, None)
                },
            };

            if let Some(issue) = self.check_signature(event, &digest) {
                issues.push(issue);
            }

            if first_broken_index.is_none() && issues.len() > before {
                first_broken_index = Some(index);
            }
            previous_digest = Some(digest);
        }

        if let Some(issue) = issues.first() {
            error!(issue = %issue, total = issues.len(), "audit chain verification failed");
        }

        ChainVerificationResult {
            valid: issues.is_empty(),
            events_checked: events.len(),
            events_verified: first_broken_index.unwrap_or(events.len()),
            first_broken_index,
            issues,
        }
    }

    fn check_signature(&self, event: &AuditEventRow, digest: &Digest) -> Option<ChainIssue> {
        let Some(signature) = event.signature.as_deref() else {
            return self
                .require_signatures
                .then_some(ChainIssue::Unsigned { event_id: event.id });
        };
        let registry = self.registry?;
        let kid = event.signer_kid.clone().unwrap_or_default();

        if !registry.contains(&kid) {
            return Some(ChainIssue::UnknownSigner {
                event_id: event.id,
                kid,
            });
        }
        let verified = decode_base64(signature)
            .and_then(|sig| registry.verify_digest(&kid, digest.as_bytes(), &sig));
        match verified {
            Ok(()) => None,
            Err(_) => Some(ChainIssue::InvalidSignature {
                event_id: event.id,
                kid,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;
    use sigchain_crypto::{Algorithm, SigningKey, encode_base64};

    use super::*;

    fn build_chain(key: &SigningKey, payloads: &[serde_json::Value]) -> Vec<AuditEventRow> {
        let mut rows = Vec::new();
        let mut prev: Option<Digest> = None;
        for payload in payloads {
            let digest = compute_digest(payload, prev.as_ref());
            rows.push(AuditEventRow {
                id: Uuid::new_v4(),
                actor_id: "actor".into(),
                event_type: "test".into(),
                payload: payload.clone(),
                signature: Some(encode_base64(&key.sign_digest(digest.as_bytes()).unwrap())),
                signer_kid: Some("k1".into()),
                prev_hash: prev.map(|d| d.to_hex()),
                created_at: Utc::now(),
            });
            prev = Some(digest);
        }
        rows
    }

    fn registry(key: &SigningKey) -> PublicKeyRegistry {
        let mut registry = PublicKeyRegistry::new();
        registry.insert("k1", key.verifying_key());
        registry
    }

    #[test]
    fn genesis_digest_is_payload_hash() {
        let payload = json!({"b": 1, "a": 2});
        assert_eq!(
            compute_digest(&payload, None),
            Digest::sha256(br#"{"a":2,"b":1}"#)
        );
    }

    #[test]
    fn linked_digest_appends_raw_prev_bytes() {
        let prev = Digest::sha256(b"prev");
        let mut data = br#"{"n":1}"#.to_vec();
        data.extend_from_slice(prev.as_bytes());
        assert_eq!(compute_digest(&json!({"n": 1}), Some(&prev)), Digest::sha256(&data));
    }

    #[test]
    fn intact_chain_verifies() {
        let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
        let rows = build_chain(&key, &[json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
        let result = ChainVerifier::new(&registry(&key)).verify(&rows);
        assert!(result.valid, "{:?}", result.issues);
        assert_eq!(result.events_verified, 3);
        assert!(result.first_broken_index.is_none());
    }

    #[test]
    fn tampered_payload_breaks_at_that_event() {
        let key = SigningKey::generate(Algorithm::HmacSha256).unwrap();
        let mut rows = build_chain(&key, &[json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
        rows[1].payload = json!({"n": 99});

        let result = ChainVerifier::new(&registry(&key)).verify(&rows);
        assert!(!result.valid);
        assert_eq!(result.first_broken_index, Some(1));
        assert_eq!(result.events_verified, 1);
        assert!(matches!(
            result.first_issue(),
            Some(ChainIssue::InvalidSignature { event_id, .. }) if *event_id == rows[1].id
        ));
        assert!(result.issues.iter().any(
            |i| matches!(i, ChainIssue::BrokenLink { event_id, .. } if *event_id == rows[2].id)
        ));
    }

    #[test]
    fn tampering_detected_by_links_without_registry() {
        let key = SigningKey::generate(Algorithm::HmacSha256).unwrap();
        let mut rows = build_chain(&key, &[json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
        rows[1].payload = json!({"n": 99});
        let result = ChainVerifier::links_only().verify(&rows);
        assert_eq!(result.first_broken_index, Some(2));
    }

    #[test]
    fn unknown_signer_and_unsigned() {
        let key = SigningKey::generate(Algorithm::HmacSha256).unwrap();
        let mut rows = build_chain(&key, &[json!({"n": 1}), json!({"n": 2})]);
        rows[0].signer_kid = Some("someone-else".into());
        rows[1].signature = None;

        let result = ChainVerifier::new(&registry(&key)).verify(&rows);
        assert_eq!(result.issues.len(), 1);
        assert!(matches!(result.issues[0], ChainIssue::UnknownSigner { .. }));

        let strict = ChainVerifier::new(&registry(&key))
            .require_signatures(true)
            .verify(&rows);
        assert_eq!(strict.issues.len(), 2);
        assert!(matches!(strict.issues[1], ChainIssue::Unsigned { .. }));
    }

    #[test]
    fn uppercase_prev_hash_still_links() {
        let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
        let mut rows = build_chain(&key, &[json!({"n": 1}), json!({"n": 2}), json!({"n": 3})]);
        for row in &mut rows {
            row.prev_hash = row.prev_hash.as_deref().map(str::to_uppercase);
        }
        let result = ChainVerifier::new(&registry(&key)).verify(&rows);
        assert!(result.valid, "{:?}", result.issues);
        assert_eq!(result.events_verified, 3);
    }

    #[test]
    fn malformed_link_is_broken_and_malformed() {
        let key = SigningKey::generate(Algorithm::HmacSha256).unwrap();
        let mut rows = build_chain(&key, &[json!({"n": 1}), json!({"n": 2})]);
        rows[1].prev_hash = Some("not-hex".into());
        let result = ChainVerifier::links_only().verify(&rows);
        assert_eq!(result.first_broken_index, Some(1));
        assert!(matches!(
            result.issues[0],
            ChainIssue::BrokenLink { ref actual, .. } if actual.as_deref() == Some("not-hex")
        ));
        assert!(matches!(result.issues[1], ChainIssue::MalformedPrevHash { .. }));
    }

    #[test]
    fn genesis_with_prev_hash_is_flagged() {
        let key = SigningKey::generate(Algorithm::HmacSha256).unwrap();
        let mut rows = build_chain(&key, &[json!({"n": 1})]);
        rows[0].prev_hash = Some(Digest::sha256(b"x").to_hex());
        let result = ChainVerifier::links_only().verify(&rows);
        assert!(matches!(result.issues[0], ChainIssue::InvalidGenesis { .. }));
    }

    #[test]
    fn malformed_prev_hash() {
        assert!(parse_prev_hash(Some("zz")).is_err());
        assert_eq!(parse_prev_hash(Some("")).unwrap(), None);
        assert_eq!(parse_prev_hash(None).unwrap(), None);
    }

    #[test]
    fn empty_chain_is_valid() {
        let result = ChainVerifier::links_only().verify(&[]);
        assert!(result.valid);
        assert_eq!(result.events_checked, 0);
    }
}
