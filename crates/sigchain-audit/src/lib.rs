//! Sigchain Audit - tamper-evident, signed audit event chain.
//!
//! Every event is linked to its predecessor:
//!
//! ```text
//! digest(event_n)  = SHA-256(canonical(payload_n) || prev_hash_bytes(event_n))
//! prev_hash(n + 1) = hex(digest(event_n))
//! ```
//!
//! The genesis event has no `prev_hash` and hashes the canonical payload
//! alone. The digest is what gets signed, so changing any stored payload
//! breaks both that event's signature and the next event's link.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sigchain_audit::AuditChainService;
//! use sigchain_crypto::{Algorithm, PublicKeyRegistry};
//! use sigchain_signing::EnvFallbackProvider;
//! use sigchain_storage::MemoryStore;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let key = sigchain_crypto::SigningKey::generate(Algorithm::Ed25519).unwrap();
//! let signer = Arc::new(EnvFallbackProvider::from_base64_seed(&key.export().unwrap()).unwrap());
//! let service = AuditChainService::new(Arc::new(MemoryStore::new()), signer.clone());
//!
//! service.record_event("user-1", "listing.created", serde_json::json!({"id": 7})).await.unwrap();
//! service.record_event("user-1", "listing.updated", serde_json::json!({"id": 7})).await.unwrap();
//!
//! let mut registry = PublicKeyRegistry::new();
//! registry.insert(signer.kid(), signer.verifying_key());
//! assert!(service.verify_chain(&registry).await.unwrap().valid);
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod chain;
mod error;
mod service;

pub use chain::{
    ChainIssue, ChainVerificationResult, ChainVerifier, compute_digest, event_digest,
    parse_prev_hash,
};
pub use error::{AuditError, AuditResult};
pub use service::{AuditChainService, MAX_APPEND_ATTEMPTS, RecordedEvent};
