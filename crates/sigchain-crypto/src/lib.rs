//! Sigchain Crypto - Cryptographic primitives for the signed audit chain.
//!
//! This crate provides:
//! - Deterministic canonical serialization of JSON-like values
//! - SHA-256 digests for audit chain linking
//! - Signing and verification for `hmac-sha256`, `rsa-sha256`, and `ed25519`
//! - A registry of trusted verification keys indexed by key id
//! - [`KeyCache`], a TTL cache for resolved key material
//!
//! # Digest signing vs. message signing
//!
//! The audit chain signs a 32-byte digest that the caller already computed.
//! [`SigningKey::sign_digest`] therefore never hashes again: Ed25519 signs the
//! digest bytes as its message, and RSA wraps the digest in the SHA-256
//! `DigestInfo` prefix before the PKCS#1 v1.5 private-key operation.
//!
//! Inbound callbacks and manifests are verified as messages with
//! [`VerifyingKey::verify_message`], where RSA hashes the message itself.
//!
//! # Example
//!
//! ```
//! use sigchain_crypto::{Algorithm, Digest, SigningKey, canonicalize};
//!
//! let payload = serde_json::json!({"b": 2, "a": 1});
//! assert_eq!(canonicalize(&payload), r#"{"a":1,"b":2}"#);
//!
//! let digest = Digest::sha256(canonicalize(&payload).as_bytes());
//! let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
//! let signature = key.sign_digest(digest.as_bytes()).unwrap();
//!
//! let verifying = key.verifying_key();
//! assert!(verifying.verify_digest(digest.as_bytes(), &signature).is_ok());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod algorithm;
mod cache;
mod canonical;
mod digest;
mod error;
mod keys;
mod registry;

pub use algorithm::Algorithm;
pub use cache::KeyCache;
pub use canonical::{canonical_bytes, canonicalize, canonicalize_serializable};
pub use digest::Digest;
pub use error::{CryptoError, CryptoResult};
pub use keys::{SigningKey, VerifyingKey, decode_base64, encode_base64};
pub use registry::{PublicKeyRegistry, RegistryEntry};
