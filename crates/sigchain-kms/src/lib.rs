//! Sigchain KMS - delegate digest signing to an external key-management service.
//!
//! The KMS holds private key material and exposes sign / MAC operations
//! without exporting the key. This crate provides:
//!
//! - [`KmsClient`]: the operations a KMS backend must support
//! - [`HttpKmsClient`]: a JSON-over-HTTPS client for a KMS gateway
//! - [`KmsAdapter`]: picks the right operation for an [`Algorithm`](sigchain_crypto::Algorithm)
//!
//! Failures are always returned as typed [`KmsError`]s. Nothing in this
//! crate substitutes a local key when the KMS cannot sign; fallback policy
//! belongs to the caller.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod adapter;
mod client;
mod error;
mod http;

pub use adapter::KmsAdapter;
pub use client::{
    KmsClient, KmsMacAlgorithm, KmsPublicKey, KmsSignature, KmsSigningAlgorithm, MessageType,
};
pub use error::{KmsError, KmsResult};
pub use http::{HttpKmsClient, HttpKmsConfig};
