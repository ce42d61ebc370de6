//! Sigchain Verify - replay-protected verification of signed inbound
//! callbacks, plus detached manifest signatures.
//!
//! A callback carries three headers next to its raw body:
//!
//! - a signature, either `sha256=<hex hmac>` for the shared secret or
//!   `kid=<id>;alg=<algorithm>;sig=<base64>` for a registered key,
//! - a Unix-seconds timestamp, accepted within the configured skew,
//! - a nonce, which can be used once within its TTL.
//!
//! [`InboundVerifier`] runs the checks in a fixed order and rejects with a
//! [`RejectReason`] whose [`code`](RejectReason::code) is stable and whose
//! HTTP status is always 401. Nonce store failures surface as
//! [`VerifyError::Storage`] so the caller fails closed with a 500.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use sigchain_crypto::SigningKey;
//! use sigchain_storage::MemoryStore;
//! use sigchain_verify::{CallbackRequest, InboundVerifier, VerifierKeys, VerifierSettings};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let keys = VerifierKeys::from_registry(Default::default())
//!     .with_shared_secret(b"secret")
//!     .unwrap();
//! let verifier = InboundVerifier::new(
//!     VerifierSettings::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(keys),
//! );
//!
//! let body = br#"{"status":"done"}"#;
//! let mac = SigningKey::hmac_from_secret(b"secret").unwrap().sign_message(body).unwrap();
//! let request = CallbackRequest::new(body.to_vec())
//!     .with_header("X-Kernel-Signature", format!("sha256={}", hex::encode(mac)))
//!     .with_header("X-Kernel-Timestamp", chrono::Utc::now().timestamp().to_string())
//!     .with_header("X-Kernel-Nonce", "n-1");
//!
//! let context = verifier.verify(&request, &request.body).await.unwrap();
//! assert_eq!(context.kid, "shared");
//! assert!(verifier.verify(&request, &request.body).await.is_err());
//! # });
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod headers;
mod keys;
mod manifest;
mod nonce;
mod verifier;

pub use error::{ManifestError, ManifestResult, RejectReason, VerifyError, VerifyResult};
pub use headers::{CallbackRequest, HeaderSource, SHARED_KID, SignatureHeader};
pub use keys::{RegistrySource, VerifierKeys};
pub use manifest::{ManifestVerifier, SignedManifest};
pub use nonce::{NonceClaim, NonceGuard};
pub use verifier::{
    CALLBACK_VERIFIED_EVENT, InboundVerifier, VerifiedContext, VerifierSettings,
};
