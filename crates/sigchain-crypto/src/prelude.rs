//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sigchain_crypto::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use sigchain_crypto::prelude::*;
//!
//! let key = SigningKey::generate(Algorithm::HmacSha256).unwrap();
//! let digest = Digest::sha256(b"hello");
//! let mac = key.sign_digest(digest.as_bytes()).unwrap();
//! assert!(key.verifying_key().verify_digest(digest.as_bytes(), &mac).is_ok());
//! ```

// Errors
pub use crate::{CryptoError, CryptoResult};

// Algorithms and keys
pub use crate::{Algorithm, SigningKey, VerifyingKey};

// Hashing
pub use crate::Digest;

// Canonical form
pub use crate::{canonical_bytes, canonicalize, canonicalize_serializable};

// Key registry
pub use crate::{KeyCache, PublicKeyRegistry, RegistryEntry};
