//! Registry of trusted verification keys indexed by key id.
//!
//! Registry documents are JSON, either an object keyed by `kid`:
//!
//! ```json
//! { "issuer-1": { "algorithm": "ed25519", "public_key": "<base64>" } }
//! ```
//!
//! or an array of `{ "kid", "algorithm", "public_key" }` entries.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::algorithm::Algorithm;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::VerifyingKey;

/// One trusted key.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Key id.
    pub kid: String,
    /// Algorithm the key is bound to.
    pub algorithm: Algorithm,
    /// Verification material.
    pub key: VerifyingKey,
}

#[derive(Deserialize)]
struct RawEntry {
    algorithm: Algorithm,
    public_key: String,
}

#[derive(Deserialize)]
struct RawListEntry {
    kid: String,
    algorithm: Algorithm,
    public_key: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRegistry {
    Map(HashMap<String, RawEntry>),
    List(Vec<RawListEntry>),
}

/// A set of trusted verification keys.
///
/// # Example
///
/// ```
/// use sigchain_crypto::{Algorithm, Digest, PublicKeyRegistry, SigningKey};
///
/// let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
/// let mut registry = PublicKeyRegistry::new();
/// registry.insert("issuer-1", key.verifying_key());
///
/// let digest = Digest::sha256(b"data");
/// let sig = key.sign_digest(digest.as_bytes()).unwrap();
/// assert!(registry.verify_digest("issuer-1", digest.as_bytes(), &sig).is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct PublicKeyRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl PublicKeyRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a registry document.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidRegistry`] if the document is not in
    /// either accepted shape, or a key error naming the offending `kid`.
    pub fn from_json(text: &str) -> CryptoResult<Self> {
        let raw: RawRegistry =
            serde_json::from_str(text).map_err(|e| CryptoError::InvalidRegistry(e.to_string()))?;

        let pairs: Vec<(String, Algorithm, String)> = match raw {
            RawRegistry::Map(map) => map
                .into_iter()
                .map(|(kid, e)| (kid, e.algorithm, e.public_key))
                .collect(),
            RawRegistry::List(list) => list
                .into_iter()
                .map(|e| (e.kid, e.algorithm, e.public_key))
                .collect(),
        };

        let mut registry = Self::new();
        for (kid, algorithm, text) in pairs {
            if kid.is_empty() {
                return Err(CryptoError::InvalidRegistry("empty kid".to_string()));
            }
            let key = VerifyingKey::parse(algorithm, &text).map_err(|e| {
                CryptoError::InvalidRegistry(format!("key {kid}: {e}"))
            })?;
            registry.insert(kid, key);
        }
        Ok(registry)
    }

    /// Read and parse a registry file.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::IoError`] if the file cannot be read, or any
    /// error from [`PublicKeyRegistry::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> CryptoResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CryptoError::IoError(e.to_string()))?;
        Self::from_json(&text)
    }

    /// Add or replace a key.
    pub fn insert(&mut self, kid: impl Into<String>, key: VerifyingKey) {
        let kid = kid.into();
        let entry = RegistryEntry {
            kid: kid.clone(),
            algorithm: key.algorithm(),
            key,
        };
        self.entries.insert(kid, entry);
    }

    /// Remove a key. Returns `true` if it was present.
    pub fn remove(&mut self, kid: &str) -> bool {
        self.entries.remove(kid).is_some()
    }

    /// Look up a key.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&RegistryEntry> {
        self.entries.get(kid)
    }

    /// Whether `kid` is known.
    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.entries.contains_key(kid)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All key ids, sorted.
    #[must_use]
    pub fn kids(&self) -> Vec<&str> {
        let mut kids: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        kids.sort_unstable();
        kids
    }

    /// Verify a digest signature with the key registered under `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnknownKeyId`] if `kid` is not registered, or
    /// [`CryptoError::SignatureVerificationFailed`] if verification fails.
    pub fn verify_digest(&self, kid: &str, digest: &[u8], signature: &[u8]) -> CryptoResult<()> {
        self.lookup(kid)?.key.verify_digest(digest, signature)
    }

    /// Verify a message signature with the key registered under `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnknownKeyId`] if `kid` is not registered, or
    /// [`CryptoError::SignatureVerificationFailed`] if verification fails.
    pub fn verify_message(&self, kid: &str, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        self.lookup(kid)?.key.verify_message(message, signature)
    }

    fn lookup(&self, kid: &str) -> CryptoResult<&RegistryEntry> {
        self.entries
            .get(kid)
            .ok_or_else(|| CryptoError::UnknownKeyId(kid.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Digest, SigningKey, encode_base64};

    #[test]
    fn test_parse_object_form() {
        let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
        let public = key.verifying_key().to_text().unwrap();
        let doc = format!(r#"{{"issuer":{{"algorithm":"ed25519","public_key":"{public}"}}}}"#);

        let registry = PublicKeyRegistry::from_json(&doc).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("issuer").unwrap().algorithm, Algorithm::Ed25519);
    }

    #[test]
    fn test_parse_array_form() {
        let secret = encode_base64(b"shared-secret");
        let doc = format!(
            r#"[{{"kid":"a","algorithm":"hmac-sha256","public_key":"{secret}"}},
                {{"kid":"b","algorithm":"hmac-sha256","public_key":"{secret}"}}]"#
        );
        let registry = PublicKeyRegistry::from_json(&doc).unwrap();
        assert_eq!(registry.kids(), vec!["a", "b"]);
    }

    #[test]
    fn test_rejects_bad_documents() {
        assert!(PublicKeyRegistry::from_json("42").is_err());
        assert!(
            PublicKeyRegistry::from_json(r#"{"k":{"algorithm":"es256","public_key":"AA=="}}"#)
                .is_err()
        );
        let err = PublicKeyRegistry::from_json(r#"{"k":{"algorithm":"ed25519","public_key":"AA=="}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("key k"));
    }

    #[test]
    fn test_verify_unknown_kid() {
        let registry = PublicKeyRegistry::new();
        let digest = Digest::sha256(b"x");
        assert!(matches!(
            registry.verify_digest("nobody", digest.as_bytes(), &[0u8; 64]),
            Err(CryptoError::UnknownKeyId(k)) if k == "nobody"
        ));
    }

    #[test]
    fn test_from_file() {
        let key = SigningKey::generate(Algorithm::HmacSha256).unwrap();
        let public = key.verifying_key().to_text().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            format!(r#"{{"shared":{{"algorithm":"hmac-sha256","public_key":"{public}"}}}}"#),
        )
        .unwrap();

        let registry = PublicKeyRegistry::from_file(&path).unwrap();
        let msg = b"body";
        let tag = key.sign_message(msg).unwrap();
        assert!(registry.verify_message("shared", msg, &tag).is_ok());
        assert!(registry.verify_message("shared", b"other", &tag).is_err());
    }
}
