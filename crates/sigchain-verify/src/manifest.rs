//! Detached signatures over canonical manifests.

use std::sync::Arc;

use serde_json::Value;
use sigchain_crypto::{Digest, PublicKeyRegistry, canonical_bytes, decode_base64};
use tracing::debug;

use crate::error::{ManifestError, ManifestResult};

/// A manifest with its detached signature.
///
/// On the wire this is a JSON object with `manifest` (any JSON value),
/// `signature` (base64) and `kid`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedManifest {
    /// The signed document.
    pub manifest: Value,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
    /// Key id of the signer.
    pub kid: String,
}

impl SignedManifest {
    /// Parse the wire form.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Malformed`] for invalid JSON,
    /// [`ManifestError::MissingField`] if a field is absent or empty, and
    /// [`ManifestError::SignatureEncoding`] if the signature is not base64.
    pub fn from_json(text: &str) -> ManifestResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ManifestError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse an already decoded wire form.
    ///
    /// # Errors
    ///
    /// See [`from_json`](Self::from_json).
    pub fn from_value(value: Value) -> ManifestResult<Self> {
        let Value::Object(mut doc) = value else {
            return Err(ManifestError::Malformed("expected a JSON object".into()));
        };
        let manifest = doc
            .remove("manifest")
            .filter(|m| !m.is_null())
            .ok_or(ManifestError::MissingField("manifest"))?;
        let signature = non_empty_str(&doc, "signature")?;
        let signature = decode_base64(signature).map_err(|_| ManifestError::SignatureEncoding)?;
        if signature.is_empty() {
            return Err(ManifestError::MissingField("signature"));
        }
        let kid = non_empty_str(&doc, "kid")?.to_string();
        Ok(Self {
            manifest,
            signature,
            kid,
        })
    }

    /// SHA-256 of the canonical manifest; this is what gets signed.
    #[must_use]
    pub fn manifest_hash(&self) -> Digest {
        Digest::sha256(&canonical_bytes(&self.manifest))
    }
}

fn non_empty_str<'a>(
    doc: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> ManifestResult<&'a str> {
    doc.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ManifestError::MissingField(field))
}

/// Checks [`SignedManifest`]s against a public-key registry.
#[derive(Debug, Clone)]
pub struct ManifestVerifier {
    registry: Arc<PublicKeyRegistry>,
}

impl ManifestVerifier {
    /// Verifier over `registry`.
    #[must_use]
    pub fn new(registry: Arc<PublicKeyRegistry>) -> Self {
        Self { registry }
    }

    /// Verify `signed`. Only asymmetric keys are accepted.
    ///
    /// # Errors
    ///
    /// Returns a [`ManifestError`] describing why the manifest is invalid.
    pub fn verify(&self, signed: &SignedManifest) -> ManifestResult<()> {
        let entry = self
            .registry
            .get(&signed.kid)
            .ok_or_else(|| ManifestError::UnknownKeyId(signed.kid.clone()))?;
        if entry.algorithm.is_symmetric() {
            return Err(ManifestError::UnsupportedAlgorithm {
                kid: signed.kid.clone(),
                algorithm: entry.algorithm.to_string(),
            });
        }

        let hash = signed.manifest_hash();
        entry
            .key
            .verify_message(hash.as_bytes(), &signed.signature)
            .map_err(|_| ManifestError::InvalidSignature(signed.kid.clone()))?;

        debug!(kid = %signed.kid, hash = %hash.to_hex(), "manifest verified");
        Ok(())
    }
}
