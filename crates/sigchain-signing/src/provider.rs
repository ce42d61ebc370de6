//! Signing providers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sigchain_crypto::{Algorithm, Digest, SigningKey, VerifyingKey, encode_base64};
use sigchain_kms::{KmsAdapter, KmsError};
use tracing::{debug, warn};

use crate::error::{SigningError, SigningResult};
use crate::resolver::{KeyMaterial, KeyResolver};

/// Result of a signing attempt.
///
/// `signature` is `None` for the explicit unsigned marker: no key was
/// available, which is not an error by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignOutcome {
    /// Key id of the signer (or the configured kid when unsigned).
    pub kid: String,
    /// Algorithm of the signature.
    pub algorithm: Algorithm,
    /// Base64 signature.
    pub signature: Option<String>,
}

impl SignOutcome {
    /// A produced signature.
    #[must_use]
    pub fn signed(kid: impl Into<String>, algorithm: Algorithm, signature: &[u8]) -> Self {
        Self {
            kid: kid.into(),
            algorithm,
            signature: Some(encode_base64(signature)),
        }
    }

    /// The unsigned marker.
    #[must_use]
    pub fn unsigned(kid: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            kid: kid.into(),
            algorithm,
            signature: None,
        }
    }

    /// Whether a signature was produced.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// Something that can sign a 32-byte digest.
#[async_trait]
pub trait SigningProvider: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Sign `digest`, or return the unsigned marker if no key is available.
    async fn sign(&self, digest: &Digest) -> SigningResult<SignOutcome>;
}

// ---------------------------------------------------------------------------
// KMS
// ---------------------------------------------------------------------------

/// Delegates to a remote KMS through a [`KmsAdapter`].
#[derive(Debug, Clone)]
pub struct KmsProvider {
    adapter: KmsAdapter,
    kid: String,
    algorithm: Algorithm,
}

impl KmsProvider {
    /// New provider. `kid` is used on the unsigned marker; signed outcomes
    /// carry the key id the KMS reports.
    #[must_use]
    pub fn new(adapter: KmsAdapter, kid: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            adapter,
            kid: kid.into(),
            algorithm,
        }
    }

    /// The adapter in use.
    #[must_use]
    pub fn adapter(&self) -> &KmsAdapter {
        &self.adapter
    }
}

#[async_trait]
impl SigningProvider for KmsProvider {
    fn name(&self) -> &'static str {
        "kms"
    }

    async fn sign(&self, digest: &Digest) -> SigningResult<SignOutcome> {
        match self.adapter.sign_for(self.algorithm, digest).await {
            Ok(sig) => Ok(SignOutcome::signed(sig.key_id, self.algorithm, &sig.signature)),
            Err(KmsError::UnsupportedDigestSigning { algorithm }) => {
                warn!(
                    key_id = %self.adapter.key_id(),
                    algorithm = %algorithm,
                    "KMS key cannot sign digests, leaving event unsigned"
                );
                Ok(SignOutcome::unsigned(&self.kid, self.algorithm))
            },
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Primary
// ---------------------------------------------------------------------------

/// Signs with whatever the [`KeyResolver`] finds first: a local key in
/// process, or a KMS key through the attached [`KmsProvider`].
#[derive(Debug)]
pub struct PrimaryProvider {
    resolver: Arc<KeyResolver>,
    kms: Option<KmsProvider>,
}

impl PrimaryProvider {
    /// Local-only provider.
    #[must_use]
    pub fn new(resolver: Arc<KeyResolver>) -> Self {
        Self {
            resolver,
            kms: None,
        }
    }

    /// Attach the KMS provider used for KMS descriptors.
    #[must_use]
    pub fn with_kms(mut self, kms: KmsProvider) -> Self {
        self.kms = Some(kms);
        self
    }

    /// The resolver.
    #[must_use]
    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }
}

#[async_trait]
impl SigningProvider for PrimaryProvider {
    fn name(&self) -> &'static str {
        "primary"
    }

    async fn sign(&self, digest: &Digest) -> SigningResult<SignOutcome> {
        let descriptor = self.resolver.resolve().await?;
        match &descriptor.material {
            Some(KeyMaterial::Local(key)) => {
                let signature = key.sign_digest(digest.as_bytes())?;
                debug!(kid = %descriptor.kid, algorithm = %key.algorithm(), "digest signed locally");
                Ok(SignOutcome::signed(&descriptor.kid, key.algorithm(), &signature))
            },
            Some(KeyMaterial::Kms { key_id }) => match &self.kms {
                Some(kms) => kms.sign(digest).await,
                None => Err(SigningError::Config(format!(
                    "KMS key {key_id} resolved but no KMS client is configured"
                ))),
            },
            None => Ok(SignOutcome::unsigned(descriptor.kid, descriptor.algorithm)),
        }
    }
}

// ---------------------------------------------------------------------------
// Local fallback
// ---------------------------------------------------------------------------

/// Last-resort Ed25519 signer from a base64 seed held in configuration.
pub struct EnvFallbackProvider {
    key: SigningKey,
    kid: String,
}

impl std::fmt::Debug for EnvFallbackProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvFallbackProvider")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl EnvFallbackProvider {
    /// Build from a base64 32-byte seed or 64-byte keypair.
    ///
    /// The kid is `local-ed25519:` followed by the first 8 hex characters of
    /// the SHA-256 of the public key.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Crypto`] if the text is not a valid key.
    pub fn from_base64_seed(text: &str) -> SigningResult<Self> {
        let key = SigningKey::parse(Algorithm::Ed25519, text)?;
        let fingerprint = key.verifying_key().fingerprint()?.to_hex();
        let kid = format!("local-ed25519:{}", fingerprint.get(..8).unwrap_or(&fingerprint));
        Ok(Self { key, kid })
    }

    /// Derived key id.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Public key for registries and offline verification.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

#[async_trait]
impl SigningProvider for EnvFallbackProvider {
    fn name(&self) -> &'static str {
        "env-fallback"
    }

    async fn sign(&self, digest: &Digest) -> SigningResult<SignOutcome> {
        let signature = self.key.sign_digest(digest.as_bytes())?;
        Ok(SignOutcome::signed(&self.kid, Algorithm::Ed25519, &signature))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use sigchain_crypto::{KeyCache, decode_base64};
    use sigchain_kms::{
        KmsClient, KmsMacAlgorithm, KmsPublicKey, KmsResult, KmsSignature, KmsSigningAlgorithm,
        MessageType,
    };

    use super::*;
    use crate::source::KeySource;

    struct ScriptedKms {
        result: Mutex<Option<KmsError>>,
    }

    #[async_trait]
    impl KmsClient for ScriptedKms {
        async fn sign(
            &self,
            _key_id: &str,
            _message: &[u8],
            _message_type: MessageType,
            _algorithm: KmsSigningAlgorithm,
        ) -> KmsResult<KmsSignature> {
            match self.result.lock().unwrap().take() {
                Some(err) => Err(err),
                None => Ok(KmsSignature {
                    signature: vec![7; 64],
                    key_id: "arn:kms:key/1".into(),
                }),
            }
        }

        async fn generate_mac(
            &self,
            _key_id: &str,
            _message: &[u8],
            _algorithm: KmsMacAlgorithm,
        ) -> KmsResult<KmsSignature> {
            Ok(KmsSignature {
                signature: vec![9; 32],
                key_id: "mac-key".into(),
            })
        }

        async fn get_public_key(&self, key_id: &str) -> KmsResult<KmsPublicKey> {
            Err(KmsError::NotConfigured(key_id.to_string()))
        }
    }

    fn kms_provider(err: Option<KmsError>, algorithm: Algorithm) -> KmsProvider {
        let client = Arc::new(ScriptedKms {
            result: Mutex::new(err),
        });
        KmsProvider::new(KmsAdapter::new(client, "alias/audit").unwrap(), "audit-signer", algorithm)
    }

    #[tokio::test]
    async fn kms_signature_uses_reported_kid() {
        let outcome = kms_provider(None, Algorithm::RsaSha256)
            .sign(&Digest::sha256(b"x"))
            .await
            .unwrap();
        assert_eq!(outcome.kid, "arn:kms:key/1");
        assert_eq!(decode_base64(outcome.signature.as_deref().unwrap()).unwrap(), vec![7; 64]);
    }

    #[tokio::test]
    async fn kms_unsupported_digest_is_unsigned_marker() {
        let provider = kms_provider(
            Some(KmsError::UnsupportedDigestSigning {
                algorithm: "ed25519".into(),
            }),
            Algorithm::Ed25519,
        );
        let outcome = provider.sign(&Digest::sha256(b"x")).await.unwrap();
        assert!(!outcome.is_signed());
        assert_eq!(outcome.kid, "audit-signer");
    }

    #[tokio::test]
    async fn kms_transport_error_propagates() {
        let provider = kms_provider(Some(KmsError::Transport("reset".into())), Algorithm::RsaSha256);
        assert!(matches!(
            provider.sign(&Digest::sha256(b"x")).await,
            Err(SigningError::Kms(KmsError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn primary_signs_locally() {
        let key = SigningKey::generate(Algorithm::HmacSha256).unwrap();
        let resolver = KeyResolver::with_caches(
            Algorithm::HmacSha256,
            "hmac-kid",
            vec![(
                KeySource::Inline(key.export().unwrap().to_string()),
                KeyCache::new(Duration::from_secs(60)),
            )],
        );
        let provider = PrimaryProvider::new(Arc::new(resolver));
        let digest = Digest::sha256(b"payload");
        let outcome = provider.sign(&digest).await.unwrap();
        assert_eq!(outcome.kid, "hmac-kid");
        let sig = decode_base64(outcome.signature.as_deref().unwrap()).unwrap();
        key.verifying_key().verify_digest(digest.as_bytes(), &sig).unwrap();
    }

    #[tokio::test]
    async fn primary_without_material_is_unsigned() {
        let resolver = KeyResolver::new(Algorithm::Ed25519, "nobody", vec![], Duration::ZERO);
        let outcome = PrimaryProvider::new(Arc::new(resolver))
            .sign(&Digest::sha256(b"x"))
            .await
            .unwrap();
        assert_eq!(outcome, SignOutcome::unsigned("nobody", Algorithm::Ed25519));
    }

    #[tokio::test]
    async fn primary_delegates_kms_descriptor() {
        let resolver = KeyResolver::new(
            Algorithm::HmacSha256,
            "audit-signer",
            vec![KeySource::Kms {
                key_id: "alias/audit".into(),
            }],
            Duration::ZERO,
        );
        let resolver = Arc::new(resolver);
        let bare = PrimaryProvider::new(resolver.clone());
        assert!(matches!(
            bare.sign(&Digest::sha256(b"x")).await,
            Err(SigningError::Config(_))
        ));

        let provider = PrimaryProvider::new(resolver).with_kms(kms_provider(None, Algorithm::HmacSha256));
        let outcome = provider.sign(&Digest::sha256(b"x")).await.unwrap();
        assert_eq!(outcome.kid, "mac-key");
    }

    #[tokio::test]
    async fn fallback_kid_is_derived_from_public_key() {
        let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
        let provider = EnvFallbackProvider::from_base64_seed(&key.export().unwrap()).unwrap();
        let expected = &key.verifying_key().fingerprint().unwrap().to_hex()[..8];
        assert_eq!(provider.kid(), format!("local-ed25519:{expected}"));

        let digest = Digest::sha256(b"x");
        let outcome = provider.sign(&digest).await.unwrap();
        assert_eq!(outcome.algorithm, Algorithm::Ed25519);
        let sig = decode_base64(outcome.signature.as_deref().unwrap()).unwrap();
        provider
            .verifying_key()
            .verify_digest(digest.as_bytes(), &sig)
            .unwrap();
    }

    #[test]
    fn fallback_rejects_garbage() {
        assert!(EnvFallbackProvider::from_base64_seed("AAAA").is_err());
    }
}
