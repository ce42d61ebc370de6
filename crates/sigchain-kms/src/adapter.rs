//! Algorithm-aware front end over a [`KmsClient`].

use std::sync::Arc;

use sigchain_crypto::{Algorithm, Digest, VerifyingKey};
use tracing::debug;

use crate::client::{KmsClient, KmsMacAlgorithm, KmsSignature, KmsSigningAlgorithm, MessageType};
use crate::error::{KmsError, KmsResult};

/// Delegates digest signing to a KMS, choosing asymmetric sign or MAC by
/// algorithm.
///
/// Errors are never masked: a failed or unsupported KMS call is returned
/// to the caller, which owns the fallback policy.
#[derive(Clone)]
pub struct KmsAdapter {
    client: Arc<dyn KmsClient>,
    key_id: String,
}

impl std::fmt::Debug for KmsAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KmsAdapter")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl KmsAdapter {
    /// Wrap a client with the default key id used by [`sign_for`](Self::sign_for).
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::NotConfigured`] if `key_id` is empty.
    pub fn new(client: Arc<dyn KmsClient>, key_id: impl Into<String>) -> KmsResult<Self> {
        let key_id = key_id.into();
        if key_id.trim().is_empty() {
            return Err(KmsError::NotConfigured("key id is empty".to_string()));
        }
        Ok(Self { client, key_id })
    }

    /// Default key id.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Asymmetric sign of a precomputed digest (`MessageType::Digest`).
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::UnsupportedDigestSigning`] for symmetric
    /// algorithms, or whatever the client reports.
    pub async fn sign_digest(
        &self,
        digest: &Digest,
        key_id: &str,
        algorithm: Algorithm,
    ) -> KmsResult<KmsSignature> {
        let kms_algorithm = match algorithm {
            Algorithm::RsaSha256 => KmsSigningAlgorithm::RsassaPkcs1V15Sha256,
            Algorithm::Ed25519 => KmsSigningAlgorithm::Ed25519,
            Algorithm::HmacSha256 => {
                return Err(KmsError::UnsupportedDigestSigning {
                    algorithm: algorithm.to_string(),
                });
            },
        };
        self.client
            .sign(key_id, digest.as_bytes(), MessageType::Digest, kms_algorithm)
            .await
    }

    /// HMAC-SHA256 over a digest with a KMS-held symmetric key.
    ///
    /// # Errors
    ///
    /// Propagates client failures.
    pub async fn generate_mac(&self, digest: &Digest, key_id: &str) -> KmsResult<KmsSignature> {
        self.client
            .generate_mac(key_id, digest.as_bytes(), KmsMacAlgorithm::HmacSha256)
            .await
    }

    /// Sign `digest` with the default key, picking the operation for `algorithm`.
    ///
    /// # Errors
    ///
    /// Propagates client failures.
    pub async fn sign_for(&self, algorithm: Algorithm, digest: &Digest) -> KmsResult<KmsSignature> {
        debug!(key_id = %self.key_id, algorithm = %algorithm, "delegating signature to KMS");
        if algorithm.is_symmetric() {
            self.generate_mac(digest, &self.key_id).await
        } else {
            self.sign_digest(digest, &self.key_id, algorithm).await
        }
    }

    /// Fetch the public key for `key_id` and parse it for local verification.
    ///
    /// When `algorithm` is `None` the algorithm the KMS reports is used.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidResponse`] if the key or algorithm cannot
    /// be understood.
    pub async fn get_public_key(
        &self,
        key_id: &str,
        algorithm: Option<Algorithm>,
    ) -> KmsResult<VerifyingKey> {
        let exported = self.client.get_public_key(key_id).await?;
        let algorithm = match algorithm {
            Some(alg) => alg,
            None => infer_algorithm(exported.algorithm.as_deref()).ok_or_else(|| {
                KmsError::InvalidResponse(format!(
                    "cannot infer algorithm for key {key_id} from {:?}",
                    exported.algorithm
                ))
            })?,
        };
        if algorithm.is_symmetric() {
            return Err(KmsError::InvalidResponse(
                "symmetric keys have no public half".to_string(),
            ));
        }
        VerifyingKey::parse(algorithm, &exported.public_key)
            .map_err(|e| KmsError::InvalidResponse(e.to_string()))
    }
}

/// Map KMS key-spec / algorithm names onto [`Algorithm`].
fn infer_algorithm(name: Option<&str>) -> Option<Algorithm> {
    let name = name?.trim();
    if let Ok(alg) = name.parse::<Algorithm>() {
        return Some(alg);
    }
    let upper = name.to_ascii_uppercase();
    if upper.starts_with("RSASSA") || upper.starts_with("RSA") {
        Some(Algorithm::RsaSha256)
    } else if upper.contains("ED25519") {
        Some(Algorithm::Ed25519)
    } else if upper.starts_with("HMAC") {
        Some(Algorithm::HmacSha256)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sigchain_crypto::SigningKey;

    use super::*;
    use crate::client::KmsPublicKey;

    /// Signs with a local key so results can be checked.
    struct LocalKms {
        key: SigningKey,
        calls: Mutex<Vec<&'static str>>,
        reported_algorithm: Option<String>,
    }

    #[async_trait]
    impl KmsClient for LocalKms {
        async fn sign(
            &self,
            key_id: &str,
            message: &[u8],
            message_type: MessageType,
            _algorithm: KmsSigningAlgorithm,
        ) -> KmsResult<KmsSignature> {
            assert_eq!(message_type, MessageType::Digest);
            self.calls.lock().unwrap().push("sign");
            Ok(KmsSignature {
                signature: self.key.sign_digest(message).unwrap(),
                key_id: key_id.to_string(),
            })
        }

        async fn generate_mac(
            &self,
            key_id: &str,
            message: &[u8],
            _algorithm: KmsMacAlgorithm,
        ) -> KmsResult<KmsSignature> {
            self.calls.lock().unwrap().push("mac");
            Ok(KmsSignature {
                signature: self.key.sign_digest(message).unwrap(),
                key_id: key_id.to_string(),
            })
        }

        async fn get_public_key(&self, key_id: &str) -> KmsResult<KmsPublicKey> {
            Ok(KmsPublicKey {
                key_id: key_id.to_string(),
                public_key: self.key.verifying_key().to_text().unwrap(),
                algorithm: self.reported_algorithm.clone(),
            })
        }
    }

    fn fixture(algorithm: Algorithm, reported: Option<&str>) -> (KmsAdapter, Arc<LocalKms>) {
        let kms = Arc::new(LocalKms {
            key: SigningKey::generate(algorithm).unwrap(),
            calls: Mutex::new(Vec::new()),
            reported_algorithm: reported.map(String::from),
        });
        (KmsAdapter::new(kms.clone(), "kms-key-1").unwrap(), kms)
    }

    #[test]
    fn empty_key_id_rejected() {
        let (_, kms) = fixture(Algorithm::Ed25519, None);
        assert!(matches!(
            KmsAdapter::new(kms, " "),
            Err(KmsError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn ed25519_uses_sign() {
        let (adapter, kms) = fixture(Algorithm::Ed25519, None);
        let digest = Digest::sha256(b"event");
        let sig = adapter.sign_for(Algorithm::Ed25519, &digest).await.unwrap();
        assert_eq!(sig.key_id, "kms-key-1");
        assert_eq!(*kms.calls.lock().unwrap(), vec!["sign"]);
        kms.key
            .verifying_key()
            .verify_digest(digest.as_bytes(), &sig.signature)
            .unwrap();
    }

    #[tokio::test]
    async fn hmac_uses_generate_mac() {
        let (adapter, kms) = fixture(Algorithm::HmacSha256, None);
        let digest = Digest::sha256(b"event");
        adapter.sign_for(Algorithm::HmacSha256, &digest).await.unwrap();
        assert_eq!(*kms.calls.lock().unwrap(), vec!["mac"]);
    }

    #[tokio::test]
    async fn sign_digest_refuses_hmac() {
        let (adapter, kms) = fixture(Algorithm::HmacSha256, None);
        let err = adapter
            .sign_digest(&Digest::sha256(b"x"), "kms-key-1", Algorithm::HmacSha256)
            .await
            .unwrap_err();
        assert!(matches!(err, KmsError::UnsupportedDigestSigning { .. }));
        assert!(kms.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn public_key_algorithm_inferred_from_key_spec() {
        let (adapter, kms) = fixture(Algorithm::Ed25519, Some("ED25519"));
        let key = adapter.get_public_key("kms-key-1", None).await.unwrap();
        let digest = Digest::sha256(b"x");
        let sig = kms.key.sign_digest(digest.as_bytes()).unwrap();
        key.verify_digest(digest.as_bytes(), &sig).unwrap();

        let (adapter, _) = adapter_unknown();
        assert!(matches!(
            adapter.get_public_key("kms-key-1", None).await,
            Err(KmsError::InvalidResponse(_))
        ));
    }

    fn adapter_unknown() -> (KmsAdapter, Arc<LocalKms>) {
        fixture(Algorithm::Ed25519, Some("ECC_NIST_P256"))
    }

    #[test]
    fn infer_known_names() {
        assert_eq!(
            infer_algorithm(Some("RSASSA_PKCS1_V1_5_SHA_256")),
            Some(Algorithm::RsaSha256)
        );
        assert_eq!(infer_algorithm(Some("rsa-sha256")), Some(Algorithm::RsaSha256));
        assert_eq!(infer_algorithm(Some("HMAC_256")), Some(Algorithm::HmacSha256));
        assert_eq!(infer_algorithm(None), None);
    }
}
