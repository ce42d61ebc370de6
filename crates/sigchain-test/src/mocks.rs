//! Mock implementations for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sigchain_crypto::SigningKey;
use sigchain_kms::{
    KmsClient, KmsError, KmsMacAlgorithm, KmsPublicKey, KmsResult, KmsSignature,
    KmsSigningAlgorithm, MessageType,
};

/// A call observed by [`MockKmsClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KmsCall {
    /// `sign`
    Sign {
        /// Requested key.
        key_id: String,
        /// Raw or digest.
        message_type: MessageType,
        /// Requested algorithm.
        algorithm: KmsSigningAlgorithm,
        /// Bytes sent for signing.
        message: Vec<u8>,
    },
    /// `generate_mac`
    Mac {
        /// Requested key.
        key_id: String,
        /// Bytes sent for the MAC.
        message: Vec<u8>,
    },
    /// `get_public_key`
    PublicKey {
        /// Requested key.
        key_id: String,
    },
}

/// In-process KMS backed by local keys.
///
/// Digest requests are signed with [`SigningKey::sign_digest`], raw requests
/// with [`SigningKey::sign_message`]. Queued failures are returned before
/// any key is consulted, one per call.
#[derive(Debug, Clone, Default)]
pub struct MockKmsClient {
    keys: Arc<Mutex<HashMap<String, SigningKey>>>,
    failures: Arc<Mutex<VecDeque<KmsError>>>,
    calls: Arc<Mutex<Vec<KmsCall>>>,
    reject_digest_signing: bool,
    signer_id: Option<String>,
}

impl MockKmsClient {
    /// Empty mock with no keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` under `key_id`.
    #[must_use]
    pub fn with_key(self, key_id: impl Into<String>, key: SigningKey) -> Self {
        if let Ok(mut keys) = self.keys.lock() {
            keys.insert(key_id.into(), key);
        }
        self
    }

    /// Answer every digest sign with 501-style `UnsupportedDigestSigning`.
    #[must_use]
    pub fn without_digest_signing(mut self) -> Self {
        self.reject_digest_signing = true;
        self
    }

    /// Report `signer_id` as the signing key instead of the requested one.
    #[must_use]
    pub fn with_signer_id(mut self, signer_id: impl Into<String>) -> Self {
        self.signer_id = Some(signer_id.into());
        self
    }

    /// Queue a failure for the next call.
    pub fn fail_next(&self, error: KmsError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(error);
        }
    }

    /// Calls seen so far.
    #[must_use]
    pub fn calls(&self) -> Vec<KmsCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls seen so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn record(&self, call: KmsCall) -> KmsResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        match self.failures.lock().ok().and_then(|mut f| f.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn key(&self, key_id: &str) -> KmsResult<SigningKey> {
        self.keys
            .lock()
            .ok()
            .and_then(|keys| keys.get(key_id).cloned())
            .ok_or_else(|| KmsError::Http {
                status: 404,
                body: format!("key {key_id} not found"),
            })
    }

    fn reply(&self, key_id: &str, signature: Vec<u8>) -> KmsSignature {
        KmsSignature {
            signature,
            key_id: self.signer_id.clone().unwrap_or_else(|| key_id.to_string()),
        }
    }
}

#[async_trait]
impl KmsClient for MockKmsClient {
    async fn sign(
        &self,
        key_id: &str,
        message: &[u8],
        message_type: MessageType,
        algorithm: KmsSigningAlgorithm,
    ) -> KmsResult<KmsSignature> {
        self.record(KmsCall::Sign {
            key_id: key_id.to_string(),
            message_type,
            algorithm,
            message: message.to_vec(),
        })?;
        if self.reject_digest_signing && message_type == MessageType::Digest {
            return Err(KmsError::UnsupportedDigestSigning {
                algorithm: format!("{algorithm:?}"),
            });
        }
        let key = self.key(key_id)?;
        let signed = match message_type {
            MessageType::Digest => key.sign_digest(message),
            MessageType::Raw => key.sign_message(message),
        };
        let signature = signed.map_err(|e| KmsError::InvalidResponse(e.to_string()))?;
        Ok(self.reply(key_id, signature))
    }

    async fn generate_mac(
        &self,
        key_id: &str,
        message: &[u8],
        _algorithm: KmsMacAlgorithm,
    ) -> KmsResult<KmsSignature> {
        self.record(KmsCall::Mac {
            key_id: key_id.to_string(),
            message: message.to_vec(),
        })?;
        let signature = self
            .key(key_id)?
            .sign_message(message)
            .map_err(|e| KmsError::InvalidResponse(e.to_string()))?;
        Ok(self.reply(key_id, signature))
    }

    async fn get_public_key(&self, key_id: &str) -> KmsResult<KmsPublicKey> {
        self.record(KmsCall::PublicKey {
            key_id: key_id.to_string(),
        })?;
        let key = self.key(key_id)?;
        let public_key = key
            .verifying_key()
            .to_text()
            .map_err(|e| KmsError::InvalidResponse(e.to_string()))?;
        Ok(KmsPublicKey {
            key_id: key_id.to_string(),
            public_key,
            algorithm: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use sigchain_crypto::Digest;

    use super::*;
    use crate::fixtures::ed25519_key;

    #[tokio::test]
    async fn digest_signing_and_recording() {
        let kms = MockKmsClient::new().with_key("k", ed25519_key());
        let digest = Digest::sha256(b"event");
        let sig = kms
            .sign(
                "k",
                digest.as_bytes(),
                MessageType::Digest,
                KmsSigningAlgorithm::Ed25519,
            )
            .await
            .unwrap();
        ed25519_key()
            .verifying_key()
            .verify_digest(digest.as_bytes(), &sig.signature)
            .unwrap();
        assert_eq!(sig.key_id, "k");
        assert_eq!(kms.call_count(), 1);
        assert!(matches!(
            &kms.calls()[0],
            KmsCall::Sign {
                message_type: MessageType::Digest,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn queued_failures_come_first() {
        let kms = MockKmsClient::new().with_key("k", ed25519_key());
        kms.fail_next(KmsError::Transport("reset".into()));
        assert!(matches!(
            kms.get_public_key("k").await,
            Err(KmsError::Transport(_))
        ));
        let key = kms.get_public_key("k").await.unwrap();
        assert_eq!(
            key.public_key,
            ed25519_key().verifying_key().to_text().unwrap()
        );
        assert!(matches!(
            kms.get_public_key("missing").await,
            Err(KmsError::Http { status: 404, .. })
        ));
    }
}
