//! KMS client trait and wire types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::KmsResult;

/// Whether `message` is the data itself or its precomputed digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    /// The KMS hashes the message.
    Raw,
    /// The message is already a SHA-256 digest.
    Digest,
}

/// Asymmetric signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KmsSigningAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "RSASSA_PKCS1_V1_5_SHA_256")]
    RsassaPkcs1V15Sha256,
    /// Ed25519.
    #[serde(rename = "ED25519")]
    Ed25519,
}

/// MAC algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KmsMacAlgorithm {
    /// HMAC with SHA-256.
    #[serde(rename = "HMAC_SHA_256")]
    HmacSha256,
}

/// A signature or MAC produced by the KMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmsSignature {
    /// Raw signature / MAC bytes.
    pub signature: Vec<u8>,
    /// Key id the KMS reports for the key that signed.
    pub key_id: String,
}

/// Public key material exported by the KMS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmsPublicKey {
    /// Key id.
    pub key_id: String,
    /// Text encoding of the key (base64 raw / DER, or PEM).
    pub public_key: String,
    /// Algorithm name the KMS reports, when it reports one.
    pub algorithm: Option<String>,
}

/// Operations a KMS backend provides.
#[async_trait]
pub trait KmsClient: Send + Sync {
    /// Asymmetric sign.
    async fn sign(
        &self,
        key_id: &str,
        message: &[u8],
        message_type: MessageType,
        algorithm: KmsSigningAlgorithm,
    ) -> KmsResult<KmsSignature>;

    /// Symmetric MAC.
    async fn generate_mac(
        &self,
        key_id: &str,
        message: &[u8],
        algorithm: KmsMacAlgorithm,
    ) -> KmsResult<KmsSignature>;

    /// Export the public half of an asymmetric key.
    async fn get_public_key(&self, key_id: &str) -> KmsResult<KmsPublicKey>;
}
