//! Key material for the three supported algorithms.
//!
//! A [`SigningKey`] holds private material (HMAC secret, Ed25519 seed, RSA
//! private key) and a [`VerifyingKey`] holds what a verifier needs (the same
//! HMAC secret, an Ed25519 public key, an RSA public key). Secret bytes are
//! zeroized on drop and never printed by `Debug`.
//!
//! Text encodings accepted by the parsers:
//! - HMAC: base64 secret bytes
//! - Ed25519: base64 32-byte seed / 64-byte keypair (private), base64 32-byte
//!   public key, or PKCS#8 / SPKI PEM
//! - RSA: PKCS#8 or PKCS#1 PEM, or base64 DER of either

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{Signer as _, Verifier as _};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::algorithm::Algorithm;
use crate::digest::Digest;
use crate::error::{CryptoError, CryptoResult};

type HmacSha256 = Hmac<Sha256>;

/// Default modulus size for generated RSA keys.
const RSA_DEFAULT_BITS: usize = 2048;

/// Length of generated HMAC secrets.
const HMAC_SECRET_LEN: usize = 32;

/// Encode bytes as standard (padded) base64.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, tolerating surrounding whitespace.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidBase64Encoding`] if the input is not base64.
pub fn decode_base64(text: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|_| CryptoError::InvalidBase64Encoding)
}

fn is_pem(text: &str) -> bool {
    text.trim_start().starts_with("-----BEGIN")
}

fn invalid(algorithm: Algorithm, reason: impl std::fmt::Display) -> CryptoError {
    CryptoError::InvalidKey {
        algorithm: algorithm.to_string(),
        reason: reason.to_string(),
    }
}

fn digest_bytes(digest: &[u8]) -> CryptoResult<&[u8]> {
    if digest.len() == 32 {
        Ok(digest)
    } else {
        Err(CryptoError::InvalidDigestLength(digest.len()))
    }
}

fn rsa_prehash() -> Pkcs1v15Sign {
    Pkcs1v15Sign::new::<Sha256>()
}

/// Private key material bound to one algorithm.
#[derive(Clone)]
pub enum SigningKey {
    /// Shared HMAC secret.
    Hmac(Zeroizing<Vec<u8>>),
    /// Ed25519 private key.
    Ed25519(ed25519_dalek::SigningKey),
    /// RSA private key.
    Rsa(Box<RsaPrivateKey>),
}

impl SigningKey {
    /// Generate fresh key material.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SigningFailed`] if RSA key generation fails.
    pub fn generate(algorithm: Algorithm) -> CryptoResult<Self> {
        match algorithm {
            Algorithm::HmacSha256 => {
                let mut secret = Zeroizing::new(vec![0u8; HMAC_SECRET_LEN]);
                OsRng.fill_bytes(&mut secret);
                Ok(Self::Hmac(secret))
            },
            Algorithm::Ed25519 => Ok(Self::Ed25519(ed25519_dalek::SigningKey::generate(
                &mut OsRng,
            ))),
            Algorithm::RsaSha256 => Self::generate_rsa(RSA_DEFAULT_BITS),
        }
    }

    /// Generate an RSA key with an explicit modulus size.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SigningFailed`] if key generation fails.
    pub fn generate_rsa(bits: usize) -> CryptoResult<Self> {
        let key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        Ok(Self::Rsa(Box::new(key)))
    }

    /// Create an HMAC key from raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] for an empty secret.
    pub fn hmac_from_secret(secret: &[u8]) -> CryptoResult<Self> {
        if secret.is_empty() {
            return Err(CryptoError::InvalidKeyLength {
                expected: HMAC_SECRET_LEN,
                actual: 0,
            });
        }
        Ok(Self::Hmac(Zeroizing::new(secret.to_vec())))
    }

    /// Create an Ed25519 key from a 32-byte seed or a 64-byte keypair.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] for any other length, or
    /// [`CryptoError::InvalidKey`] if a keypair's halves do not match.
    pub fn ed25519_from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        match bytes.len() {
            32 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                seed.copy_from_slice(bytes);
                Ok(Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)))
            },
            64 => {
                let mut pair = Zeroizing::new([0u8; 64]);
                pair.copy_from_slice(bytes);
                ed25519_dalek::SigningKey::from_keypair_bytes(&pair)
                    .map(Self::Ed25519)
                    .map_err(|e| invalid(Algorithm::Ed25519, e))
            },
            actual => Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual,
            }),
        }
    }

    /// Parse textual key material for the given algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] or an encoding error if the text
    /// cannot be interpreted as a key for `algorithm`.
    pub fn parse(algorithm: Algorithm, text: &str) -> CryptoResult<Self> {
        let text = text.trim();
        match algorithm {
            Algorithm::HmacSha256 => {
                let secret = Zeroizing::new(decode_base64(text)?);
                Self::hmac_from_secret(&secret)
            },
            Algorithm::Ed25519 if is_pem(text) => {
                <ed25519_dalek::SigningKey as ed25519_dalek::pkcs8::DecodePrivateKey>::from_pkcs8_pem(text)
                    .map(Self::Ed25519)
                    .map_err(|e| invalid(algorithm, e))
            },
            Algorithm::Ed25519 => {
                let bytes = Zeroizing::new(decode_base64(text)?);
                Self::ed25519_from_bytes(&bytes)
            },
            Algorithm::RsaSha256 => parse_rsa_private(text).map(|k| Self::Rsa(Box::new(k))),
        }
    }

    /// Algorithm this key signs with.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Self::Hmac(_) => Algorithm::HmacSha256,
            Self::Ed25519(_) => Algorithm::Ed25519,
            Self::Rsa(_) => Algorithm::RsaSha256,
        }
    }

    /// Sign a precomputed 32-byte SHA-256 digest.
    ///
    /// - HMAC: `HMAC-SHA256(secret, digest)`
    /// - Ed25519: the digest bytes are the signed message
    /// - RSA: PKCS#1 v1.5 over `DigestInfo(SHA-256, digest)`, no rehash
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidDigestLength`] if `digest` is not 32
    /// bytes, or [`CryptoError::SigningFailed`] if the private-key operation
    /// fails.
    pub fn sign_digest(&self, digest: &[u8]) -> CryptoResult<Vec<u8>> {
        let digest = digest_bytes(digest)?;
        match self {
            Self::Rsa(key) => key
                .sign(rsa_prehash(), digest)
                .map_err(|e| CryptoError::SigningFailed(e.to_string())),
            _ => self.sign_message(digest),
        }
    }

    /// Sign an arbitrary message (RSA hashes it with SHA-256 first).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SigningFailed`] if the private-key operation fails.
    pub fn sign_message(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        match self {
            Self::Hmac(secret) => {
                let mut mac = HmacSha256::new_from_slice(secret)
                    .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
                mac.update(message);
                Ok(mac.finalize().into_bytes().to_vec())
            },
            Self::Ed25519(key) => Ok(key.sign(message).to_bytes().to_vec()),
            Self::Rsa(key) => {
                let hashed = Digest::sha256(message);
                key.sign(rsa_prehash(), hashed.as_bytes())
                    .map_err(|e| CryptoError::SigningFailed(e.to_string()))
            },
        }
    }

    /// The key a verifier needs for signatures made by this key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        match self {
            Self::Hmac(secret) => VerifyingKey::Hmac(secret.clone()),
            Self::Ed25519(key) => VerifyingKey::Ed25519(key.verifying_key()),
            Self::Rsa(key) => VerifyingKey::Rsa(Box::new(key.to_public_key())),
        }
    }

    /// Export the private material in the text form [`SigningKey::parse`] accepts.
    ///
    /// This is sensitive; it exists for key generation tooling.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if PEM encoding fails.
    pub fn export(&self) -> CryptoResult<Zeroizing<String>> {
        match self {
            Self::Hmac(secret) => Ok(Zeroizing::new(encode_base64(secret))),
            Self::Ed25519(key) => Ok(Zeroizing::new(encode_base64(&key.to_bytes()))),
            Self::Rsa(key) => rsa::pkcs8::EncodePrivateKey::to_pkcs8_pem(
                key.as_ref(),
                rsa::pkcs8::LineEnding::LF,
            )
            .map_err(|e| invalid(Algorithm::RsaSha256, e)),
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

fn parse_rsa_private(text: &str) -> CryptoResult<RsaPrivateKey> {
    let alg = Algorithm::RsaSha256;
    if is_pem(text) {
        return <RsaPrivateKey as rsa::pkcs8::DecodePrivateKey>::from_pkcs8_pem(text)
            .or_else(|_| {
                <RsaPrivateKey as rsa::pkcs1::DecodeRsaPrivateKey>::from_pkcs1_pem(text)
            })
            .map_err(|e| invalid(alg, e));
    }
    let der = Zeroizing::new(decode_base64(text)?);
    <RsaPrivateKey as rsa::pkcs8::DecodePrivateKey>::from_pkcs8_der(&der)
        .or_else(|_| <RsaPrivateKey as rsa::pkcs1::DecodeRsaPrivateKey>::from_pkcs1_der(&der))
        .map_err(|e| invalid(alg, e))
}

fn parse_rsa_public(text: &str) -> CryptoResult<RsaPublicKey> {
    let alg = Algorithm::RsaSha256;
    if is_pem(text) {
        return <RsaPublicKey as rsa::pkcs8::DecodePublicKey>::from_public_key_pem(text)
            .or_else(|_| <RsaPublicKey as rsa::pkcs1::DecodeRsaPublicKey>::from_pkcs1_pem(text))
            .map_err(|e| invalid(alg, e));
    }
    let der = decode_base64(text)?;
    <RsaPublicKey as rsa::pkcs8::DecodePublicKey>::from_public_key_der(&der)
        .or_else(|_| <RsaPublicKey as rsa::pkcs1::DecodeRsaPublicKey>::from_pkcs1_der(&der))
        .map_err(|e| invalid(alg, e))
}

/// Verification material bound to one algorithm.
#[derive(Clone)]
pub enum VerifyingKey {
    /// Shared HMAC secret.
    Hmac(Zeroizing<Vec<u8>>),
    /// Ed25519 public key.
    Ed25519(ed25519_dalek::VerifyingKey),
    /// RSA public key.
    Rsa(Box<RsaPublicKey>),
}

impl VerifyingKey {
    /// Parse textual verification material (registry `public_key` field).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] or an encoding error if the text
    /// cannot be interpreted as a key for `algorithm`.
    pub fn parse(algorithm: Algorithm, text: &str) -> CryptoResult<Self> {
        let text = text.trim();
        match algorithm {
            Algorithm::HmacSha256 => {
                let secret = decode_base64(text)?;
                if secret.is_empty() {
                    return Err(invalid(algorithm, "empty secret"));
                }
                Ok(Self::Hmac(Zeroizing::new(secret)))
            },
            Algorithm::Ed25519 if is_pem(text) => {
                <ed25519_dalek::VerifyingKey as ed25519_dalek::pkcs8::DecodePublicKey>::from_public_key_pem(text)
                    .map(Self::Ed25519)
                    .map_err(|e| invalid(algorithm, e))
            },
            Algorithm::Ed25519 => {
                let bytes = decode_base64(text)?;
                let bytes: [u8; 32] =
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| CryptoError::InvalidKeyLength {
                            expected: 32,
                            actual: bytes.len(),
                        })?;
                ed25519_dalek::VerifyingKey::from_bytes(&bytes)
                    .map(Self::Ed25519)
                    .map_err(|e| invalid(algorithm, e))
            },
            Algorithm::RsaSha256 => parse_rsa_public(text).map(|k| Self::Rsa(Box::new(k))),
        }
    }

    /// Algorithm this key verifies.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Self::Hmac(_) => Algorithm::HmacSha256,
            Self::Ed25519(_) => Algorithm::Ed25519,
            Self::Rsa(_) => Algorithm::RsaSha256,
        }
    }

    /// Verify a signature produced by [`SigningKey::sign_digest`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidDigestLength`] for a non-32-byte digest
    /// and [`CryptoError::SignatureVerificationFailed`] if the signature does
    /// not match.
    pub fn verify_digest(&self, digest: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let digest = digest_bytes(digest)?;
        match self {
            Self::Rsa(key) => key
                .verify(rsa_prehash(), digest, signature)
                .map_err(|_| CryptoError::SignatureVerificationFailed),
            _ => self.verify_message(digest, signature),
        }
    }

    /// Verify a signature over an arbitrary message.
    ///
    /// HMAC tags are compared in constant time. RSA uses standard
    /// RSASSA-PKCS1-v1_5 with SHA-256 over the message.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SignatureVerificationFailed`] if the signature
    /// does not match.
    pub fn verify_message(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let ok = match self {
            Self::Hmac(secret) => {
                let mut mac = HmacSha256::new_from_slice(secret)
                    .map_err(|_| CryptoError::SignatureVerificationFailed)?;
                mac.update(message);
                let expected = mac.finalize().into_bytes();
                bool::from(expected.as_slice().ct_eq(signature))
            },
            Self::Ed25519(key) => ed25519_dalek::Signature::from_slice(signature)
                .is_ok_and(|sig| key.verify(message, &sig).is_ok()),
            Self::Rsa(key) => {
                let hashed = Digest::sha256(message);
                key.verify(rsa_prehash(), hashed.as_bytes(), signature)
                    .is_ok()
            },
        };
        if ok {
            Ok(())
        } else {
            Err(CryptoError::SignatureVerificationFailed)
        }
    }

    /// Encode in the text form [`VerifyingKey::parse`] accepts
    /// (base64 for HMAC and Ed25519, SPKI PEM for RSA).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if PEM encoding fails.
    pub fn to_text(&self) -> CryptoResult<String> {
        match self {
            Self::Hmac(secret) => Ok(encode_base64(secret)),
            Self::Ed25519(key) => Ok(encode_base64(key.as_bytes())),
            Self::Rsa(key) => rsa::pkcs8::EncodePublicKey::to_public_key_pem(
                key.as_ref(),
                rsa::pkcs8::LineEnding::LF,
            )
            .map_err(|e| invalid(Algorithm::RsaSha256, e)),
        }
    }

    /// SHA-256 over the key's binary encoding (raw bytes, or SPKI DER for RSA).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if DER encoding fails.
    pub fn fingerprint(&self) -> CryptoResult<Digest> {
        match self {
            Self::Hmac(secret) => Ok(Digest::sha256(secret)),
            Self::Ed25519(key) => Ok(Digest::sha256(key.as_bytes())),
            Self::Rsa(key) => rsa::pkcs8::EncodePublicKey::to_public_key_der(key.as_ref())
                .map(|doc| Digest::sha256(doc.as_bytes()))
                .map_err(|e| invalid(Algorithm::RsaSha256, e)),
        }
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hmac(_) => f.write_str("VerifyingKey::Hmac(<redacted>)"),
            Self::Ed25519(key) => {
                write!(f, "VerifyingKey::Ed25519({})", hex::encode(&key.as_bytes()[..8]))
            },
            Self::Rsa(_) => f.write_str("VerifyingKey::Rsa(..)"),
        }
    }
}
