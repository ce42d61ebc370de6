//! Key and request fixtures.

use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use sigchain_crypto::{Algorithm, PublicKeyRegistry, SigningKey, encode_base64};
use sigchain_verify::CallbackRequest;

/// Shared secret behind [`hmac_key`].
pub const TEST_HMAC_SECRET: &[u8] = b"sigchain-test-shared-secret";

/// Seed behind [`ed25519_key`].
pub const TEST_ED25519_SEED: [u8; 32] = [7; 32];

/// Modulus size of [`rsa_key`]. Small to keep key generation fast.
pub const TEST_RSA_BITS: usize = 1024;

/// A fixed instant for tests that pass `now` explicitly.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// HMAC key over [`TEST_HMAC_SECRET`].
#[must_use]
pub fn hmac_key() -> SigningKey {
    SigningKey::hmac_from_secret(TEST_HMAC_SECRET).expect("hmac key")
}

/// Deterministic Ed25519 key.
#[must_use]
pub fn ed25519_key() -> SigningKey {
    SigningKey::ed25519_from_bytes(&TEST_ED25519_SEED).expect("ed25519 key")
}

/// Process-wide RSA key, generated once.
#[must_use]
pub fn rsa_key() -> &'static SigningKey {
    static KEY: OnceLock<SigningKey> = OnceLock::new();
    KEY.get_or_init(|| SigningKey::generate_rsa(TEST_RSA_BITS).expect("rsa key"))
}

/// Fixture key for `algorithm`.
#[must_use]
pub fn key_for(algorithm: Algorithm) -> SigningKey {
    match algorithm {
        Algorithm::HmacSha256 => hmac_key(),
        Algorithm::Ed25519 => ed25519_key(),
        Algorithm::RsaSha256 => rsa_key().clone(),
    }
}

/// Registry holding the public half of each `(kid, key)`.
#[must_use]
pub fn registry_with<'a>(
    entries: impl IntoIterator<Item = (&'a str, &'a SigningKey)>,
) -> PublicKeyRegistry {
    let mut registry = PublicKeyRegistry::new();
    for (kid, key) in entries {
        registry.insert(kid, key.verifying_key());
    }
    registry
}

/// Request signed in the structured `kid=;alg=;sig=` form.
#[must_use]
pub fn signed_callback(
    key: &SigningKey,
    kid: &str,
    body: &[u8],
    timestamp: i64,
    nonce: &str,
) -> CallbackRequest {
    let sig = key.sign_message(body).expect("sign body");
    CallbackRequest::new(body.to_vec())
        .with_header(
            "X-Kernel-Signature",
            format!(
                "kid={kid};alg={};sig={}",
                key.algorithm(),
                encode_base64(&sig)
            ),
        )
        .with_header("X-Kernel-Timestamp", timestamp.to_string())
        .with_header("X-Kernel-Nonce", nonce)
}

/// Request signed with [`hmac_key`] in the short `sha256=<hex>` form.
#[must_use]
pub fn signed_hmac_callback(body: &[u8], timestamp: i64, nonce: &str) -> CallbackRequest {
    let mac = hmac_key().sign_message(body).expect("sign body");
    CallbackRequest::new(body.to_vec())
        .with_header("X-Kernel-Signature", format!("sha256={}", hex::encode(mac)))
        .with_header("X-Kernel-Timestamp", timestamp.to_string())
        .with_header("X-Kernel-Nonce", nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_fixture_is_deterministic() {
        let a = ed25519_key().verifying_key().fingerprint().unwrap();
        let b = ed25519_key().verifying_key().fingerprint().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn callbacks_verify_against_registry() {
        let key = ed25519_key();
        let registry = registry_with([("k1", &key)]);
        let req = signed_callback(&key, "k1", b"{}", fixed_now().timestamp(), "n");
        let sig = req
            .headers
            .iter()
            .find(|(k, _)| k == "X-Kernel-Signature")
            .map(|(_, v)| v.clone())
            .unwrap();
        assert!(sig.starts_with("kid=k1;alg=ed25519;sig="));
        assert!(registry.contains("k1"));
    }
}
