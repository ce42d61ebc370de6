//! Signing provider behavior with no usable key material, and digest-level
//! sign/verify for each algorithm.

use std::sync::Arc;

use serde_json::json;
use sigchain_audit::{AuditChainService, AuditError};
use sigchain_config::{Config, KmsSection, SigningSection};
use sigchain_crypto::{Algorithm, Digest, canonical_bytes, canonicalize};
use sigchain_signing::{SigningError, SigningProvider, build_provider_chain};
use sigchain_storage::{AuditEventStore, MemoryStore};
use sigchain_test::key_for;

fn keyless_config() -> Config {
    Config {
        signing: SigningSection {
            kid: "audit-signer".into(),
            ..SigningSection::default()
        },
        ..Config::default()
    }
}

#[tokio::test]
async fn no_key_source_yields_unsigned_outcome() {
    let chain = build_provider_chain(&keyless_config()).unwrap();
    let outcome = chain.sign(&Digest::sha256(b"x")).await.unwrap();
    assert!(outcome.signature.is_none());
    assert_eq!(outcome.kid, "audit-signer");
}

#[tokio::test]
async fn require_signed_refuses_to_persist_unsigned_events() {
    let store = Arc::new(MemoryStore::new());
    let chain = Arc::new(build_provider_chain(&keyless_config()).unwrap());

    let strict = AuditChainService::new(store.clone(), chain.clone()).require_signed(true);
    let err = strict
        .record_event("ops", "config.changed", json!({ "k": "v" }))
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::UnsignedRejected { .. }));
    assert!(store.list_audit_events().await.unwrap().is_empty());

    let lenient = AuditChainService::new(store.clone(), chain);
    let recorded = lenient
        .record_event("ops", "config.changed", json!({ "k": "v" }))
        .await
        .unwrap();
    assert!(recorded.signature.is_none());
    assert_eq!(store.list_audit_events().await.unwrap().len(), 1);
}

#[test]
fn required_kms_without_endpoint_is_a_config_error() {
    let config = Config {
        kms: KmsSection {
            key_id: Some("kms-key".into()),
            require_kms: true,
            ..KmsSection::default()
        },
        ..keyless_config()
    };
    assert!(matches!(
        build_provider_chain(&config),
        Err(SigningError::Config(_))
    ));
}

#[test]
fn digest_round_trip_for_each_algorithm() {
    let digest = Digest::sha256(&canonical_bytes(&json!({ "b": 2, "a": 1 })));
    for algorithm in [Algorithm::HmacSha256, Algorithm::Ed25519, Algorithm::RsaSha256] {
        let key = key_for(algorithm);
        let public = key.verifying_key();
        let mut sig = key.sign_digest(digest.as_bytes()).unwrap();
        public.verify_digest(digest.as_bytes(), &sig).unwrap();

        if let Some(byte) = sig.last_mut() {
            *byte ^= 0x80;
        }
        assert!(
            public.verify_digest(digest.as_bytes(), &sig).is_err(),
            "{algorithm} accepted a flipped signature"
        );
    }
}

#[test]
fn canonical_form_ignores_key_order() {
    let a = json!({ "outer": { "y": [1, { "q": true, "p": null }], "x": "s" }, "n": 1.5 });
    let b = json!({ "n": 1.5, "outer": { "x": "s", "y": [1, { "p": null, "q": true }] } });
    assert_eq!(canonicalize(&a), canonicalize(&b));
}
