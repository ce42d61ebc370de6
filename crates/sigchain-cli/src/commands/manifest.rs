//! Manifest command - check a detached manifest signature.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sigchain_crypto::PublicKeyRegistry;
use sigchain_verify::{ManifestVerifier, SignedManifest};

use crate::theme::Theme;

/// Verify the signed manifest at `manifest` against `registry`.
pub(crate) fn verify_manifest(manifest: &Path, registry: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(manifest)
        .with_context(|| format!("failed to read {}", manifest.display()))?;
    let registry = PublicKeyRegistry::from_file(registry)
        .with_context(|| format!("failed to load registry {}", registry.display()))?;

    let signed = SignedManifest::from_json(&text)?;
    let hash = signed.manifest_hash();
    ManifestVerifier::new(Arc::new(registry)).verify(&signed)?;

    println!("{}", Theme::success("Manifest signature valid"));
    println!("{}", Theme::kv("Key id", &signed.kid));
    println!("{}", Theme::kv("SHA-256", &hash.to_hex()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use sigchain_crypto::{Algorithm, SigningKey, encode_base64};

    use super::*;

    #[test]
    fn verifies_signed_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
        let manifest = serde_json::json!({"name": "billing-agent", "version": "1.2.0"});
        let hash = sigchain_crypto::Digest::sha256(&sigchain_crypto::canonical_bytes(&manifest));
        let sig = key.sign_message(hash.as_bytes()).unwrap();

        let doc = dir.path().join("manifest.json");
        std::fs::write(
            &doc,
            serde_json::json!({"manifest": manifest, "signature": encode_base64(&sig), "kid": "rel"})
                .to_string(),
        )
        .unwrap();
        let registry = dir.path().join("registry.json");
        std::fs::write(
            &registry,
            serde_json::json!({"rel": {
                "algorithm": "ed25519",
                "public_key": key.verifying_key().to_text().unwrap(),
            }})
            .to_string(),
        )
        .unwrap();

        verify_manifest(&doc, &registry).unwrap();

        std::fs::write(&registry, r#"{}"#).unwrap();
        assert!(verify_manifest(&doc, &registry).is_err());
    }
}
