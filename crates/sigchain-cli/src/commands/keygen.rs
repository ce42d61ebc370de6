//! Keygen command - generate signing material and its registry entry.

use anyhow::Context;
use serde_json::json;
use sigchain_crypto::{Algorithm, SigningKey};

use crate::theme::Theme;

/// Generated key, its export, and the matching registry entry.
struct Generated {
    private: String,
    registry_entry: serde_json::Value,
    fingerprint: String,
}

fn generate(algorithm: Algorithm, kid: &str) -> anyhow::Result<Generated> {
    let key = SigningKey::generate(algorithm)?;
    let public = key.verifying_key();
    let registry_entry = json!({
        kid: {
            "algorithm": algorithm.as_str(),
            "public_key": public.to_text()?,
        }
    });
    Ok(Generated {
        private: (*key.export()?).clone(),
        registry_entry,
        fingerprint: public.fingerprint()?.to_hex(),
    })
}

/// Generate a key and print it with its registry entry.
pub(crate) fn run(algorithm: &str, kid: &str) -> anyhow::Result<()> {
    let algorithm: Algorithm = algorithm
        .parse()
        .with_context(|| format!("unknown algorithm {algorithm}"))?;
    let generated = generate(algorithm, kid)?;

    println!("\n{}", Theme::header("Generated Key"));
    println!("{}", Theme::kv("Algorithm", algorithm.as_str()));
    println!("{}", Theme::kv("Key id", kid));
    println!("{}", Theme::kv("Fingerprint", &generated.fingerprint));
    println!();
    if algorithm.is_symmetric() {
        println!(
            "{}",
            Theme::warning("Shared secret: the registry entry below is also secret")
        );
    }
    println!("{}", Theme::header("Private key"));
    println!("{}", generated.private);
    println!();
    println!("{}", Theme::header("Registry entry"));
    println!("{}", serde_json::to_string_pretty(&generated.registry_entry)?);
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use sigchain_crypto::PublicKeyRegistry;

    use super::*;

    #[test]
    fn ed25519_entry_loads_into_registry() {
        let generated = generate(Algorithm::Ed25519, "k-1").unwrap();
        let registry = PublicKeyRegistry::from_json(&generated.registry_entry.to_string()).unwrap();
        let key = SigningKey::parse(Algorithm::Ed25519, &generated.private).unwrap();
        let sig = key.sign_message(b"hello").unwrap();
        registry.verify_message("k-1", b"hello", &sig).unwrap();
    }

    #[test]
    fn rejects_unknown_algorithm() {
        assert!(run("dsa", "k").is_err());
    }
}
