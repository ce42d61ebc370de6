//! Build the signing stack from configuration.

use std::sync::Arc;
use std::time::Duration;

use sigchain_config::{AlgorithmName, Config, KmsSection};
use sigchain_crypto::Algorithm;
use sigchain_kms::{HttpKmsClient, HttpKmsConfig, KmsAdapter, KmsClient};
use tracing::info;

use crate::chain::ProviderChain;
use crate::error::{SigningError, SigningResult};
use crate::provider::{EnvFallbackProvider, KmsProvider, PrimaryProvider};
use crate::resolver::KeyResolver;
use crate::source::{KeySource, key_sources};

/// Map the configuration algorithm name to the crypto type.
#[must_use]
pub const fn algorithm_from_config(name: AlgorithmName) -> Algorithm {
    match name {
        AlgorithmName::HmacSha256 => Algorithm::HmacSha256,
        AlgorithmName::RsaSha256 => Algorithm::RsaSha256,
        AlgorithmName::Ed25519 => Algorithm::Ed25519,
    }
}

/// HTTP KMS client for `[kms]`, or `None` when no endpoint is set.
///
/// # Errors
///
/// Returns [`SigningError::Config`] when `require_kms` is set without an
/// endpoint, and [`SigningError::Kms`] when the client cannot be built.
pub fn build_kms_client(kms: &KmsSection) -> SigningResult<Option<Arc<dyn KmsClient>>> {
    let endpoint = kms.endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty());
    let Some(endpoint) = endpoint else {
        if kms.require_kms {
            return Err(SigningError::Config(
                "kms.require_kms is set but kms.endpoint is empty".to_string(),
            ));
        }
        return Ok(None);
    };

    let config = HttpKmsConfig {
        endpoint: endpoint.to_string(),
        bearer_token: kms.bearer_token.clone(),
        timeout: Duration::from_millis(kms.timeout_ms),
        ca_cert: kms.ca_cert.clone(),
        client_cert: kms.client_cert.clone(),
        client_key: kms.client_key.clone(),
    };
    let client = HttpKmsClient::new(config)?;
    Ok(Some(Arc::new(client)))
}

/// Build the provider chain for `config`, creating an HTTP KMS client if
/// one is configured.
///
/// # Errors
///
/// See [`build_provider_chain_with`].
pub fn build_provider_chain(config: &Config) -> SigningResult<ProviderChain> {
    let client = build_kms_client(&config.kms)?;
    build_provider_chain_with(config, client)
}

/// Build the provider chain with an explicit KMS client.
///
/// The chain is the primary provider followed, unless `require_kms` is
/// set, by the local Ed25519 fallback when `signing.fallback_key_b64` is
/// configured. With `require_kms` the chain is strict so KMS failures
/// surface to the caller.
///
/// # Errors
///
/// Returns [`SigningError::Config`] when `require_kms` is set and no KMS
/// client or key id is available, or when the fallback key is malformed.
pub fn build_provider_chain_with(
    config: &Config,
    kms_client: Option<Arc<dyn KmsClient>>,
) -> SigningResult<ProviderChain> {
    let signing = &config.signing;
    let algorithm = algorithm_from_config(signing.algorithm);
    let require_kms = config.kms.require_kms;

    let kms_key_id = config
        .kms
        .key_id
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    let kms_provider = match (kms_client, kms_key_id) {
        (Some(client), Some(key_id)) => {
            let adapter = KmsAdapter::new(client, key_id)?;
            Some(KmsProvider::new(adapter, &signing.kid, algorithm))
        },
        _ if require_kms => {
            return Err(SigningError::Config(
                "kms.require_kms is set but no KMS client and key id are configured".to_string(),
            ));
        },
        _ => None,
    };

    let mut sources = key_sources(signing, &config.kms);
    if kms_provider.is_none() {
        sources.retain(|s| !matches!(s, KeySource::Kms { .. }));
    }

    let resolver = KeyResolver::new(
        algorithm,
        &signing.kid,
        sources,
        Duration::from_secs(signing.key_cache_ttl_secs),
    );
    let mut primary = PrimaryProvider::new(Arc::new(resolver));
    if let Some(kms) = kms_provider {
        primary = primary.with_kms(kms);
    }

    let mut chain = ProviderChain::new(&signing.kid, algorithm)
        .with_provider(Arc::new(primary))
        .strict(require_kms);

    let fallback_seed = signing
        .fallback_key_b64
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    if let Some(seed) = fallback_seed {
        if require_kms {
            info!("kms.require_kms is set, ignoring signing.fallback_key_b64");
        } else {
            let fallback = EnvFallbackProvider::from_base64_seed(seed)?;
            info!(kid = %fallback.kid(), "local fallback signer enabled");
            chain = chain.with_provider(Arc::new(fallback));
        }
    }

    info!(
        kid = %signing.kid,
        algorithm = %algorithm,
        providers = ?chain.provider_names(),
        strict = require_kms,
        "signing provider chain built"
    );
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use sigchain_config::KeySourceKind;
    use sigchain_crypto::{Digest, SigningKey};

    use super::*;
    use crate::provider::SigningProvider;

    #[test]
    fn require_kms_without_endpoint_fails() {
        let kms = KmsSection {
            require_kms: true,
            ..KmsSection::default()
        };
        assert!(matches!(build_kms_client(&kms), Err(SigningError::Config(_))));
    }

    #[test]
    fn no_endpoint_means_no_client() {
        assert!(build_kms_client(&KmsSection::default()).unwrap().is_none());
    }

    #[test]
    fn endpoint_builds_client() {
        let kms = KmsSection {
            endpoint: Some("https://kms.internal".into()),
            ..KmsSection::default()
        };
        assert!(build_kms_client(&kms).unwrap().is_some());
    }

    #[tokio::test]
    async fn default_config_signs_nothing() {
        let chain = build_provider_chain(&Config::default()).unwrap();
        assert_eq!(chain.provider_names(), vec!["primary"]);
        let outcome = chain.sign(&Digest::sha256(b"x")).await.unwrap();
        assert!(!outcome.is_signed());
        assert_eq!(outcome.kid, "audit-signer");
    }

    #[tokio::test]
    async fn fallback_signs_when_primary_has_no_key() {
        let seed = SigningKey::generate(Algorithm::Ed25519).unwrap().export().unwrap();
        let mut config = Config::default();
        config.signing.fallback_key_b64 = Some(seed.to_string());
        let chain = build_provider_chain(&config).unwrap();
        assert_eq!(chain.provider_names(), vec!["primary", "env-fallback"]);
        let outcome = chain.sign(&Digest::sha256(b"x")).await.unwrap();
        assert!(outcome.kid.starts_with("local-ed25519:"));
    }

    #[tokio::test]
    async fn inline_key_is_primary() {
        let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
        let mut config = Config::default();
        config.signing.algorithm = AlgorithmName::Ed25519;
        config.signing.sources = vec![KeySourceKind::Inline];
        config.signing.inline_key = Some(key.export().unwrap().to_string());
        let chain = build_provider_chain(&config).unwrap();
        let outcome = chain.sign(&Digest::sha256(b"x")).await.unwrap();
        assert_eq!(outcome.kid, "audit-signer");
        assert_eq!(outcome.algorithm, Algorithm::Ed25519);
    }

    #[test]
    fn require_kms_drops_fallback() {
        let seed = SigningKey::generate(Algorithm::Ed25519).unwrap().export().unwrap();
        let mut config = Config::default();
        config.signing.fallback_key_b64 = Some(seed.to_string());
        config.kms.require_kms = true;
        config.kms.endpoint = Some("https://kms.internal".into());
        config.kms.key_id = Some("alias/audit".into());
        let chain = build_provider_chain(&config).unwrap();
        assert_eq!(chain.provider_names(), vec!["primary"]);
    }

    #[test]
    fn require_kms_needs_key_id() {
        let mut config = Config::default();
        config.kms.require_kms = true;
        config.kms.endpoint = Some("https://kms.internal".into());
        assert!(matches!(
            build_provider_chain(&config),
            Err(SigningError::Config(_))
        ));
    }
}
