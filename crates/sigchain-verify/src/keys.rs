//! Verification keys for inbound callbacks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sigchain_crypto::{
    Algorithm, KeyCache, PublicKeyRegistry, RegistryEntry, SigningKey, VerifyingKey,
};
use tokio::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::headers::SHARED_KID;

/// Where the public-key registry document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySource {
    /// JSON held in configuration.
    Inline(String),
    /// JSON file.
    File(PathBuf),
    /// JSON fetched over HTTP.
    Url(String),
    /// No registry; only the shared secret.
    SharedOnly,
}

/// Resolves a kid to a verification key.
///
/// The registry document is cached for the configured TTL. When a refresh
/// fails the previous document keeps being served, and with no document at
/// all the registry is treated as empty. The shared HMAC secret answers only
/// for kid `shared`, and only when the registry has no entry of that name.
pub struct VerifierKeys {
    source: RegistrySource,
    shared_secret: Option<VerifyingKey>,
    cache: Mutex<KeyCache<Arc<PublicKeyRegistry>>>,
    http: reqwest::Client,
}

impl std::fmt::Debug for VerifierKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierKeys")
            .field("source", &self.source)
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl VerifierKeys {
    /// Key set with a registry source and cache TTL.
    #[must_use]
    pub fn new(source: RegistrySource, cache_ttl: Duration) -> Self {
        Self::with_cache(source, KeyCache::new(cache_ttl))
    }

    /// Key set with a caller-supplied cache.
    #[must_use]
    pub fn with_cache(source: RegistrySource, cache: KeyCache<Arc<PublicKeyRegistry>>) -> Self {
        Self {
            source,
            shared_secret: None,
            cache: Mutex::new(cache),
            http: reqwest::Client::new(),
        }
    }

    /// Key set around a fixed registry that never refreshes.
    #[must_use]
    pub fn from_registry(registry: PublicKeyRegistry) -> Self {
        let mut cache = KeyCache::new(Duration::MAX);
        cache.put(Arc::new(registry), Instant::now());
        Self::with_cache(RegistrySource::SharedOnly, cache)
    }

    /// Configure the shared HMAC secret (raw bytes).
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is empty.
    pub fn with_shared_secret(mut self, secret: &[u8]) -> sigchain_crypto::CryptoResult<Self> {
        let key = SigningKey::hmac_from_secret(secret)?;
        self.shared_secret = Some(key.verifying_key());
        Ok(self)
    }

    /// Use a specific HTTP client for URL sources.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Drop the cached registry.
    pub async fn invalidate(&self) {
        self.cache.lock().await.invalidate();
    }

    /// Look up `kid` as of `now`.
    pub async fn resolve_at(&self, kid: &str, now: Instant) -> Option<RegistryEntry> {
        let registry = self.registry_at(now).await;
        if let Some(entry) = registry.get(kid) {
            return Some(entry.clone());
        }
        if kid == SHARED_KID {
            return self.shared_secret.clone().map(|key| RegistryEntry {
                kid: SHARED_KID.to_string(),
                algorithm: Algorithm::HmacSha256,
                key,
            });
        }
        None
    }

    /// Look up `kid` now.
    pub async fn resolve(&self, kid: &str) -> Option<RegistryEntry> {
        self.resolve_at(kid, Instant::now()).await
    }

    async fn registry_at(&self, now: Instant) -> Arc<PublicKeyRegistry> {
        let mut cache = self.cache.lock().await;
        if let Some(registry) = cache.get(now) {
            return registry.clone();
        }
        match self.load().await {
            Ok(registry) => {
                info!(keys = registry.len(), "verification key registry refreshed");
                let registry = Arc::new(registry);
                cache.put(registry.clone(), now);
                registry
            },
            Err(message) => {
                warn!(error = %message, "verification key registry unavailable");
                cache.peek().cloned().unwrap_or_default()
            },
        }
    }

    async fn load(&self) -> Result<PublicKeyRegistry, String> {
        match &self.source {
            RegistrySource::SharedOnly => Ok(PublicKeyRegistry::new()),
            RegistrySource::Inline(json) => {
                PublicKeyRegistry::from_json(json).map_err(|e| e.to_string())
            },
            RegistrySource::File(path) => {
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| format!("{}: {e}", path.display()))?;
                PublicKeyRegistry::from_json(&text).map_err(|e| e.to_string())
            },
            RegistrySource::Url(url) => {
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| format!("{url}: {e}"))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(format!("{url}: HTTP {status}"));
                }
                let text = Zeroizing::new(response.text().await.map_err(|e| e.to_string())?);
                PublicKeyRegistry::from_json(&text).map_err(|e| e.to_string())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_json(kid: &str, key: &SigningKey) -> String {
        serde_json::json!({
            kid: {
                "algorithm": key.algorithm().as_str(),
                "public_key": key.verifying_key().to_text().unwrap(),
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn inline_registry_resolves() {
        let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
        let keys = VerifierKeys::new(
            RegistrySource::Inline(registry_json("issuer-1", &key)),
            Duration::from_secs(300),
        );
        let entry = keys.resolve("issuer-1").await.unwrap();
        assert_eq!(entry.algorithm, Algorithm::Ed25519);
        assert!(keys.resolve("issuer-2").await.is_none());
    }

    #[tokio::test]
    async fn shared_fallback_only_for_shared_kid() {
        let keys = VerifierKeys::new(RegistrySource::SharedOnly, Duration::from_secs(300))
            .with_shared_secret(b"shared-secret")
            .unwrap();
        let entry = keys.resolve(SHARED_KID).await.unwrap();
        assert_eq!(entry.algorithm, Algorithm::HmacSha256);
        assert!(keys.resolve("other").await.is_none());

        let no_secret = VerifierKeys::new(RegistrySource::SharedOnly, Duration::from_secs(300));
        assert!(no_secret.resolve(SHARED_KID).await.is_none());
    }

    #[tokio::test]
    async fn file_registry_served_stale_after_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let key = SigningKey::generate(Algorithm::HmacSha256).unwrap();
        std::fs::write(&path, registry_json("k", &key)).unwrap();

        let keys = VerifierKeys::new(RegistrySource::File(path.clone()), Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(keys.resolve_at("k", t0).await.is_some());

        std::fs::remove_file(&path).unwrap();
        assert!(keys.resolve_at("k", t0 + Duration::from_secs(120)).await.is_some());

        keys.invalidate().await;
        assert!(keys.resolve_at("k", t0 + Duration::from_secs(180)).await.is_none());
    }

    #[tokio::test]
    async fn refresh_picks_up_new_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let a = SigningKey::generate(Algorithm::Ed25519).unwrap();
        let b = SigningKey::generate(Algorithm::Ed25519).unwrap();
        std::fs::write(&path, registry_json("a", &a)).unwrap();

        let keys = VerifierKeys::new(RegistrySource::File(path.clone()), Duration::from_secs(60));
        let t0 = Instant::now();
        assert!(keys.resolve_at("b", t0).await.is_none());

        std::fs::write(&path, registry_json("b", &b)).unwrap();
        assert!(keys.resolve_at("b", t0 + Duration::from_secs(30)).await.is_none());
        assert!(keys.resolve_at("b", t0 + Duration::from_secs(60)).await.is_some());
    }

    #[tokio::test]
    async fn fixed_registry() {
        let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
        let mut registry = PublicKeyRegistry::new();
        registry.insert("fixed", key.verifying_key());
        let keys = VerifierKeys::from_registry(registry);
        assert!(keys.resolve("fixed").await.is_some());
    }
}
