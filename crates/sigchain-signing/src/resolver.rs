//! Ordered key resolution with per-source caching.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use sigchain_crypto::{Algorithm, KeyCache, SigningKey};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{SigningError, SigningResult};
use crate::source::KeySource;

/// Resolved key material.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    /// Private key held in process.
    Local(Arc<SigningKey>),
    /// Key held by the KMS; signing must be delegated.
    Kms {
        /// KMS key identifier.
        key_id: String,
    },
}

/// What the resolver found: who signs, with which algorithm, and with what.
///
/// `material` is `None` when no source produced a key; signing with such a
/// descriptor yields the unsigned marker.
#[derive(Debug, Clone)]
pub struct SigningKeyDescriptor {
    /// Key id recorded on signed events.
    pub kid: String,
    /// Signature algorithm.
    pub algorithm: Algorithm,
    /// Key material, if any source was available.
    pub material: Option<KeyMaterial>,
}

impl SigningKeyDescriptor {
    /// Descriptor for "nothing available".
    #[must_use]
    pub fn unavailable(kid: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            kid: kid.into(),
            algorithm,
            material: None,
        }
    }

    /// Whether signing must go to the KMS.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self.material, Some(KeyMaterial::Kms { .. }))
    }

    /// The local key, if resolved in process.
    #[must_use]
    pub fn local_key(&self) -> Option<&SigningKey> {
        match &self.material {
            Some(KeyMaterial::Local(key)) => Some(key),
            _ => None,
        }
    }
}

/// JSON document a key URL may serve instead of bare key text.
#[derive(Deserialize)]
struct UrlKeyDocument {
    kid: Option<String>,
    algorithm: Option<Algorithm>,
    key: String,
}

struct SourceSlot {
    source: KeySource,
    cache: Mutex<KeyCache<SigningKeyDescriptor>>,
}

/// Tries key sources in order; the first that yields material wins.
///
/// Each source has its own [`KeyCache`]. A source that is configured but
/// temporarily unavailable (missing file, unreachable URL) is skipped with a
/// warning. Material that is present but malformed is an error.
pub struct KeyResolver {
    algorithm: Algorithm,
    kid: String,
    slots: Vec<SourceSlot>,
    http: reqwest::Client,
}

impl std::fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResolver")
            .field("algorithm", &self.algorithm)
            .field("kid", &self.kid)
            .field(
                "sources",
                &self.slots.iter().map(|s| s.source.label()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl KeyResolver {
    /// Resolver with one fresh cache of `cache_ttl` per source.
    #[must_use]
    pub fn new(
        algorithm: Algorithm,
        kid: impl Into<String>,
        sources: Vec<KeySource>,
        cache_ttl: Duration,
    ) -> Self {
        Self::with_caches(
            algorithm,
            kid,
            sources
                .into_iter()
                .map(|s| (s, KeyCache::new(cache_ttl)))
                .collect(),
        )
    }

    /// Resolver with caller-supplied caches, one per source.
    #[must_use]
    pub fn with_caches(
        algorithm: Algorithm,
        kid: impl Into<String>,
        sources: Vec<(KeySource, KeyCache<SigningKeyDescriptor>)>,
    ) -> Self {
        Self {
            algorithm,
            kid: kid.into(),
            slots: sources
                .into_iter()
                .map(|(source, cache)| SourceSlot {
                    source,
                    cache: Mutex::new(cache),
                })
                .collect(),
            http: reqwest::Client::new(),
        }
    }

    /// Use a specific HTTP client for URL sources.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Configured algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Configured key id.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The sources, in resolution order.
    pub fn sources(&self) -> impl Iterator<Item = &KeySource> {
        self.slots.iter().map(|s| &s.source)
    }

    /// Drop every cached descriptor.
    pub async fn invalidate(&self) {
        for slot in &self.slots {
            slot.cache.lock().await.invalidate();
        }
    }

    /// Resolve using the current time.
    ///
    /// # Errors
    ///
    /// See [`resolve_at`](Self::resolve_at).
    pub async fn resolve(&self) -> SigningResult<SigningKeyDescriptor> {
        self.resolve_at(Instant::now()).await
    }

    /// Resolve as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if a source holds malformed key material.
    pub async fn resolve_at(&self, now: Instant) -> SigningResult<SigningKeyDescriptor> {
        for slot in &self.slots {
            let mut cache = slot.cache.lock().await;
            if let Some(hit) = cache.get(now) {
                return Ok(hit.clone());
            }

            let label = slot.source.label();
            if let Some(descriptor) = self.load(&slot.source).await? {
                info!(
                    source = label,
                    kid = %descriptor.kid,
                    algorithm = %descriptor.algorithm,
                    "signing key resolved"
                );
                cache.put(descriptor.clone(), now);
                return Ok(descriptor);
            }
            debug!(source = label, "key source unavailable, trying next");
        }

        debug!(kid = %self.kid, "no signing key source available");
        Ok(SigningKeyDescriptor::unavailable(&self.kid, self.algorithm))
    }

    fn local(&self, kid: String, algorithm: Algorithm, text: &str) -> SigningResult<SigningKeyDescriptor> {
        let key = SigningKey::parse(algorithm, text)?;
        Ok(SigningKeyDescriptor {
            kid,
            algorithm,
            material: Some(KeyMaterial::Local(Arc::new(key))),
        })
    }

    async fn load(&self, source: &KeySource) -> SigningResult<Option<SigningKeyDescriptor>> {
        match source {
            KeySource::Inline(text) => self
                .local(self.kid.clone(), self.algorithm, text)
                .map(Some),
            KeySource::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(text) => {
                    let text = Zeroizing::new(text);
                    self.local(self.kid.clone(), self.algorithm, &text).map(Some)
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "signing key file unreadable");
                    Ok(None)
                },
            },
            KeySource::Url(url) => {
                let Some(body) = self.fetch(url).await else {
                    return Ok(None);
                };
                self.parse_url_body(&body).map(Some)
            },
            KeySource::Kms { key_id } => Ok(Some(SigningKeyDescriptor {
                kid: self.kid.clone(),
                algorithm: self.algorithm,
                material: Some(KeyMaterial::Kms {
                    key_id: key_id.clone(),
                }),
            })),
        }
    }

    async fn fetch(&self, url: &str) -> Option<Zeroizing<String>> {
        let response = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url, error = %e, "signing key URL unreachable");
                return None;
            },
        };
        let status = response.status();
        if !status.is_success() {
            warn!(url, status = %status, "signing key URL returned an error");
            return None;
        }
        match response.text().await {
            Ok(body) => Some(Zeroizing::new(body)),
            Err(e) => {
                warn!(url, error = %e, "failed to read signing key response");
                None
            },
        }
    }

    fn parse_url_body(&self, body: &str) -> SigningResult<SigningKeyDescriptor> {
        let trimmed = body.trim();
        if !trimmed.starts_with('{') {
            return self.local(self.kid.clone(), self.algorithm, trimmed);
        }
        let doc: UrlKeyDocument =
            serde_json::from_str(trimmed).map_err(|e| SigningError::Source {
                kind: "url",
                message: format!("invalid key document: {e}"),
            })?;
        let key = Zeroizing::new(doc.key);
        self.local(
            doc.kid.unwrap_or_else(|| self.kid.clone()),
            doc.algorithm.unwrap_or(self.algorithm),
            &key,
        )
    }
}
