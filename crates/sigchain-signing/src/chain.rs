//! Ordered provider chain.

use std::sync::Arc;

use async_trait::async_trait;
use sigchain_crypto::{Algorithm, Digest};
use tracing::{debug, warn};

use crate::error::SigningResult;
use crate::provider::{SignOutcome, SigningProvider};

/// Tries providers in order until one produces a signature.
///
/// A provider that fails or returns the unsigned marker is logged and the
/// next one is tried. If none signs, the chain returns the unsigned marker
/// for the configured kid. In strict mode the first provider error is
/// returned instead of being skipped.
pub struct ProviderChain {
    providers: Vec<Arc<dyn SigningProvider>>,
    kid: String,
    algorithm: Algorithm,
    strict: bool,
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("strict", &self.strict)
            .finish()
    }
}

impl ProviderChain {
    /// Empty chain; signs nothing until providers are added.
    #[must_use]
    pub fn new(kid: impl Into<String>, algorithm: Algorithm) -> Self {
        Self {
            providers: Vec::new(),
            kid: kid.into(),
            algorithm,
            strict: false,
        }
    }

    /// Append a provider.
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn SigningProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Return provider errors instead of falling through.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Number of providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the chain has no providers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in order.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[async_trait]
impl SigningProvider for ProviderChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn sign(&self, digest: &Digest) -> SigningResult<SignOutcome> {
        let mut unsigned = None;
        for provider in &self.providers {
            match provider.sign(digest).await {
                Ok(outcome) if outcome.is_signed() => return Ok(outcome),
                Ok(outcome) => {
                    debug!(provider = provider.name(), "provider had no key");
                    unsigned.get_or_insert(outcome);
                },
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "signing provider failed, falling back");
                },
            }
        }
        Ok(unsigned.unwrap_or_else(|| SignOutcome::unsigned(&self.kid, self.algorithm)))
    }
}
