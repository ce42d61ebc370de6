//! Inbound callback verification.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;
use sigchain_audit::AuditChainService;
use sigchain_config::{RegistrySourceKind, VerifySection};
use sigchain_crypto::{Algorithm, decode_base64};
use sigchain_storage::NonceStore;
use tracing::{debug, warn};

use crate::error::{RejectReason, VerifyError, VerifyResult};
use crate::headers::{HeaderSource, SignatureHeader};
use crate::keys::{RegistrySource, VerifierKeys};
use crate::nonce::NonceGuard;

/// Event type recorded for each accepted callback when an audit chain is
/// attached.
pub const CALLBACK_VERIFIED_EVENT: &str = "callback.verified";

/// Header names and time windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierSettings {
    /// Signature header name.
    pub signature_header: String,
    /// Unix-seconds timestamp header name.
    pub timestamp_header: String,
    /// Nonce header name.
    pub nonce_header: String,
    /// Optional agent id header name.
    pub agent_header: String,
    /// Maximum `|now - timestamp|`, inclusive.
    pub allowed_skew: Duration,
    /// Lifetime of a nonce claim.
    pub nonce_ttl: Duration,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self::from_config(&VerifySection::default())
    }
}

impl VerifierSettings {
    /// Settings from `[verify]`.
    #[must_use]
    pub fn from_config(section: &VerifySection) -> Self {
        Self {
            signature_header: section.signature_header.clone(),
            timestamp_header: section.timestamp_header.clone(),
            nonce_header: section.nonce_header.clone(),
            agent_header: section.agent_header.clone(),
            allowed_skew: seconds(section.allowed_skew_secs),
            nonce_ttl: seconds(section.nonce_ttl_secs),
        }
    }
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// What an accepted request carries forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedContext {
    /// Key id that signed the request.
    pub kid: String,
    /// Algorithm of the verified signature.
    pub algorithm: Algorithm,
    /// Timestamp from the request.
    pub timestamp: DateTime<Utc>,
    /// Nonce from the request (now consumed).
    pub nonce: String,
    /// Agent id header, when present.
    pub agent_id: Option<String>,
}

/// Verifies signed inbound callbacks.
///
/// Per request: headers, timestamp skew, nonce claim, signature header
/// parse, key lookup, signature check over the raw body, nonce consume.
/// Any failing step rejects with a [`RejectReason`].
pub struct InboundVerifier {
    settings: VerifierSettings,
    nonces: NonceGuard,
    keys: Arc<VerifierKeys>,
    audit: Option<Arc<AuditChainService>>,
}

impl std::fmt::Debug for InboundVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundVerifier")
            .field("settings", &self.settings)
            .field("keys", &self.keys)
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl InboundVerifier {
    /// New verifier.
    #[must_use]
    pub fn new(
        settings: VerifierSettings,
        nonce_store: Arc<dyn NonceStore>,
        keys: Arc<VerifierKeys>,
    ) -> Self {
        let nonces = NonceGuard::new(nonce_store, settings.nonce_ttl);
        Self {
            settings,
            nonces,
            keys,
            audit: None,
        }
    }

    /// Build from `[verify]`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Config`] if the registry source named by
    /// `registry_source` has no location, or the shared secret is empty.
    pub fn from_config(
        section: &VerifySection,
        nonce_store: Arc<dyn NonceStore>,
    ) -> VerifyResult<Self> {
        let source = registry_source(section)?;
        let mut keys =
            VerifierKeys::new(source, StdDuration::from_secs(section.key_cache_ttl_secs));
        if let Some(secret) = section.shared_secret.as_deref().filter(|s| !s.is_empty()) {
            let secret = decode_base64(secret)
                .map_err(|e| VerifyError::Config(format!("verify.shared_secret: {e}")))?;
            keys = keys
                .with_shared_secret(&secret)
                .map_err(|e| VerifyError::Config(e.to_string()))?;
        }
        Ok(Self::new(
            VerifierSettings::from_config(section),
            nonce_store,
            Arc::new(keys),
        ))
    }

    /// Record each accepted callback on `audit`, best-effort.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<AuditChainService>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Settings in use.
    #[must_use]
    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    /// Verify a request now.
    ///
    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub async fn verify<H: HeaderSource + ?Sized>(
        &self,
        headers: &H,
        body: &[u8],
    ) -> VerifyResult<VerifiedContext> {
        self.verify_at(headers, body, Utc::now()).await
    }

    /// Verify a request as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::Rejected`] with the reason for any failed
    /// check, or [`VerifyError::Storage`] if the nonce store fails.
    pub async fn verify_at<H: HeaderSource + ?Sized>(
        &self,
        headers: &H,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> VerifyResult<VerifiedContext> {
        let result = self.check(headers, body, now).await;
        if let Err(e) = &result {
            warn!(reason = %e, "inbound request rejected");
        }
        let context = result?;

        if let Some(audit) = &self.audit {
            let actor = context.agent_id.as_deref().unwrap_or(&context.kid);
            let payload = serde_json::json!({
                "kid": context.kid,
                "algorithm": context.algorithm,
                "nonce": context.nonce,
                "timestamp": context.timestamp.timestamp(),
            });
            if let Err(e) = audit.record_event(actor, CALLBACK_VERIFIED_EVENT, payload).await {
                warn!(error = %e, "failed to audit verified callback");
            }
        }
        Ok(context)
    }

    async fn check<H: HeaderSource + ?Sized>(
        &self,
        headers: &H,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> VerifyResult<VerifiedContext> {
        let s = &self.settings;
        let non_empty = |name: &str| headers.header(name).map(str::trim).filter(|v| !v.is_empty());

        let (Some(signature), Some(timestamp), Some(nonce)) = (
            non_empty(&s.signature_header),
            non_empty(&s.timestamp_header),
            non_empty(&s.nonce_header),
        ) else {
            return Err(RejectReason::MissingHeaders.into());
        };
        let agent_id = non_empty(&s.agent_header);

        let timestamp = self.check_timestamp(timestamp, now)?;

        self.nonces.claim(nonce, agent_id, now).await?;

        let header = SignatureHeader::parse(signature)?;

        let Some(entry) = self.keys.resolve(&header.kid).await else {
            debug!(kid = %header.kid, "unknown key id");
            return Err(RejectReason::UnknownKeyId.into());
        };

        if header.algorithm.is_some_and(|alg| alg != entry.algorithm) {
            debug!(kid = %header.kid, "signature algorithm does not match key");
            return Err(RejectReason::InvalidSignature.into());
        }
        if entry.key.verify_message(body, &header.signature).is_err() {
            return Err(RejectReason::InvalidSignature.into());
        }

        let consumed_by = agent_id.unwrap_or(&header.kid);
        self.nonces.consume(nonce, consumed_by, now).await;

        debug!(kid = %header.kid, nonce, "inbound request verified");
        Ok(VerifiedContext {
            kid: header.kid,
            algorithm: entry.algorithm,
            timestamp,
            nonce: nonce.to_string(),
            agent_id: agent_id.map(str::to_string),
        })
    }

    fn check_timestamp(&self, value: &str, now: DateTime<Utc>) -> VerifyResult<DateTime<Utc>> {
        let secs: i64 = value.parse().map_err(|_| RejectReason::StaleTimestamp)?;
        let Some(timestamp) = Utc.timestamp_opt(secs, 0).single() else {
            return Err(RejectReason::StaleTimestamp.into());
        };
        // Header carries whole seconds, so compare at that resolution.
        let skew = now
            .timestamp()
            .checked_sub(secs)
            .map_or(u64::MAX, i64::unsigned_abs);
        let allowed = self.settings.allowed_skew.num_seconds().unsigned_abs();
        if skew > allowed {
            debug!(skew_secs = skew, "timestamp outside allowed skew");
            return Err(RejectReason::StaleTimestamp.into());
        }
        Ok(timestamp)
    }
}

fn registry_source(section: &VerifySection) -> VerifyResult<RegistrySource> {
    let missing = |field: &str| VerifyError::Config(format!("verify.{field} is not set"));
    Ok(match section.registry_source {
        RegistrySourceKind::Inline => RegistrySource::Inline(
            section
                .registry_inline
                .clone()
                .ok_or_else(|| missing("registry_inline"))?,
        ),
        RegistrySourceKind::File => RegistrySource::File(
            section
                .registry_file
                .clone()
                .ok_or_else(|| missing("registry_file"))?,
        ),
        RegistrySourceKind::Url => RegistrySource::Url(
            section
                .registry_url
                .clone()
                .ok_or_else(|| missing("registry_url"))?,
        ),
        RegistrySourceKind::Shared => RegistrySource::SharedOnly,
    })
}
