//! Audit chain service: sign and append events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sigchain_crypto::{Digest, PublicKeyRegistry};
use sigchain_signing::SigningProvider;
use sigchain_storage::{AuditEventRow, AuditEventStore, NewAuditEvent, StorageError};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::chain::{ChainVerificationResult, ChainVerifier, compute_digest, event_digest};
use crate::error::{AuditError, AuditResult};

/// Appends retried after the store reports that the chain head moved.
pub const MAX_APPEND_ATTEMPTS: u32 = 3;

/// What [`AuditChainService::record_event`] persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    /// Event id.
    pub id: Uuid,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Base64 signature, `None` if unsigned.
    pub signature: Option<String>,
    /// Signer key id, `None` if unsigned.
    pub signer_kid: Option<String>,
    /// Hex digest of the previous event.
    pub prev_hash: Option<String>,
    /// Digest of this event (the next event's `prev_hash`).
    pub digest: Digest,
}

/// Records signed, chained audit events.
///
/// Appends from this service are serialized through an async mutex. The
/// store additionally rejects an append whose observed predecessor is no
/// longer the latest event, which covers writers in other processes; such
/// appends are rebuilt and retried up to [`MAX_APPEND_ATTEMPTS`] times.
pub struct AuditChainService {
    store: Arc<dyn AuditEventStore>,
    signer: Arc<dyn SigningProvider>,
    require_signed: bool,
    append_lock: Mutex<()>,
}

impl std::fmt::Debug for AuditChainService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditChainService")
            .field("signer", &self.signer.name())
            .field("require_signed", &self.require_signed)
            .finish_non_exhaustive()
    }
}

impl AuditChainService {
    /// Service that persists unsigned events when no signature is produced.
    #[must_use]
    pub fn new(store: Arc<dyn AuditEventStore>, signer: Arc<dyn SigningProvider>) -> Self {
        Self {
            store,
            signer,
            require_signed: false,
            append_lock: Mutex::new(()),
        }
    }

    /// Refuse to persist unsigned events.
    #[must_use]
    pub fn require_signed(mut self, require: bool) -> Self {
        self.require_signed = require;
        self
    }

    /// Whether unsigned events are refused.
    #[must_use]
    pub const fn requires_signed(&self) -> bool {
        self.require_signed
    }

    /// Sign and append an event.
    ///
    /// # Errors
    ///
    /// - [`AuditError::UnsignedRejected`] if no signature was produced and
    ///   signing is required; nothing is persisted.
    /// - [`AuditError::Signing`] if the signing provider fails.
    /// - [`AuditError::Storage`] if the append fails.
    /// - [`AuditError::AppendContention`] if the chain head kept moving.
    pub async fn record_event(
        &self,
        actor_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> AuditResult<RecordedEvent> {
        let _guard = self.append_lock.lock().await;

        for attempt in 1..=MAX_APPEND_ATTEMPTS {
            let latest = self.store.latest_audit_event().await?;
            let prev = latest.as_ref().map(event_digest).transpose()?;
            let digest = compute_digest(&payload, prev.as_ref());

            let outcome = self.signer.sign(&digest).await?;
            if !outcome.is_signed() {
                if self.require_signed {
                    warn!(event_type, "no signature produced, refusing unsigned audit event");
                    return Err(AuditError::UnsignedRejected {
                        event_type: event_type.to_string(),
                    });
                }
                warn!(event_type, kid = %outcome.kid, "persisting unsigned audit event");
            }

            let signer_kid = outcome.signature.as_ref().map(|_| outcome.kid.clone());
            let prev_hash = prev.map(|d| d.to_hex());
            let event = NewAuditEvent {
                actor_id: actor_id.to_string(),
                event_type: event_type.to_string(),
                payload: payload.clone(),
                signature: outcome.signature.clone(),
                signer_kid: signer_kid.clone(),
                prev_hash: prev_hash.clone(),
                predecessor_id: latest.as_ref().map(|e| e.id),
            };

            match self.store.insert_audit_event(event).await {
                Ok(inserted) => {
                    debug!(
                        event_id = %inserted.id,
                        event_type,
                        signed = outcome.is_signed(),
                        "audit event appended"
                    );
                    return Ok(RecordedEvent {
                        id: inserted.id,
                        created_at: inserted.created_at,
                        signature: outcome.signature,
                        signer_kid,
                        prev_hash,
                        digest,
                    });
                },
                Err(StorageError::ChainConflict { .. }) if attempt < MAX_APPEND_ATTEMPTS => {
                    debug!(attempt, event_type, "audit chain head moved, rebuilding append");
                },
                Err(StorageError::ChainConflict { .. }) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuditError::AppendContention {
            attempts: MAX_APPEND_ATTEMPTS,
        })
    }

    /// Fetch one event.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Storage`] on backend failure.
    pub async fn get_event(&self, id: Uuid) -> AuditResult<Option<AuditEventRow>> {
        Ok(self.store.get_audit_event(id).await?)
    }

    /// All events, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Storage`] on backend failure.
    pub async fn list_events(&self) -> AuditResult<Vec<AuditEventRow>> {
        Ok(self.store.list_audit_events().await?)
    }

    /// Walk the whole chain and check links and signatures.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Storage`] if the events cannot be listed.
    pub async fn verify_chain(
        &self,
        registry: &PublicKeyRegistry,
    ) -> AuditResult<ChainVerificationResult> {
        let events = self.store.list_audit_events().await?;
        Ok(ChainVerifier::new(registry)
            .require_signatures(self.require_signed)
            .verify(&events))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use sigchain_crypto::{Algorithm, SigningKey, encode_base64};
    use sigchain_signing::{EnvFallbackProvider, SignOutcome, SigningError, SigningResult};
    use sigchain_storage::{InsertedAuditEvent, MemoryStore, StorageResult};

    use super::*;

    struct NoKey;

    #[async_trait]
    impl SigningProvider for NoKey {
        fn name(&self) -> &'static str {
            "none"
        }

        async fn sign(&self, _digest: &Digest) -> SigningResult<SignOutcome> {
            Ok(SignOutcome::unsigned("audit-signer", Algorithm::HmacSha256))
        }
    }

    struct Broken;

    #[async_trait]
    impl SigningProvider for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn sign(&self, _digest: &Digest) -> SigningResult<SignOutcome> {
            Err(SigningError::Config("no".into()))
        }
    }

    fn ed25519_signer() -> Arc<EnvFallbackProvider> {
        let key = SigningKey::generate(Algorithm::Ed25519).unwrap();
        Arc::new(EnvFallbackProvider::from_base64_seed(&key.export().unwrap()).unwrap())
    }

    fn registry_for(signer: &EnvFallbackProvider) -> PublicKeyRegistry {
        let mut registry = PublicKeyRegistry::new();
        registry.insert(signer.kid(), signer.verifying_key());
        registry
    }

    #[tokio::test]
    async fn events_are_linked_and_signed() {
        let signer = ed25519_signer();
        let service = AuditChainService::new(Arc::new(MemoryStore::new()), signer.clone());

        let first = service.record_event("u1", "a", json!({"n": 1})).await.unwrap();
        let second = service.record_event("u1", "b", json!({"n": 2})).await.unwrap();

        assert!(first.prev_hash.is_none());
        assert_eq!(second.prev_hash.as_deref(), Some(first.digest.to_hex().as_str()));
        assert_eq!(first.signer_kid.as_deref(), Some(signer.kid()));

        let result = service.verify_chain(&registry_for(&signer)).await.unwrap();
        assert!(result.valid, "{:?}", result.issues);
        assert_eq!(result.events_checked, 2);
    }

    #[tokio::test]
    async fn unsigned_allowed_by_default() {
        let service = AuditChainService::new(Arc::new(MemoryStore::new()), Arc::new(NoKey));
        let recorded = service.record_event("u", "t", json!({})).await.unwrap();
        assert!(recorded.signature.is_none());
        assert!(recorded.signer_kid.is_none());
    }

    #[tokio::test]
    async fn unsigned_rejected_when_required() {
        let store = Arc::new(MemoryStore::new());
        let service = AuditChainService::new(store.clone(), Arc::new(NoKey)).require_signed(true);
        assert!(service.requires_signed());
        let err = service.record_event("u", "t", json!({})).await.unwrap_err();
        assert!(matches!(err, AuditError::UnsignedRejected { .. }));
        assert!(store.list_audit_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn signer_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        let service = AuditChainService::new(store.clone(), Arc::new(Broken));
        assert!(matches!(
            service.record_event("u", "t", json!({})).await,
            Err(AuditError::Signing(_))
        ));
        assert!(store.list_audit_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_form_one_chain() {
        let signer = ed25519_signer();
        let service = Arc::new(AuditChainService::new(
            Arc::new(MemoryStore::new()),
            signer.clone(),
        ));

        let mut handles = Vec::new();
        for n in 0..16 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.record_event("u", "t", json!({ "n": n })).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let result = service.verify_chain(&registry_for(&signer)).await.unwrap();
        assert!(result.valid, "{:?}", result.issues);
        assert_eq!(result.events_checked, 16);
    }

    /// Store whose head moves under the writer a fixed number of times.
    struct Contended {
        inner: MemoryStore,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl AuditEventStore for Contended {
        async fn latest_audit_event(&self) -> StorageResult<Option<AuditEventRow>> {
            self.inner.latest_audit_event().await
        }

        async fn insert_audit_event(
            &self,
            event: NewAuditEvent,
        ) -> StorageResult<InsertedAuditEvent> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                return Err(StorageError::ChainConflict {
                    expected: None,
                    actual: None,
                });
            }
            self.inner.insert_audit_event(event).await
        }

        async fn get_audit_event(&self, id: Uuid) -> StorageResult<Option<AuditEventRow>> {
            self.inner.get_audit_event(id).await
        }

        async fn list_audit_events(&self) -> StorageResult<Vec<AuditEventRow>> {
            self.inner.list_audit_events().await
        }
    }

    #[tokio::test]
    async fn conflicts_are_retried_then_give_up() {
        let store = Arc::new(Contended {
            inner: MemoryStore::new(),
            conflicts: AtomicU32::new(2),
        });
        let service = AuditChainService::new(store.clone(), Arc::new(NoKey));
        service.record_event("u", "t", json!({})).await.unwrap();

        store.conflicts.store(MAX_APPEND_ATTEMPTS, Ordering::SeqCst);
        assert!(matches!(
            service.record_event("u", "t", json!({})).await,
            Err(AuditError::AppendContention { attempts: MAX_APPEND_ATTEMPTS })
        ));
    }

    #[tokio::test]
    async fn tampering_found_by_verify_chain() {
        let signer = ed25519_signer();
        let store = Arc::new(MemoryStore::new());
        let service = AuditChainService::new(store.clone(), signer.clone());
        let mut ids = Vec::new();
        for n in 1..=3 {
            ids.push(service.record_event("u", "t", json!({ "n": n })).await.unwrap().id);
        }
        store.overwrite_payload(ids[1], json!({"n": 99})).unwrap();

        let result = service.verify_chain(&registry_for(&signer)).await.unwrap();
        assert_eq!(result.first_broken_index, Some(1));
        assert_eq!(result.first_issue().unwrap().event_id(), ids[1]);
    }

    #[test]
    fn recorded_event_serializes_digest_as_hex() {
        let digest = Digest::sha256(b"x");
        let event = RecordedEvent {
            id: Uuid::nil(),
            created_at: Utc::now(),
            signature: Some(encode_base64(b"sig")),
            signer_kid: Some("k".into()),
            prev_hash: None,
            digest,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["digest"], digest.to_hex());
    }
}
