//! In-memory backend.
//!
//! Both tables live behind one mutex, so each trait method is atomic with
//! respect to every other call on the same store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::model::{AuditEventRow, InsertedAuditEvent, KernelNonce, NewAuditEvent, NewNonce};
use crate::traits::{AuditEventStore, NonceStore};

#[derive(Debug, Default)]
struct Inner {
    events: Vec<AuditEventRow>,
    nonces: HashMap<String, KernelNonce>,
}

/// In-memory store for tests and single-process use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StorageError::Internal(format!("lock poisoned: {e}")))
    }

    /// Replace the payload of a stored event in place.
    ///
    /// Audit events are immutable through [`AuditEventStore`]; this exists
    /// to simulate out-of-band tampering when exercising chain verification.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no event has that id.
    pub fn overwrite_payload(&self, id: Uuid, payload: serde_json::Value) -> StorageResult<()> {
        let mut inner = self.lock()?;
        let row = inner
            .events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        row.payload = payload;
        Ok(())
    }
}

#[async_trait]
impl AuditEventStore for MemoryStore {
    async fn latest_audit_event(&self) -> StorageResult<Option<AuditEventRow>> {
        Ok(self.lock()?.events.last().cloned())
    }

    async fn insert_audit_event(&self, event: NewAuditEvent) -> StorageResult<InsertedAuditEvent> {
        let mut inner = self.lock()?;

        let latest = inner.events.last();
        let actual = latest.map(|e| e.id);
        if actual != event.predecessor_id {
            return Err(StorageError::ChainConflict {
                expected: event.predecessor_id.map(|id| id.to_string()),
                actual: actual.map(|id| id.to_string()),
            });
        }

        let now = Utc::now();
        let created_at = latest.map_or(now, |e| e.created_at.max(now));
        let id = Uuid::new_v4();

        inner.events.push(AuditEventRow {
            id,
            actor_id: event.actor_id,
            event_type: event.event_type,
            payload: event.payload,
            signature: event.signature,
            signer_kid: event.signer_kid,
            prev_hash: event.prev_hash,
            created_at,
        });

        Ok(InsertedAuditEvent { id, created_at })
    }

    async fn get_audit_event(&self, id: Uuid) -> StorageResult<Option<AuditEventRow>> {
        Ok(self.lock()?.events.iter().find(|e| e.id == id).cloned())
    }

    async fn list_audit_events(&self) -> StorageResult<Vec<AuditEventRow>> {
        Ok(self.lock()?.events.clone())
    }
}

#[async_trait]
impl NonceStore for MemoryStore {
    async fn insert_nonce_if_absent(&self, nonce: NewNonce) -> StorageResult<Option<KernelNonce>> {
        let mut inner = self.lock()?;
        if inner.nonces.contains_key(&nonce.nonce) {
            return Ok(None);
        }
        let row = nonce.into_row();
        inner.nonces.insert(row.nonce.clone(), row.clone());
        Ok(Some(row))
    }

    async fn get_nonce(&self, nonce: &str) -> StorageResult<Option<KernelNonce>> {
        Ok(self.lock()?.nonces.get(nonce).cloned())
    }

    async fn refresh_expired_nonce(
        &self,
        nonce: NewNonce,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<KernelNonce>> {
        let mut inner = self.lock()?;
        match inner.nonces.get_mut(&nonce.nonce) {
            Some(row) if row.is_expired_unconsumed(now) => {
                *row = nonce.into_row();
                Ok(Some(row.clone()))
            },
            _ => Ok(None),
        }
    }

    async fn consume_nonce_if_unconsumed(
        &self,
        nonce: &str,
        consumed_by: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<KernelNonce>> {
        let mut inner = self.lock()?;
        match inner.nonces.get_mut(nonce) {
            Some(row) if row.consumed_at.is_none() => {
                row.consumed_at = Some(now);
                row.consumed_by = Some(consumed_by.to_owned());
                Ok(Some(row.clone()))
            },
            _ => Ok(None),
        }
    }
}
