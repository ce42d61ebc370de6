use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::model::{AuditEventRow, InsertedAuditEvent, KernelNonce, NewAuditEvent, NewNonce};

/// Append-only audit event persistence.
#[async_trait]
pub trait AuditEventStore: Send + Sync {
    /// The most recently appended event, if any.
    async fn latest_audit_event(&self) -> StorageResult<Option<AuditEventRow>>;

    /// Append an event.
    ///
    /// Fails with [`StorageError::ChainConflict`](crate::StorageError::ChainConflict)
    /// if the latest event is no longer `event.predecessor_id`.
    async fn insert_audit_event(&self, event: NewAuditEvent) -> StorageResult<InsertedAuditEvent>;

    /// Fetch one event by id.
    async fn get_audit_event(&self, id: Uuid) -> StorageResult<Option<AuditEventRow>>;

    /// All events in chain order (oldest first).
    async fn list_audit_events(&self) -> StorageResult<Vec<AuditEventRow>>;
}

/// Replay-protection nonce persistence.
///
/// Every method is a single atomic step against the backing store.
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Insert `nonce` unless a row for it already exists.
    ///
    /// Returns the inserted row, or `None` on conflict.
    async fn insert_nonce_if_absent(&self, nonce: NewNonce) -> StorageResult<Option<KernelNonce>>;

    /// Fetch a nonce row.
    async fn get_nonce(&self, nonce: &str) -> StorageResult<Option<KernelNonce>>;

    /// Turn an expired, unconsumed row back into a fresh claim.
    ///
    /// Only succeeds while `consumed_at IS NULL AND expires_at <= now`;
    /// returns the refreshed row, or `None` if the condition did not hold.
    async fn refresh_expired_nonce(
        &self,
        nonce: NewNonce,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<KernelNonce>>;

    /// Mark a nonce consumed if nobody has yet.
    ///
    /// Returns the updated row, or `None` if it was already consumed or
    /// does not exist.
    async fn consume_nonce_if_unconsumed(
        &self,
        nonce: &str,
        consumed_by: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<KernelNonce>>;
}
