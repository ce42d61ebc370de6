//! SQLite backend.
//!
//! One connection guarded by a mutex; every call runs on the blocking pool.
//! Timestamps are stored as unix milliseconds so expiry checks are plain
//! integer comparisons inside the conditional `UPDATE`s.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::model::{AuditEventRow, InsertedAuditEvent, KernelNonce, NewAuditEvent, NewNonce};
use crate::traits::{AuditEventStore, NonceStore};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS audit_events (
        seq         INTEGER PRIMARY KEY AUTOINCREMENT,
        id          TEXT NOT NULL UNIQUE,
        actor_id    TEXT NOT NULL,
        event_type  TEXT NOT NULL,
        payload     TEXT NOT NULL,
        signature   TEXT,
        signer_kid  TEXT,
        prev_hash   TEXT,
        created_at  INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS kernel_nonces (
        nonce        TEXT PRIMARY KEY NOT NULL,
        agent_id     TEXT,
        created_at   INTEGER NOT NULL,
        expires_at   INTEGER NOT NULL,
        consumed_at  INTEGER,
        consumed_by  TEXT
    );
";

const AUDIT_COLUMNS: &str =
    "id, actor_id, event_type, payload, signature, signer_kid, prev_hash, created_at";

const NONCE_COLUMNS: &str =
    "nonce, agent_id, created_at, expires_at, consumed_at, consumed_by";

/// SQLite-backed store for audit events and nonces.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a database at `path` and ensure the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the database cannot be opened
    /// or the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StorageError::Connection(format!("failed to open database: {e}")))?;
        debug!(path = %path.display(), "opened sqlite store");
        Self::init(conn)
    }

    /// Create an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the schema cannot be created.
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(format!("failed to open database: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StorageError::Connection(format!("failed to create tables: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StorageError::Internal(format!("lock poisoned: {e}")))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Internal(format!("blocking task failed: {e}")))?
    }

    /// Replace the payload of a stored event in place.
    ///
    /// Audit events are immutable through [`AuditEventStore`]; this exists
    /// to simulate out-of-band tampering when exercising chain verification.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no event has that id.
    pub async fn overwrite_payload(
        &self,
        id: Uuid,
        payload: serde_json::Value,
    ) -> StorageResult<()> {
        let text = serde_json::to_string(&payload)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE audit_events SET payload = ?1 WHERE id = ?2",
                params![text, id.to_string()],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(id.to_string()));
            }
            Ok(())
        })
        .await
    }
}

fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

fn from_millis(ms: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::Serialization(format!("timestamp out of range: {ms}")))
}

/// Column values as SQLite hands them back, before typed conversion.
struct RawAuditRow {
    id: String,
    actor_id: String,
    event_type: String,
    payload: String,
    signature: Option<String>,
    signer_kid: Option<String>,
    prev_hash: Option<String>,
    created_at: i64,
}

impl RawAuditRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            actor_id: row.get(1)?,
            event_type: row.get(2)?,
            payload: row.get(3)?,
            signature: row.get(4)?,
            signer_kid: row.get(5)?,
            prev_hash: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_event(self) -> StorageResult<AuditEventRow> {
        Ok(AuditEventRow {
            id: Uuid::parse_str(&self.id)
                .map_err(|e| StorageError::Serialization(format!("bad event id: {e}")))?,
            actor_id: self.actor_id,
            event_type: self.event_type,
            payload: serde_json::from_str(&self.payload)
                .map_err(|e| StorageError::Serialization(format!("bad payload: {e}")))?,
            signature: self.signature,
            signer_kid: self.signer_kid,
            prev_hash: self.prev_hash,
            created_at: from_millis(self.created_at)?,
        })
    }
}

struct RawNonceRow {
    nonce: String,
    agent_id: Option<String>,
    created_at: i64,
    expires_at: i64,
    consumed_at: Option<i64>,
    consumed_by: Option<String>,
}

impl RawNonceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            nonce: row.get(0)?,
            agent_id: row.get(1)?,
            created_at: row.get(2)?,
            expires_at: row.get(3)?,
            consumed_at: row.get(4)?,
            consumed_by: row.get(5)?,
        })
    }

    fn into_nonce(self) -> StorageResult<KernelNonce> {
        Ok(KernelNonce {
            nonce: self.nonce,
            agent_id: self.agent_id,
            created_at: from_millis(self.created_at)?,
            expires_at: from_millis(self.expires_at)?,
            consumed_at: self.consumed_at.map(from_millis).transpose()?,
            consumed_by: self.consumed_by,
        })
    }
}

fn latest_row(conn: &Connection) -> StorageResult<Option<AuditEventRow>> {
    conn.query_row(
        &format!("SELECT {AUDIT_COLUMNS} FROM audit_events ORDER BY seq DESC LIMIT 1"),
        [],
        RawAuditRow::from_row,
    )
    .optional()?
    .map(RawAuditRow::into_event)
    .transpose()
}

#[async_trait]
impl AuditEventStore for SqliteStore {
    async fn latest_audit_event(&self) -> StorageResult<Option<AuditEventRow>> {
        self.with_conn(|conn| latest_row(conn)).await
    }

    async fn insert_audit_event(&self, event: NewAuditEvent) -> StorageResult<InsertedAuditEvent> {
        let payload = serde_json::to_string(&event.payload)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.with_conn(move |conn| {
            // IMMEDIATE takes the write lock up front, so the latest-row
            // check and the insert cannot interleave with another writer.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let latest = latest_row(&tx)?;
            let actual = latest.as_ref().map(|e| e.id);
            if actual != event.predecessor_id {
                return Err(StorageError::ChainConflict {
                    expected: event.predecessor_id.map(|id| id.to_string()),
                    actual: actual.map(|id| id.to_string()),
                });
            }

            let now = Utc::now();
            let created_at = latest.map_or(now, |e| e.created_at.max(now));
            let id = Uuid::new_v4();

            tx.execute(
                &format!("INSERT INTO audit_events ({AUDIT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                params![
                    id.to_string(),
                    event.actor_id,
                    event.event_type,
                    payload,
                    event.signature,
                    event.signer_kid,
                    event.prev_hash,
                    to_millis(created_at),
                ],
            )?;
            tx.commit()?;

            Ok(InsertedAuditEvent { id, created_at })
        })
        .await
    }

    async fn get_audit_event(&self, id: Uuid) -> StorageResult<Option<AuditEventRow>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {AUDIT_COLUMNS} FROM audit_events WHERE id = ?1"),
                params![id.to_string()],
                RawAuditRow::from_row,
            )
            .optional()?
            .map(RawAuditRow::into_event)
            .transpose()
        })
        .await
    }

    async fn list_audit_events(&self) -> StorageResult<Vec<AuditEventRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_events ORDER BY created_at ASC, seq ASC"
            ))?;
            let raw = stmt
                .query_map([], RawAuditRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raw.into_iter().map(RawAuditRow::into_event).collect()
        })
        .await
    }
}

#[async_trait]
impl NonceStore for SqliteStore {
    async fn insert_nonce_if_absent(&self, nonce: NewNonce) -> StorageResult<Option<KernelNonce>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO kernel_nonces (nonce, agent_id, created_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(nonce) DO NOTHING
                     RETURNING {NONCE_COLUMNS}"
                ),
                params![
                    nonce.nonce,
                    nonce.agent_id,
                    to_millis(nonce.created_at),
                    to_millis(nonce.expires_at),
                ],
                RawNonceRow::from_row,
            )
            .optional()?
            .map(RawNonceRow::into_nonce)
            .transpose()
        })
        .await
    }

    async fn get_nonce(&self, nonce: &str) -> StorageResult<Option<KernelNonce>> {
        let nonce = nonce.to_owned();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {NONCE_COLUMNS} FROM kernel_nonces WHERE nonce = ?1"),
                params![nonce],
                RawNonceRow::from_row,
            )
            .optional()?
            .map(RawNonceRow::into_nonce)
            .transpose()
        })
        .await
    }

    async fn refresh_expired_nonce(
        &self,
        nonce: NewNonce,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<KernelNonce>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE kernel_nonces
                     SET agent_id = ?2, created_at = ?3, expires_at = ?4,
                         consumed_at = NULL, consumed_by = NULL
                     WHERE nonce = ?1 AND consumed_at IS NULL AND expires_at <= ?5
                     RETURNING {NONCE_COLUMNS}"
                ),
                params![
                    nonce.nonce,
                    nonce.agent_id,
                    to_millis(nonce.created_at),
                    to_millis(nonce.expires_at),
                    to_millis(now),
                ],
                RawNonceRow::from_row,
            )
            .optional()?
            .map(RawNonceRow::into_nonce)
            .transpose()
        })
        .await
    }

    async fn consume_nonce_if_unconsumed(
        &self,
        nonce: &str,
        consumed_by: &str,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<KernelNonce>> {
        let nonce = nonce.to_owned();
        let consumed_by = consumed_by.to_owned();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE kernel_nonces SET consumed_at = ?2, consumed_by = ?3
                     WHERE nonce = ?1 AND consumed_at IS NULL
                     RETURNING {NONCE_COLUMNS}"
                ),
                params![nonce, to_millis(now), consumed_by],
                RawNonceRow::from_row,
            )
            .optional()?
            .map(RawNonceRow::into_nonce)
            .transpose()
        })
        .await
    }
}
