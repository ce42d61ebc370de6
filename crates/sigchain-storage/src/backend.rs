//! Backend selection from `[storage]`.

use std::sync::Arc;

use sigchain_config::{StorageBackend, StorageSection};
use tracing::info;

use crate::error::{StorageError, StorageResult};
use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use crate::traits::{AuditEventStore, NonceStore};

/// Both stores, backed by the same backend instance.
#[derive(Clone)]
pub struct Stores {
    /// Audit event persistence.
    pub events: Arc<dyn AuditEventStore>,
    /// Nonce persistence.
    pub nonces: Arc<dyn NonceStore>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Open the configured backend.
///
/// # Errors
///
/// Returns [`StorageError::Connection`] if the `sqlite` backend has no
/// path or the database cannot be opened.
pub fn open_stores(section: &StorageSection) -> StorageResult<Stores> {
    match section.backend {
        StorageBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            info!("using in-memory storage");
            Ok(Stores {
                events: store.clone(),
                nonces: store,
            })
        },
        StorageBackend::Sqlite => {
            let path = section.path.as_ref().ok_or_else(|| {
                StorageError::Connection("storage.path is required for sqlite".to_string())
            })?;
            let store = Arc::new(SqliteStore::open(path)?);
            info!(path = %path.display(), "using sqlite storage");
            Ok(Stores {
                events: store.clone(),
                nonces: store,
            })
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::model::NewNonce;

    #[tokio::test]
    async fn sqlite_backend_shares_one_database() {
        let dir = tempfile::tempdir().unwrap();
        let section = StorageSection {
            backend: StorageBackend::Sqlite,
            path: Some(dir.path().join("sigchain.db")),
        };
        let stores = open_stores(&section).unwrap();
        assert!(stores.events.latest_audit_event().await.unwrap().is_none());

        let now = Utc::now();
        let claimed = stores
            .nonces
            .insert_nonce_if_absent(NewNonce {
                nonce: "n".into(),
                agent_id: None,
                created_at: now,
                expires_at: now + Duration::seconds(60),
            })
            .await
            .unwrap();
        assert!(claimed.is_some());
        assert!(stores.nonces.get_nonce("n").await.unwrap().is_some());
    }

    #[test]
    fn sqlite_without_path_is_rejected() {
        let section = StorageSection {
            backend: StorageBackend::Sqlite,
            path: None,
        };
        assert!(matches!(
            open_stores(&section),
            Err(StorageError::Connection(_))
        ));
        assert!(open_stores(&StorageSection::default()).is_ok());
    }
}
