//! Storage error types.

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Another append landed between the writer's read and its insert.
    #[error("chain conflict: expected latest {expected:?}, found {actual:?}")]
    ChainConflict {
        /// Latest event id the writer observed.
        expected: Option<String>,
        /// Latest event id at insert time.
        actual: Option<String>,
    },

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Internal(String),

    /// Opening the database failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A query failed.
    #[error("query failed: {0}")]
    Query(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Query(e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
