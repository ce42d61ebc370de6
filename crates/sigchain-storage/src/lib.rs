//! Sigchain Storage - persistence for audit events and replay nonces.
//!
//! Two tables are needed, and they are exposed as two async traits:
//!
//! - [`AuditEventStore`]: append-only audit events with latest-event lookup.
//!   Appends carry the id of the row the writer saw as latest; a store
//!   rejects the append with [`StorageError::ChainConflict`] if another
//!   writer got there first.
//! - [`NonceStore`]: single-use nonces with insert-if-absent and conditional
//!   refresh / consume updates. Those conditional updates are the only
//!   concurrency guard for nonce claiming, so every backend performs each of
//!   them atomically.
//!
//! # Backends
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`MemoryStore`] | tests, single-process deployments |
//! | [`SqliteStore`] | durable storage, offline chain audits |
//!
//! With the `config` feature, `open_stores` picks the backend from the
//! `[storage]` configuration section.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod memory;
pub mod model;
pub mod sqlite;

#[cfg(feature = "config")]
mod backend;

mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use model::{AuditEventRow, InsertedAuditEvent, KernelNonce, NewAuditEvent, NewNonce};
pub use sqlite::SqliteStore;
pub use traits::{AuditEventStore, NonceStore};

#[cfg(feature = "config")]
pub use backend::{Stores, open_stores};
