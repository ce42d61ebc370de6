//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sigchain_audit::prelude::*;` to import all essential types.

// Errors
pub use crate::{AuditError, AuditResult};

// Recording
pub use crate::{AuditChainService, RecordedEvent};

// Verification
pub use crate::{ChainIssue, ChainVerificationResult, ChainVerifier};

// Digest chain
pub use crate::{compute_digest, event_digest};
