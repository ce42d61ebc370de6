//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sigchain_verify::prelude::*;` to import all essential types.

// Errors
pub use crate::{ManifestError, ManifestResult, RejectReason, VerifyError, VerifyResult};

// Inbound callbacks
pub use crate::{CallbackRequest, HeaderSource, InboundVerifier, VerifiedContext, VerifierSettings};

// Keys
pub use crate::{RegistrySource, VerifierKeys};

// Manifests
pub use crate::{ManifestVerifier, SignedManifest};
