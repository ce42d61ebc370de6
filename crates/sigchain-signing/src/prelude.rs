//! Prelude module - commonly used types for convenient import.
//!
//! Use `use sigchain_signing::prelude::*;` to import all essential types.

pub use crate::{SigningError, SigningResult};

pub use crate::{SignOutcome, SigningProvider};

pub use crate::{EnvFallbackProvider, KmsProvider, PrimaryProvider, ProviderChain};

pub use crate::{KeyResolver, KeySource, SigningKeyDescriptor};

pub use crate::build_provider_chain;
