//! Sigchain Signing - resolve a signing key and produce digest signatures.
//!
//! The pieces fit together as follows:
//!
//! - [`KeySource`]s describe where key material may come from (inline text,
//!   a file, a URL, or a KMS key reference).
//! - [`KeyResolver`] tries the sources in order, caching each one with a
//!   [`KeyCache`](sigchain_crypto::KeyCache), and yields a
//!   [`SigningKeyDescriptor`].
//! - [`SigningProvider`] turns a digest into a [`SignOutcome`]. The
//!   [`PrimaryProvider`] signs with the resolved key, [`KmsProvider`]
//!   delegates to a KMS, and [`EnvFallbackProvider`] is the last-resort
//!   local Ed25519 key.
//! - [`ProviderChain`] tries providers in order and returns the unsigned
//!   marker if none of them signs.
//!
//! [`build_provider_chain`] wires all of it from a [`sigchain_config::Config`].

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod chain;
mod error;
mod factory;
mod provider;
mod resolver;
mod source;

pub use chain::ProviderChain;
pub use error::{SigningError, SigningResult};
pub use factory::{algorithm_from_config, build_kms_client, build_provider_chain, build_provider_chain_with};
pub use provider::{EnvFallbackProvider, KmsProvider, PrimaryProvider, SignOutcome, SigningProvider};
pub use resolver::{KeyMaterial, KeyResolver, SigningKeyDescriptor};
pub use source::{KeySource, key_sources};
