//! Sigchain Test - shared test utilities.
//!
//! Mock KMS backends, deterministic key fixtures, and builders for signed
//! callback requests, used by sigchain crates as a dev-dependency.
//!
//! ```toml
//! [dev-dependencies]
//! sigchain-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use sigchain_test::{MockKmsClient, rsa_key};
//!
//! let kms = MockKmsClient::new().with_key("kms-1", rsa_key().clone());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
