#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for sigchain.
//!
//! A single [`Config`] type covers signing, the remote KMS, inbound
//! verification, storage, and logging.
//!
//! # Usage
//!
//! ```rust,no_run
//! use sigchain_config::Config;
//!
//! let config = Config::load(Some(std::path::Path::new("sigchain.toml"))).unwrap();
//! println!("signing as {} ({})", config.signing.kid, config.signing.algorithm);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Environment variables** (`SIGCHAIN_*`)
//! 2. **Config file** passed explicitly to [`Config::load`]
//! 3. **Embedded defaults** (`defaults.toml` compiled into binary)
//!
//! # Design
//!
//! This crate has **no dependencies on other internal sigchain crates**.
//! Algorithm names and source kinds are mirrored here and converted to
//! domain types where the services are built.

/// Environment variable overrides.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file loading.
pub mod loader;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

// Re-export primary types at the crate root.
pub use error::{ConfigError, ConfigResult};
pub use types::*;

impl Config {
    /// Load configuration: embedded defaults, then `file`, then `SIGCHAIN_*`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is malformed or the final
    /// configuration fails validation.
    pub fn load(file: Option<&std::path::Path>) -> ConfigResult<Self> {
        loader::load(file, &env::collect_env_vars())
    }

    /// Load configuration with an explicit environment map.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_env<S: std::hash::BuildHasher>(
        file: Option<&std::path::Path>,
        env_vars: &std::collections::HashMap<String, String, S>,
    ) -> ConfigResult<Self> {
        loader::load(file, env_vars)
    }
}
