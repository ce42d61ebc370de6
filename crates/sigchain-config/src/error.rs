//! Errors raised while assembling a [`Config`](crate::Config).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Why the configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: io::Error,
    },

    /// A TOML layer did not parse, or the merged tree did not fit [`Config`](crate::Config).
    #[error("invalid TOML in {origin}: {source}")]
    Parse {
        /// File path, `embedded defaults`, or `merged config`.
        origin: String,
        /// Parser failure.
        #[source]
        source: toml::de::Error,
    },

    /// The config file exceeds the size cap.
    #[error("{} is {size} bytes, limit is {limit}", path.display())]
    TooLarge {
        /// Oversized file.
        path: PathBuf,
        /// Bytes read.
        size: usize,
        /// Cap in bytes.
        limit: u64,
    },

    /// A value is out of range or inconsistent with another field.
    #[error("{field}: {message}")]
    Invalid {
        /// Dotted field path, e.g. `kms.endpoint`.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A `SIGCHAIN_*` variable has an unusable value.
    #[error("{var}: {message}")]
    Env {
        /// Variable name.
        var: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
