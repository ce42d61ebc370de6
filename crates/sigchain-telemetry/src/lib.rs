//! Sigchain Telemetry - `tracing` subscriber setup for sigchain binaries.
//!
//! With the `config` feature, [`LogConfig::from_config`] reads the
//! `[logging]` section directly.
//!
//! # Example
//!
//! ```rust,no_run
//! use sigchain_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), sigchain_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Json)
//!     .with_directive("sigchain_verify=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("audit service starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_logging};
