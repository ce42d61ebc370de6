//! Layered loading.
//!
//! 1. Parse `defaults.toml` → base
//! 2. Merge the explicit config file, if any
//! 3. Apply `SIGCHAIN_*` environment overrides
//! 4. Deserialize merged tree → `Config`
//! 5. Validate

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info};

use crate::env::apply_env_overrides;
use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load the configuration.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, an
/// environment variable is malformed, or the result fails validation.
pub fn load<S: std::hash::BuildHasher>(
    file: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::Parse {
            origin: "embedded defaults".to_owned(),
            source: e,
        })?;

    if let Some(path) = file {
        let overlay = read_file(path)?;
        deep_merge(&mut merged, &overlay);
        info!(path = %path.display(), "loaded config file");
    }

    let env_count = apply_env_overrides(&mut merged, env_vars)?;
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable overrides");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                origin: "merged config".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Read and parse a TOML file, enforcing the size limit.
fn read_file(path: &Path) -> ConfigResult<toml::Value> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    // Measured after the read so a file swapped in between is still caught.
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge {
            path: path.to_path_buf(),
            size: content.len(),
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        origin: path.display().to_string(),
        source: e,
    })
}

/// Recursively deep-merge `overlay` into `base`.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}
