//! `SIGCHAIN_*` environment variable overrides.
//!
//! Environment variables take precedence over the config file. Values are
//! written into the merged TOML tree before deserialization, so they go
//! through the same type checks as file values.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// How a raw environment string is turned into a TOML value.
#[derive(Clone, Copy)]
enum ValueKind {
    Str,
    Int,
    Bool,
    /// Comma-separated list of strings.
    List,
}

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: ValueKind,
}

const fn mapping(var_name: &'static str, field_path: &'static str, kind: ValueKind) -> EnvMapping {
    EnvMapping {
        var_name,
        field_path,
        kind,
    }
}

/// All supported `SIGCHAIN_*` mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    // Signing.
    mapping("SIGCHAIN_SIGNING_SOURCES", "signing.sources", ValueKind::List),
    mapping("SIGCHAIN_SIGNING_ALGORITHM", "signing.algorithm", ValueKind::Str),
    mapping("SIGCHAIN_SIGNING_KID", "signing.kid", ValueKind::Str),
    mapping("SIGCHAIN_SIGNING_KEY", "signing.inline_key", ValueKind::Str),
    mapping("SIGCHAIN_SIGNING_KEY_FILE", "signing.key_file", ValueKind::Str),
    mapping("SIGCHAIN_SIGNING_KEY_URL", "signing.key_url", ValueKind::Str),
    mapping(
        "SIGCHAIN_SIGNING_KEY_CACHE_TTL_SECS",
        "signing.key_cache_ttl_secs",
        ValueKind::Int,
    ),
    mapping("SIGCHAIN_REQUIRE_SIGNED", "signing.require_signed", ValueKind::Bool),
    mapping("SIGCHAIN_FALLBACK_KEY_B64", "signing.fallback_key_b64", ValueKind::Str),
    // KMS.
    mapping("SIGCHAIN_KMS_ENDPOINT", "kms.endpoint", ValueKind::Str),
    mapping("SIGCHAIN_KMS_KEY_ID", "kms.key_id", ValueKind::Str),
    mapping("SIGCHAIN_KMS_BEARER_TOKEN", "kms.bearer_token", ValueKind::Str),
    mapping("SIGCHAIN_KMS_TIMEOUT_MS", "kms.timeout_ms", ValueKind::Int),
    mapping("SIGCHAIN_KMS_CA_CERT", "kms.ca_cert", ValueKind::Str),
    mapping("SIGCHAIN_KMS_CLIENT_CERT", "kms.client_cert", ValueKind::Str),
    mapping("SIGCHAIN_KMS_CLIENT_KEY", "kms.client_key", ValueKind::Str),
    mapping("SIGCHAIN_REQUIRE_KMS", "kms.require_kms", ValueKind::Bool),
    // Verification.
    mapping("SIGCHAIN_VERIFY_REGISTRY_SOURCE", "verify.registry_source", ValueKind::Str),
    mapping("SIGCHAIN_VERIFY_REGISTRY_JSON", "verify.registry_inline", ValueKind::Str),
    mapping("SIGCHAIN_VERIFY_REGISTRY_FILE", "verify.registry_file", ValueKind::Str),
    mapping("SIGCHAIN_VERIFY_REGISTRY_URL", "verify.registry_url", ValueKind::Str),
    mapping("SIGCHAIN_VERIFY_SHARED_SECRET", "verify.shared_secret", ValueKind::Str),
    mapping("SIGCHAIN_ALLOWED_SKEW_SECS", "verify.allowed_skew_secs", ValueKind::Int),
    mapping("SIGCHAIN_NONCE_TTL_SECS", "verify.nonce_ttl_secs", ValueKind::Int),
    mapping(
        "SIGCHAIN_VERIFY_KEY_CACHE_TTL_SECS",
        "verify.key_cache_ttl_secs",
        ValueKind::Int,
    ),
    // Storage.
    mapping("SIGCHAIN_STORAGE_BACKEND", "storage.backend", ValueKind::Str),
    mapping("SIGCHAIN_STORAGE_PATH", "storage.path", ValueKind::Str),
    // Logging.
    mapping("SIGCHAIN_LOG_LEVEL", "logging.level", ValueKind::Str),
    mapping("SIGCHAIN_LOG_FORMAT", "logging.format", ValueKind::Str),
];

/// Snapshot the `SIGCHAIN_*` environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("SIGCHAIN_"))
        .collect()
}

/// Write every recognized, non-empty environment variable into `merged`.
///
/// Returns the number of variables applied.
///
/// # Errors
///
/// Returns [`ConfigError::Env`] when a numeric or boolean variable does
/// not parse.
pub fn apply_env_overrides<S: std::hash::BuildHasher>(
    merged: &mut toml::Value,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<usize> {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "applying env var override"
        );
        let value = coerce(mapping, raw)?;
        set_field(merged, mapping.field_path, value);
        count = count.saturating_add(1);
    }

    Ok(count)
}

fn coerce(mapping: &EnvMapping, raw: &str) -> ConfigResult<toml::Value> {
    let env_err = |message: String| ConfigError::Env {
        var: mapping.var_name.to_owned(),
        message,
    };

    match mapping.kind {
        ValueKind::Str => Ok(toml::Value::String(raw.to_owned())),
        ValueKind::Int => raw
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|e| env_err(format!("expected an integer: {e}"))),
        ValueKind::Bool => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(toml::Value::Boolean(true)),
            "0" | "false" | "no" | "off" => Ok(toml::Value::Boolean(false)),
            other => Err(env_err(format!("expected a boolean, got '{other}'"))),
        },
        ValueKind::List => Ok(toml::Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_owned()))
                .collect(),
        )),
    }
}

/// Set a dotted `section.field` path, creating the section if needed.
fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let Some((section, field)) = path.split_once('.') else {
        return;
    };
    let Some(table) = root.as_table_mut() else {
        return;
    };
    let section = table
        .entry(section.to_owned())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    if let Some(section) = section.as_table_mut() {
        section.insert(field.to_owned(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_override_replaces_existing_value() {
        let mut merged: toml::Value = toml::from_str("[verify]\nallowed_skew_secs = 120").unwrap();
        let count =
            apply_env_overrides(&mut merged, &env(&[("SIGCHAIN_ALLOWED_SKEW_SECS", "30")])).unwrap();
        assert_eq!(count, 1);
        assert_eq!(merged["verify"]["allowed_skew_secs"].as_integer(), Some(30));
    }

    #[test]
    fn test_creates_missing_section() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        apply_env_overrides(&mut merged, &env(&[("SIGCHAIN_KMS_ENDPOINT", "https://kms")])).unwrap();
        assert_eq!(merged["kms"]["endpoint"].as_str(), Some("https://kms"));
    }

    #[test]
    fn test_list_and_bool_coercion() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        apply_env_overrides(
            &mut merged,
            &env(&[
                ("SIGCHAIN_SIGNING_SOURCES", "kms, inline"),
                ("SIGCHAIN_REQUIRE_SIGNED", "yes"),
            ]),
        )
        .unwrap();
        let sources = merged["signing"]["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].as_str(), Some("kms"));
        assert_eq!(merged["signing"]["require_signed"].as_bool(), Some(true));
    }

    #[test]
    fn test_bad_integer_is_error() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let err = apply_env_overrides(&mut merged, &env(&[("SIGCHAIN_NONCE_TTL_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "SIGCHAIN_NONCE_TTL_SECS"));
    }

    #[test]
    fn test_empty_values_ignored() {
        let mut merged = toml::Value::Table(toml::map::Map::new());
        let count =
            apply_env_overrides(&mut merged, &env(&[("SIGCHAIN_SIGNING_KID", "  ")])).unwrap();
        assert_eq!(count, 0);
    }
}
