//! Post-merge configuration validation.
//!
//! Validates that deserialized [`Config`](crate::Config) values are within
//! acceptable ranges and that cross-field invariants hold.

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, KeySourceKind, RegistrySourceKind, StorageBackend};

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_signing(config)?;
    validate_kms(config)?;
    validate_verify(config)?;
    validate_storage(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_signing(config: &Config) -> ConfigResult<()> {
    let s = &config.signing;

    if s.sources.is_empty() {
        return Err(invalid("signing.sources", "at least one key source is required"));
    }

    if s.kid.trim().is_empty() {
        return Err(invalid("signing.kid", "kid must not be empty"));
    }

    if s.key_cache_ttl_secs == 0 {
        return Err(invalid(
            "signing.key_cache_ttl_secs",
            "key_cache_ttl_secs must be greater than zero",
        ));
    }

    if s.sources.contains(&KeySourceKind::Kms)
        && config.kms.endpoint.is_none()
        && config.kms.key_id.is_some()
    {
        return Err(invalid(
            "kms.endpoint",
            "kms.key_id is set but kms.endpoint is missing",
        ));
    }

    if let Some(url) = &s.key_url {
        validate_http_url("signing.key_url", url)?;
    }

    Ok(())
}

fn validate_kms(config: &Config) -> ConfigResult<()> {
    let k = &config.kms;

    if k.require_kms && k.endpoint.is_none() {
        return Err(invalid(
            "kms.endpoint",
            "kms.require_kms is set but no endpoint is configured",
        ));
    }

    if k.require_kms && !config.signing.sources.contains(&KeySourceKind::Kms) {
        return Err(invalid(
            "signing.sources",
            "kms.require_kms is set but 'kms' is not a signing source",
        ));
    }

    if let Some(endpoint) = &k.endpoint {
        validate_http_url("kms.endpoint", endpoint)?;
        if k.key_id.as_deref().is_none_or(str::is_empty) {
            return Err(invalid("kms.key_id", "kms.endpoint is set but key_id is missing"));
        }
    }

    if k.timeout_ms == 0 {
        return Err(invalid("kms.timeout_ms", "timeout_ms must be greater than zero"));
    }

    if k.client_cert.is_some() != k.client_key.is_some() {
        return Err(invalid(
            "kms.client_cert",
            "client_cert and client_key must be set together",
        ));
    }

    Ok(())
}

fn validate_verify(config: &Config) -> ConfigResult<()> {
    let v = &config.verify;

    for (field, value) in [
        ("verify.allowed_skew_secs", v.allowed_skew_secs),
        ("verify.nonce_ttl_secs", v.nonce_ttl_secs),
        ("verify.key_cache_ttl_secs", v.key_cache_ttl_secs),
    ] {
        if value == 0 {
            return Err(invalid(field, "must be greater than zero"));
        }
    }

    match v.registry_source {
        RegistrySourceKind::Inline if v.registry_inline.is_none() => {
            return Err(invalid(
                "verify.registry_inline",
                "registry_source is 'inline' but registry_inline is missing",
            ));
        },
        RegistrySourceKind::File if v.registry_file.is_none() => {
            return Err(invalid(
                "verify.registry_file",
                "registry_source is 'file' but registry_file is missing",
            ));
        },
        RegistrySourceKind::Url => match &v.registry_url {
            Some(url) => validate_http_url("verify.registry_url", url)?,
            None => {
                return Err(invalid(
                    "verify.registry_url",
                    "registry_source is 'url' but registry_url is missing",
                ));
            },
        },
        _ => {},
    }

    let headers = [
        ("verify.signature_header", &v.signature_header),
        ("verify.timestamp_header", &v.timestamp_header),
        ("verify.nonce_header", &v.nonce_header),
        ("verify.agent_header", &v.agent_header),
    ];
    for (i, (field, name)) in headers.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(invalid(field, "header name must not be empty"));
        }
        let clash = headers
            .iter()
            .skip(i.saturating_add(1))
            .any(|(_, other)| other.eq_ignore_ascii_case(name));
        if clash {
            return Err(invalid(field, format!("header '{name}' is used twice")));
        }
    }

    Ok(())
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    if config.storage.backend == StorageBackend::Sqlite && config.storage.path.is_none() {
        return Err(invalid(
            "storage.path",
            "the sqlite backend requires a database path",
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if l.level.trim().is_empty() {
        return Err(invalid("logging.level", "level must not be empty"));
    }
    if !matches!(
        l.format.to_ascii_lowercase().as_str(),
        "pretty" | "compact" | "json" | "full"
    ) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }
    if !matches!(l.target.to_ascii_lowercase().as_str(), "stdout" | "stderr") {
        return Err(invalid(
            "logging.target",
            format!("unsupported target '{}'; expected stdout or stderr", l.target),
        ));
    }
    Ok(())
}

fn validate_http_url(field: &str, url: &str) -> ConfigResult<()> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(invalid(field, format!("'{url}' is not an http(s) URL")))
    }
}
