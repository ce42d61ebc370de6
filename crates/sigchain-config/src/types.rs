//! Configuration types for sigchain.
//!
//! All types in this module are self-contained with no dependencies on other
//! internal sigchain crates. Every struct implements [`Default`] with the same
//! values as the embedded `defaults.toml`, so a bare `[section]` header in
//! TOML produces a working configuration.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Audit event signing.
    pub signing: SigningSection,
    /// Remote KMS gateway.
    pub kms: KmsSection,
    /// Inbound callback verification.
    pub verify: VerifySection,
    /// Audit event and nonce persistence.
    pub storage: StorageSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// Shared enums
// ---------------------------------------------------------------------------

/// Signature algorithm names accepted in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum AlgorithmName {
    /// `hmac-sha256`
    #[default]
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
    /// `rsa-sha256`
    #[serde(rename = "rsa-sha256")]
    RsaSha256,
    /// `ed25519`
    #[serde(rename = "ed25519")]
    Ed25519,
}

impl fmt::Display for AlgorithmName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HmacSha256 => "hmac-sha256",
            Self::RsaSha256 => "rsa-sha256",
            Self::Ed25519 => "ed25519",
        })
    }
}

/// Where signing key material can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySourceKind {
    /// `signing.inline_key`
    Inline,
    /// `signing.key_file`
    File,
    /// `signing.key_url`
    Url,
    /// `kms.key_id` through `kms.endpoint`
    Kms,
}

/// Where the verifier's public-key registry comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrySourceKind {
    /// JSON document in `verify.registry_inline`.
    Inline,
    /// JSON file at `verify.registry_file`.
    File,
    /// JSON document fetched from `verify.registry_url`.
    Url,
    /// Only the `shared` HMAC secret.
    #[default]
    Shared,
}

/// Persistence backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local maps.
    #[default]
    Memory,
    /// SQLite database at `storage.path`.
    Sqlite,
}

// ---------------------------------------------------------------------------
// [signing]
// ---------------------------------------------------------------------------

/// Signing key resolution and policy.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SigningSection {
    /// Sources tried in order; the first with usable material wins.
    pub sources: Vec<KeySourceKind>,
    /// Algorithm of the signing key.
    pub algorithm: AlgorithmName,
    /// Key id recorded as `signer_kid`.
    pub kid: String,
    /// Inline key text (base64 or PEM).
    pub inline_key: Option<String>,
    /// Path to a key file.
    pub key_file: Option<PathBuf>,
    /// URL serving the key.
    pub key_url: Option<String>,
    /// How long resolved key material stays cached.
    pub key_cache_ttl_secs: u64,
    /// Refuse to persist unsigned audit events.
    pub require_signed: bool,
    /// Base64 Ed25519 seed for the last-resort local signer.
    pub fallback_key_b64: Option<String>,
}

impl Default for SigningSection {
    fn default() -> Self {
        Self {
            sources: vec![
                KeySourceKind::Inline,
                KeySourceKind::File,
                KeySourceKind::Url,
                KeySourceKind::Kms,
            ],
            algorithm: AlgorithmName::HmacSha256,
            kid: "audit-signer".to_owned(),
            inline_key: None,
            key_file: None,
            key_url: None,
            key_cache_ttl_secs: 300,
            require_signed: false,
            fallback_key_b64: None,
        }
    }
}

impl fmt::Debug for SigningSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSection")
            .field("sources", &self.sources)
            .field("algorithm", &self.algorithm)
            .field("kid", &self.kid)
            .field("has_inline_key", &self.inline_key.is_some())
            .field("key_file", &self.key_file)
            .field("key_url", &self.key_url)
            .field("key_cache_ttl_secs", &self.key_cache_ttl_secs)
            .field("require_signed", &self.require_signed)
            .field("has_fallback_key", &self.fallback_key_b64.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// [kms]
// ---------------------------------------------------------------------------

/// Remote KMS gateway settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct KmsSection {
    /// Base URL of the KMS gateway.
    pub endpoint: Option<String>,
    /// Key identifier inside the KMS.
    pub key_id: Option<String>,
    /// Bearer token sent with every request.
    pub bearer_token: Option<String>,
    /// Per-request timeout.
    pub timeout_ms: u64,
    /// Extra CA bundle (PEM) to trust.
    pub ca_cert: Option<PathBuf>,
    /// Client certificate (PEM) for mutual TLS.
    pub client_cert: Option<PathBuf>,
    /// Client private key (PEM) for mutual TLS.
    pub client_key: Option<PathBuf>,
    /// KMS must be configured, and its failures are not masked by fallbacks.
    pub require_kms: bool,
}

impl Default for KmsSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            key_id: None,
            bearer_token: None,
            timeout_ms: 5000,
            ca_cert: None,
            client_cert: None,
            client_key: None,
            require_kms: false,
        }
    }
}

impl fmt::Debug for KmsSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KmsSection")
            .field("endpoint", &self.endpoint)
            .field("key_id", &self.key_id)
            .field("has_bearer_token", &self.bearer_token.is_some())
            .field("timeout_ms", &self.timeout_ms)
            .field("ca_cert", &self.ca_cert)
            .field("client_cert", &self.client_cert)
            .field("client_key", &self.client_key)
            .field("require_kms", &self.require_kms)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// [verify]
// ---------------------------------------------------------------------------

/// Inbound callback verification settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct VerifySection {
    /// Where the public-key registry comes from.
    pub registry_source: RegistrySourceKind,
    /// Registry JSON for the `inline` source.
    pub registry_inline: Option<String>,
    /// Registry file for the `file` source.
    pub registry_file: Option<PathBuf>,
    /// Registry URL for the `url` source.
    pub registry_url: Option<String>,
    /// Base64 HMAC secret used for key id `shared`.
    pub shared_secret: Option<String>,
    /// Maximum allowed `|now - timestamp|`.
    pub allowed_skew_secs: u64,
    /// Lifetime of a claimed nonce.
    pub nonce_ttl_secs: u64,
    /// How long the registry stays cached.
    pub key_cache_ttl_secs: u64,
    /// Signature header name.
    pub signature_header: String,
    /// Unix timestamp header name.
    pub timestamp_header: String,
    /// Nonce header name.
    pub nonce_header: String,
    /// Optional agent id header name.
    pub agent_header: String,
}

impl Default for VerifySection {
    fn default() -> Self {
        Self {
            registry_source: RegistrySourceKind::Shared,
            registry_inline: None,
            registry_file: None,
            registry_url: None,
            shared_secret: None,
            allowed_skew_secs: 120,
            nonce_ttl_secs: 300,
            key_cache_ttl_secs: 300,
            signature_header: "x-kernel-signature".to_owned(),
            timestamp_header: "x-kernel-timestamp".to_owned(),
            nonce_header: "x-kernel-nonce".to_owned(),
            agent_header: "x-kernel-agent-id".to_owned(),
        }
    }
}

impl fmt::Debug for VerifySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifySection")
            .field("registry_source", &self.registry_source)
            .field("has_registry_inline", &self.registry_inline.is_some())
            .field("registry_file", &self.registry_file)
            .field("registry_url", &self.registry_url)
            .field("has_shared_secret", &self.shared_secret.is_some())
            .field("allowed_skew_secs", &self.allowed_skew_secs)
            .field("nonce_ttl_secs", &self.nonce_ttl_secs)
            .field("key_cache_ttl_secs", &self.key_cache_ttl_secs)
            .field("signature_header", &self.signature_header)
            .field("timestamp_header", &self.timestamp_header)
            .field("nonce_header", &self.nonce_header)
            .field("agent_header", &self.agent_header)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// [storage] / [logging]
// ---------------------------------------------------------------------------

/// Persistence settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Backend kind.
    pub backend: StorageBackend,
    /// Database path for the `sqlite` backend.
    pub path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Level filter (e.g. `info`, `debug`).
    pub level: String,
    /// `pretty`, `compact`, `json`, or `full`.
    pub format: String,
    /// `stdout` or `stderr`.
    pub target: String,
    /// ANSI colors.
    pub ansi: bool,
    /// Per-crate overrides such as `sigchain_verify=debug`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
            target: "stderr".to_owned(),
            ansi: true,
            directives: Vec::new(),
        }
    }
}
