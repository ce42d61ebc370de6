//! Key source descriptions.

use std::path::PathBuf;

use sigchain_config::{KeySourceKind, KmsSection, SigningSection};

/// One place signing key material may come from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Key text held in configuration.
    Inline(String),
    /// Key text read from a file.
    File(PathBuf),
    /// Key text (or a `{kid, algorithm, key}` document) fetched over HTTP.
    Url(String),
    /// A key held by the KMS; only its id is known locally.
    Kms {
        /// KMS key identifier.
        key_id: String,
    },
}

impl KeySource {
    /// Short label for logs and errors.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Inline(_) => "inline",
            Self::File(_) => "file",
            Self::Url(_) => "url",
            Self::Kms { .. } => "kms",
        }
    }
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline([REDACTED])"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Kms { key_id } => f.debug_struct("Kms").field("key_id", key_id).finish(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// The configured sources, in `signing.sources` order, skipping kinds that
/// have nothing configured.
///
/// The KMS source needs both `kms.key_id` and `kms.endpoint`.
#[must_use]
pub fn key_sources(signing: &SigningSection, kms: &KmsSection) -> Vec<KeySource> {
    let mut sources = Vec::with_capacity(signing.sources.len());
    for kind in &signing.sources {
        let source = match kind {
            KeySourceKind::Inline => {
                non_empty(signing.inline_key.as_deref()).map(|k| KeySource::Inline(k.to_string()))
            },
            KeySourceKind::File => signing.key_file.clone().map(KeySource::File),
            KeySourceKind::Url => {
                non_empty(signing.key_url.as_deref()).map(|u| KeySource::Url(u.to_string()))
            },
            KeySourceKind::Kms => match (
                non_empty(kms.key_id.as_deref()),
                non_empty(kms.endpoint.as_deref()),
            ) {
                (Some(key_id), Some(_)) => Some(KeySource::Kms {
                    key_id: key_id.to_string(),
                }),
                _ => None,
            },
        };
        if let Some(source) = source
            && !sources.contains(&source)
        {
            sources.push(source);
        }
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_kinds_are_skipped() {
        let signing = SigningSection::default();
        let kms = KmsSection::default();
        assert!(key_sources(&signing, &kms).is_empty());
    }

    #[test]
    fn order_follows_configuration() {
        let signing = SigningSection {
            sources: vec![KeySourceKind::Kms, KeySourceKind::File, KeySourceKind::Inline],
            inline_key: Some("c2VjcmV0".into()),
            key_file: Some(PathBuf::from("/etc/sigchain/key")),
            ..SigningSection::default()
        };
        let kms = KmsSection {
            endpoint: Some("https://kms".into()),
            key_id: Some("alias/audit".into()),
            ..KmsSection::default()
        };
        let labels: Vec<_> = key_sources(&signing, &kms).iter().map(KeySource::label).collect();
        assert_eq!(labels, vec!["kms", "file", "inline"]);
    }

    #[test]
    fn kms_needs_endpoint() {
        let signing = SigningSection {
            sources: vec![KeySourceKind::Kms],
            ..SigningSection::default()
        };
        let kms = KmsSection {
            key_id: Some("alias/audit".into()),
            ..KmsSection::default()
        };
        assert!(key_sources(&signing, &kms).is_empty());
    }

    #[test]
    fn debug_hides_inline_key() {
        let source = KeySource::Inline("super-secret".into());
        assert!(!format!("{source:?}").contains("super-secret"));
    }
}
