//! Signature algorithm identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Algorithms a key id may be bound to.
///
/// The wire names (`hmac-sha256`, `rsa-sha256`, `ed25519`) are used in
/// configuration, key registries, and structured signature headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    /// HMAC with SHA-256 over a shared secret.
    #[serde(rename = "hmac-sha256", alias = "HMAC-SHA256", alias = "hs256")]
    HmacSha256,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "rsa-sha256", alias = "RSA-SHA256", alias = "rs256")]
    RsaSha256,
    /// Ed25519 (pure, no prehash).
    #[serde(rename = "ed25519", alias = "Ed25519", alias = "ED25519")]
    Ed25519,
}

impl Algorithm {
    /// Wire name of the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha256 => "hmac-sha256",
            Self::RsaSha256 => "rsa-sha256",
            Self::Ed25519 => "ed25519",
        }
    }

    /// Whether the algorithm uses a shared secret rather than a key pair.
    #[must_use]
    pub const fn is_symmetric(self) -> bool {
        matches!(self, Self::HmacSha256)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hmac-sha256" | "hs256" | "hmac" => Ok(Self::HmacSha256),
            "rsa-sha256" | "rs256" | "rsa" => Ok(Self::RsaSha256),
            "ed25519" => Ok(Self::Ed25519),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_names() {
        assert_eq!("hmac-sha256".parse::<Algorithm>().unwrap(), Algorithm::HmacSha256);
        assert_eq!("RSA-SHA256".parse::<Algorithm>().unwrap(), Algorithm::RsaSha256);
        assert_eq!("Ed25519".parse::<Algorithm>().unwrap(), Algorithm::Ed25519);
        assert!("es256".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Algorithm::RsaSha256).unwrap();
        assert_eq!(json, "\"rsa-sha256\"");
        let parsed: Algorithm = serde_json::from_str("\"Ed25519\"").unwrap();
        assert_eq!(parsed, Algorithm::Ed25519);
    }
}
