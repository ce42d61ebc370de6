//! Header access and signature header parsing.

use std::collections::HashMap;

use sigchain_crypto::{Algorithm, decode_base64};

use crate::error::RejectReason;

/// Key id implied by the short `sha256=<hex>` form.
pub const SHARED_KID: &str = "shared";

/// Case-insensitive header lookup.
pub trait HeaderSource {
    /// First value of header `name`, compared case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl HeaderSource for [(String, String)] {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl HeaderSource for Vec<(String, String)> {
    fn header(&self, name: &str) -> Option<&str> {
        self.as_slice().header(name)
    }
}

/// An inbound callback: headers plus the raw, unparsed body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackRequest {
    /// Header name/value pairs as received.
    pub headers: Vec<(String, String)>,
    /// Body bytes exactly as received.
    pub body: Vec<u8>,
}

impl CallbackRequest {
    /// Request with a body and no headers.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl HeaderSource for CallbackRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.header(name)
    }
}

/// A parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Key id to look up.
    pub kid: String,
    /// Algorithm the sender claims, if stated.
    pub algorithm: Option<Algorithm>,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parse either `sha256=<hex>` or `kid=<id>;alg=<name>;sig=<base64>`.
    ///
    /// In the structured form `kid` and `sig` are required, `alg` is
    /// optional, parameter names are case-insensitive, and unknown
    /// parameters are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RejectReason::InvalidSignatureFormat`] for anything else.
    pub fn parse(value: &str) -> Result<Self, RejectReason> {
        let value = value.trim();

        if let Some((prefix, hex_sig)) = value.split_once('=')
            && prefix.trim().eq_ignore_ascii_case("sha256")
            && !hex_sig.contains(';')
        {
            let signature =
                hex::decode(hex_sig.trim()).map_err(|_| RejectReason::InvalidSignatureFormat)?;
            if signature.is_empty() {
                return Err(RejectReason::InvalidSignatureFormat);
            }
            return Ok(Self {
                kid: SHARED_KID.to_string(),
                algorithm: Some(Algorithm::HmacSha256),
                signature,
            });
        }

        let mut kid = None;
        let mut algorithm = None;
        let mut signature = None;
        for part in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, val) = part
                .split_once('=')
                .ok_or(RejectReason::InvalidSignatureFormat)?;
            let val = val.trim();
            match name.trim().to_ascii_lowercase().as_str() {
                "kid" => kid = Some(val.to_string()),
                "alg" => {
                    algorithm = Some(
                        val.parse::<Algorithm>()
                            .map_err(|_| RejectReason::InvalidSignatureFormat)?,
                    );
                },
                "sig" => {
                    signature =
                        Some(decode_base64(val).map_err(|_| RejectReason::InvalidSignatureFormat)?);
                },
                _ => {},
            }
        }

        match (kid, signature) {
            (Some(kid), Some(signature)) if !kid.is_empty() && !signature.is_empty() => Ok(Self {
                kid,
                algorithm,
                signature,
            }),
            _ => Err(RejectReason::InvalidSignatureFormat),
        }
    }
}
