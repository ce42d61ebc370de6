//! JSON-over-HTTPS client for a KMS gateway.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::client::{
    KmsClient, KmsMacAlgorithm, KmsPublicKey, KmsSignature, KmsSigningAlgorithm, MessageType,
};
use crate::error::{KmsError, KmsResult};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

const RETRY_BACKOFF: Duration = Duration::from_millis(100);
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for [`HttpKmsClient`].
#[derive(Clone)]
pub struct HttpKmsConfig {
    /// Base URL of the gateway, e.g. `https://kms.internal:8443`.
    pub endpoint: String,
    /// Optional bearer token.
    pub bearer_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// PEM CA bundle trusted in addition to the system roots.
    pub ca_cert: Option<PathBuf>,
    /// PEM client certificate for mTLS.
    pub client_cert: Option<PathBuf>,
    /// PEM client private key for mTLS.
    pub client_key: Option<PathBuf>,
}

impl HttpKmsConfig {
    /// Config with only an endpoint and the default timeout.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bearer_token: None,
            timeout: DEFAULT_TIMEOUT,
            ca_cert: None,
            client_cert: None,
            client_key: None,
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for HttpKmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpKmsConfig")
            .field("endpoint", &self.endpoint)
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .field("ca_cert", &self.ca_cert)
            .field("client_cert", &self.client_cert)
            .field("client_key", &self.client_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Serialize)]
struct SignRequest<'a> {
    key_id: &'a str,
    message: String,
    message_type: MessageType,
    signing_algorithm: KmsSigningAlgorithm,
}

#[derive(Serialize)]
struct MacRequest<'a> {
    key_id: &'a str,
    message: String,
    mac_algorithm: KmsMacAlgorithm,
}

#[derive(Serialize)]
struct PublicKeyRequest<'a> {
    key_id: &'a str,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(alias = "mac")]
    signature: Option<String>,
    sig: Option<String>,
    #[serde(alias = "signerId")]
    signer_id: Option<String>,
    #[serde(alias = "keyId")]
    key_id: Option<String>,
}

#[derive(Deserialize)]
struct PublicKeyResponse {
    #[serde(alias = "publicKey")]
    public_key: Option<String>,
    #[serde(alias = "keyId")]
    key_id: Option<String>,
    #[serde(alias = "signingAlgorithm", alias = "key_spec")]
    algorithm: Option<String>,
}

/// HTTP client for a KMS gateway.
///
/// Transport failures and 5xx responses other than 501 are retried once
/// after a short backoff. Everything else is returned to the caller as-is.
pub struct HttpKmsClient {
    client: Client,
    endpoint: String,
    auth: Option<HeaderValue>,
}

impl std::fmt::Debug for HttpKmsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpKmsClient")
            .field("endpoint", &self.endpoint)
            .field("auth", &self.auth.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpKmsClient {
    /// Build a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::NotConfigured`] for an empty endpoint and
    /// [`KmsError::Config`] when TLS material cannot be loaded.
    pub fn new(config: HttpKmsConfig) -> KmsResult<Self> {
        let endpoint = config.endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(KmsError::NotConfigured("endpoint is empty".to_string()));
        }

        let mut builder = Client::builder().timeout(config.timeout);

        if let Some(ca_path) = &config.ca_cert {
            let pem = std::fs::read(ca_path).map_err(|e| {
                KmsError::Config(format!("failed to read CA bundle {}: {e}", ca_path.display()))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| KmsError::Config(format!("invalid CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        match (&config.client_cert, &config.client_key) {
            (Some(cert_path), Some(key_path)) => {
                let mut pem = std::fs::read(cert_path).map_err(|e| {
                    KmsError::Config(format!(
                        "failed to read client certificate {}: {e}",
                        cert_path.display()
                    ))
                })?;
                pem.push(b'\n');
                let key = std::fs::read(key_path).map_err(|e| {
                    KmsError::Config(format!(
                        "failed to read client key {}: {e}",
                        key_path.display()
                    ))
                })?;
                pem.extend_from_slice(&key);
                let identity = reqwest::Identity::from_pem(&pem)
                    .map_err(|e| KmsError::Config(format!("invalid client identity: {e}")))?;
                builder = builder.identity(identity);
            },
            (None, None) => {},
            _ => {
                return Err(KmsError::Config(
                    "client_cert and client_key must be set together".to_string(),
                ));
            },
        }

        let client = builder
            .build()
            .map_err(|e| KmsError::Config(format!("failed to build HTTP client: {e}")))?;

        let auth = match config.bearer_token.as_deref() {
            Some(token) if !token.is_empty() => {
                let mut value = HeaderValue::try_from(format!("Bearer {token}"))
                    .map_err(|_| KmsError::Config("bearer token is not a valid header".into()))?;
                value.set_sensitive(true);
                Some(value)
            },
            _ => None,
        };

        Ok(Self {
            client,
            endpoint,
            auth,
        })
    }

    /// Gateway base URL (without trailing slash).
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_once<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> KmsResult<serde_json::Value> {
        let url = format!("{}/{path}", self.endpoint);
        let mut request = self.client.post(&url).json(body);
        if let Some(auth) = &self.auth {
            request = request.header(AUTHORIZATION, auth.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| KmsError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| KmsError::InvalidResponse(e.to_string()));
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut = cut.saturating_sub(1);
            }
            body.truncate(cut);
        }

        Err(map_status(status, body))
    }

    /// POST with a single retry on transport errors and retryable 5xx.
    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> KmsResult<serde_json::Value> {
        match self.post_once(path, body).await {
            Err(e) if e.is_retryable() => {
                warn!(path, error = %e, "KMS request failed, retrying once");
                tokio::time::sleep(RETRY_BACKOFF).await;
                self.post_once(path, body).await.inspect_err(|e| {
                    error!(path, error = %e, "KMS request failed after retry");
                })
            },
            other => other,
        }
    }
}

fn map_status(status: StatusCode, body: String) -> KmsError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => KmsError::PermissionDenied {
            status: status.as_u16(),
        },
        _ => KmsError::Http {
            status: status.as_u16(),
            body,
        },
    }
}

fn decode_signature(value: serde_json::Value, fallback_kid: &str) -> KmsResult<KmsSignature> {
    let parsed: SignResponse = serde_json::from_value(value)
        .map_err(|e| KmsError::InvalidResponse(e.to_string()))?;
    let encoded = parsed
        .signature
        .or(parsed.sig)
        .ok_or_else(|| KmsError::InvalidResponse("missing signature".to_string()))?;
    let signature = BASE64
        .decode(encoded.trim())
        .map_err(|e| KmsError::InvalidResponse(format!("signature is not base64: {e}")))?;
    if signature.is_empty() {
        return Err(KmsError::InvalidResponse("empty signature".to_string()));
    }
    let key_id = parsed
        .signer_id
        .or(parsed.key_id)
        .filter(|k| !k.is_empty())
        .unwrap_or_else(|| fallback_kid.to_string());
    Ok(KmsSignature { signature, key_id })
}

#[async_trait]
impl KmsClient for HttpKmsClient {
    async fn sign(
        &self,
        key_id: &str,
        message: &[u8],
        message_type: MessageType,
        algorithm: KmsSigningAlgorithm,
    ) -> KmsResult<KmsSignature> {
        let request = SignRequest {
            key_id,
            message: BASE64.encode(message),
            message_type,
            signing_algorithm: algorithm,
        };
        let value = match self.post("sign", &request).await {
            // The gateway answers 501 when the key spec cannot sign digests.
            Err(KmsError::Http { status: 501, .. }) => {
                return Err(KmsError::UnsupportedDigestSigning {
                    algorithm: format!("{algorithm:?}"),
                });
            },
            other => other?,
        };
        debug!(key_id, "KMS sign succeeded");
        decode_signature(value, key_id)
    }

    async fn generate_mac(
        &self,
        key_id: &str,
        message: &[u8],
        algorithm: KmsMacAlgorithm,
    ) -> KmsResult<KmsSignature> {
        let request = MacRequest {
            key_id,
            message: BASE64.encode(message),
            mac_algorithm: algorithm,
        };
        let value = self.post("generate-mac", &request).await?;
        debug!(key_id, "KMS generate-mac succeeded");
        decode_signature(value, key_id)
    }

    async fn get_public_key(&self, key_id: &str) -> KmsResult<KmsPublicKey> {
        let value = self.post("public-key", &PublicKeyRequest { key_id }).await?;
        let parsed: PublicKeyResponse = serde_json::from_value(value)
            .map_err(|e| KmsError::InvalidResponse(e.to_string()))?;
        let public_key = parsed
            .public_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| KmsError::InvalidResponse("missing public_key".to_string()))?;
        Ok(KmsPublicKey {
            key_id: parsed.key_id.unwrap_or_else(|| key_id.to_string()),
            public_key,
            algorithm: parsed.algorithm,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    #[test]
    fn empty_endpoint_is_not_configured() {
        let err = HttpKmsClient::new(HttpKmsConfig::new("  ")).unwrap_err();
        assert!(matches!(err, KmsError::NotConfigured(_)));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = HttpKmsClient::new(HttpKmsConfig::new("https://kms.local/")).unwrap();
        assert_eq!(client.endpoint(), "https://kms.local");
    }

    #[test]
    fn half_mtls_pair_is_rejected() {
        let mut config = HttpKmsConfig::new("https://kms.local");
        config.client_cert = Some(PathBuf::from("/nonexistent/cert.pem"));
        let err = HttpKmsClient::new(config).unwrap_err();
        assert!(matches!(err, KmsError::Config(_)));
    }

    #[test]
    fn missing_ca_file_is_config_error() {
        let mut config = HttpKmsConfig::new("https://kms.local");
        config.ca_cert = Some(PathBuf::from("/nonexistent/ca.pem"));
        let err = HttpKmsClient::new(config).unwrap_err();
        assert!(matches!(err, KmsError::Config(_)));
    }

    #[test]
    fn debug_redacts_token() {
        let config = HttpKmsConfig::new("https://kms.local").with_bearer_token("s3cr3t-token");
        assert!(!format!("{config:?}").contains("s3cr3t-token"));
        let client = HttpKmsClient::new(config).unwrap();
        assert!(!format!("{client:?}").contains("s3cr3t-token"));
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            map_status(StatusCode::FORBIDDEN, String::new()),
            KmsError::PermissionDenied { status: 403 }
        ));
        let err = map_status(StatusCode::BAD_GATEWAY, "upstream".into());
        assert!(err.is_retryable());
        assert!(!map_status(StatusCode::BAD_REQUEST, String::new()).is_retryable());
        assert!(!map_status(StatusCode::NOT_IMPLEMENTED, String::new()).is_retryable());
    }

    #[test]
    fn response_aliases_and_kid_fallback() {
        let sig = decode_signature(json!({"sig": "AQID", "signerId": "kms-key-7"}), "req").unwrap();
        assert_eq!(sig.signature, vec![1, 2, 3]);
        assert_eq!(sig.key_id, "kms-key-7");

        let sig = decode_signature(json!({"signature": "AQID"}), "req").unwrap();
        assert_eq!(sig.key_id, "req");

        assert!(matches!(
            decode_signature(json!({"key_id": "x"}), "req"),
            Err(KmsError::InvalidResponse(_))
        ));
        assert!(matches!(
            decode_signature(json!({"signature": "!!"}), "req"),
            Err(KmsError::InvalidResponse(_))
        ));
    }

    #[test]
    fn request_wire_names() {
        let body = serde_json::to_value(SignRequest {
            key_id: "k",
            message: "AA==".into(),
            message_type: MessageType::Digest,
            signing_algorithm: KmsSigningAlgorithm::RsassaPkcs1V15Sha256,
        })
        .unwrap();
        assert_eq!(body["message_type"], "DIGEST");
        assert_eq!(body["signing_algorithm"], "RSASSA_PKCS1_V1_5_SHA_256");
    }

    /// Gateway on a loopback port answering with `replies` in order (the
    /// last one repeats). Returns the base URL and a request counter.
    async fn stub_gateway(replies: Vec<(u16, &'static str)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = replies
                    .get(n)
                    .or(replies.last())
                    .copied()
                    .unwrap_or((500, "{}"));
                read_request(&mut socket).await;
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}"), hits)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let Ok(read) = socket.read(&mut chunk).await else {
                return;
            };
            if read == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..read]);
            let text = String::from_utf8_lossy(&buf);
            let Some(head_end) = text.find("\r\n\r\n") else {
                continue;
            };
            let length = text[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end.saturating_add(4).saturating_add(length) {
                return;
            }
        }
    }

    async fn sign_digest(endpoint: &str) -> KmsResult<KmsSignature> {
        let client = HttpKmsClient::new(HttpKmsConfig::new(endpoint)).unwrap();
        client
            .sign("k", &[7u8; 32], MessageType::Digest, KmsSigningAlgorithm::Ed25519)
            .await
    }

    #[tokio::test]
    async fn server_errors_are_retried_exactly_once() {
        let (endpoint, hits) = stub_gateway(vec![(503, "{}"), (503, "{}")]).await;
        let err = sign_digest(&endpoint).await.unwrap_err();
        assert!(matches!(err, KmsError::Http { status: 503, .. }), "{err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_recovers_from_one_server_error() {
        let (endpoint, hits) =
            stub_gateway(vec![(502, "{}"), (200, r#"{"signature":"AQID","key_id":"k-v2"}"#)])
                .await;
        let sig = sign_digest(&endpoint).await.unwrap();
        assert_eq!(sig.signature, vec![1, 2, 3]);
        assert_eq!(sig.key_id, "k-v2");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_implemented_means_no_digest_signing_without_retry() {
        let (endpoint, hits) = stub_gateway(vec![(501, "{}")]).await;
        let err = sign_digest(&endpoint).await.unwrap_err();
        assert!(matches!(err, KmsError::UnsupportedDigestSigning { .. }), "{err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forbidden_is_permission_denied_without_retry() {
        let (endpoint, hits) = stub_gateway(vec![(403, "{}")]).await;
        let err = sign_digest(&endpoint).await.unwrap_err();
        assert!(matches!(err, KmsError::PermissionDenied { status: 403 }), "{err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_transport_error() {
        let config = HttpKmsConfig::new("http://127.0.0.1:9")
            .with_timeout(Duration::from_millis(200));
        let client = HttpKmsClient::new(config).unwrap();
        let err = client
            .sign("k", &[0u8; 32], MessageType::Digest, KmsSigningAlgorithm::Ed25519)
            .await
            .unwrap_err();
        assert!(matches!(err, KmsError::Transport(_)));
    }
}
