//! Session tokens for the private channels and order requests.
//!
//! Private subscriptions (`ownTrades`, `openOrders`) and order requests carry
//! a short-lived token obtained via the
//! [`GetWebSocketsToken`](https://docs.kraken.com/api/docs/rest-api/get-websockets-token)
//! REST endpoint. The token must be used within 15 minutes of creation.
//!
//! The session only sees the [`TokenIssuer`] trait: it asks for a fresh
//! token whenever it replays private subscriptions after a reconnect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::Result;
use crate::error::FeedError;

/// Last nonce handed out, in nanoseconds since the epoch.
static NONCE: AtomicU64 = AtomicU64::new(0);

const TOKEN_ENDPOINT: &str = "https://api.kraken.com/0/private/GetWebSocketsToken";
const TOKEN_PATH: &str = "/0/private/GetWebSocketsToken";

/// Tokens are reused for 14 minutes, one minute short of expiry.
const TOKEN_REUSE: Duration = Duration::from_secs(14 * 60);

/// Produces authentication tokens on demand.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A caller-provided token, returned as is.
pub struct StaticToken(Zeroizing<String>);

impl StaticToken {
    pub fn new(token: &str) -> Self {
        Self(Zeroizing::new(token.to_string()))
    }
}

#[async_trait]
impl TokenIssuer for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Fetches tokens from the REST API with an API key and secret.
///
/// A fetched token is cached and reused until it is close to expiry.
pub struct RestTokenIssuer {
    api_key: String,
    api_secret: Zeroizing<String>,
    url: String,
    http: reqwest::Client,
    cached: Mutex<Option<(Zeroizing<String>, Instant)>>,
}

impl RestTokenIssuer {
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        Self::with_url(api_key, api_secret, TOKEN_ENDPOINT)
    }

    /// Same as [`RestTokenIssuer::new`] against another endpoint.
    pub fn with_url(api_key: &str, api_secret: &str, url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_secret: Zeroizing::new(api_secret.to_string()),
            url: url.to_string(),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<String> {
        let nonce = next_nonce();
        let body = format!("nonce={nonce}");
        let signature = sign(&self.api_secret, TOKEN_PATH, nonce, &body)?;

        let reply: serde_json::Value = self
            .http
            .post(&self.url)
            .header("API-Key", &self.api_key)
            .header("API-Sign", signature)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_token_response(&reply)
    }
}

impl std::fmt::Debug for RestTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestTokenIssuer")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenIssuer for RestTokenIssuer {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some((token, fetched_at)) = cached.as_ref()
            && fetched_at.elapsed() < TOKEN_REUSE
        {
            debug!("Reusing cached WebSocket token");
            return Ok(token.to_string());
        }

        let token = self.fetch().await?;
        info!(url = %self.url, "Fetched WebSocket token");
        *cached = Some((Zeroizing::new(token.clone()), Instant::now()));
        Ok(token)
    }
}

/// Extracts `result.token`, or the API's error list.
fn parse_token_response(body: &serde_json::Value) -> Result<String> {
    let errors: Vec<&str> = body["error"]
        .as_array()
        .map(|list| list.iter().filter_map(serde_json::Value::as_str).collect())
        .unwrap_or_default();
    if !errors.is_empty() {
        return Err(FeedError::Auth(format!("token request refused: {}", errors.join("; "))));
    }

    match body["result"]["token"].as_str() {
        Some(token) => Ok(token.to_string()),
        None => Err(FeedError::Auth("token missing from response".to_string())),
    }
}

/// Nanosecond timestamp, bumped past the previous value when the clock has
/// not moved (or went backwards).
fn next_nonce() -> u64 {
    let clock = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default();
    let previous = NONCE
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(clock.max(last.saturating_add(1)))
        })
        .unwrap_or_else(|last| last);
    clock.max(previous.saturating_add(1))
}

/// `API-Sign` for a private REST call:
/// HMAC-SHA512 keyed with the decoded secret over
/// `path || SHA256(nonce || body)`, base64 encoded.
fn sign(api_secret: &str, path: &str, nonce: u64, body: &str) -> Result<String> {
    let key = BASE64_STANDARD
        .decode(api_secret)
        .map(Zeroizing::new)
        .map_err(|e| FeedError::Auth(format!("api secret is not base64: {e}")))?;

    let digest = Sha256::new()
        .chain_update(nonce.to_string())
        .chain_update(body)
        .finalize();

    let mut mac = Hmac::<Sha512>::new_from_slice(&key)
        .map_err(|e| FeedError::Auth(format!("unusable api secret: {e}")))?;
    mac.update(path.as_bytes());
    mac.update(&digest);
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ZERO_SECRET: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

    #[test]
    fn signature_matches_known_vector() {
        let nonce = 1_616_492_376_594;
        let signature = sign(ZERO_SECRET, TOKEN_PATH, nonce, &format!("nonce={nonce}")).unwrap();
        assert_eq!(
            signature,
            "iMNnFwC9JSOo+AgyVXanz3x/RRT3v0aQ/c6GaDWVINV3VmwmWKlllJn6UAmpGnRgxFgun/kMoy1NaTFsmlZmig=="
        );
    }

    #[test]
    fn signature_depends_on_nonce() {
        let a = sign(ZERO_SECRET, TOKEN_PATH, 1, "nonce=1").unwrap();
        let b = sign(ZERO_SECRET, TOKEN_PATH, 2, "nonce=2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_secret_is_an_auth_error() {
        assert!(matches!(
            sign("%%%", TOKEN_PATH, 1, "nonce=1"),
            Err(FeedError::Auth(_))
        ));
    }

    #[test]
    fn nonces_never_repeat() {
        let nonces: Vec<u64> = (0..500).map(|_| next_nonce()).collect();
        assert!(nonces.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn token_response_parsing() {
        let ok = json!({"error": [], "result": {"token": "1Dwc4lzSwNWOAwkMdqhssNNFhs1ed606d1WcF3XfEMw", "expires": 900}});
        assert_eq!(
            parse_token_response(&ok).unwrap(),
            "1Dwc4lzSwNWOAwkMdqhssNNFhs1ed606d1WcF3XfEMw"
        );

        let denied = json!({"error": ["EAPI:Invalid key"]});
        let err = parse_token_response(&denied).unwrap_err();
        assert!(err.to_string().contains("EAPI:Invalid key"));

        assert!(parse_token_response(&json!({"error": [], "result": {}})).is_err());
    }

    #[test]
    fn static_token_is_returned_verbatim() {
        let issuer = StaticToken::new("abc");
        tokio_test::assert_ok!(tokio_test::block_on(issuer.token()));
        assert_eq!(tokio_test::block_on(issuer.token()).unwrap(), "abc");
    }
}
