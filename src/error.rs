//! Crate-level error types.
//!
//! [`FeedError`] unifies every error source (configuration, transport, JSON,
//! token issuance, per-frame decoding, order-book integrity) behind a single
//! enum so callers can match on the variant they care about while still using
//! the `?` operator for propagation.
//!
//! Errors fall into four groups with different recovery owners:
//! - transport failures are retried by the session until the reconnect
//!   ceiling is hit ([`FeedError::ReconnectExhausted`]),
//! - decode failures drop the offending frame and never end the session,
//! - [`FeedError::ChecksumMismatch`] is returned by the order book and left to
//!   the caller (typically an unsubscribe/resubscribe),
//! - rejections ([`FeedError::SubscriptionRejected`],
//!   [`FeedError::OrderRejected`]) are delivered on the event stream.

use std::time::Duration;

use crate::decode::DecodeError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The token issuer's HTTP request failed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The token issuer rejected the credentials or returned no token.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A single frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The locally reconstructed book no longer matches the exchange.
    #[error("checksum mismatch: exchange sent {expected}, local book computes {computed}")]
    ChecksumMismatch { expected: u32, computed: u32 },

    /// An incremental book update arrived before the snapshot.
    #[error("order book has not received a snapshot")]
    BookNotInitialized,

    /// The exchange refused a subscribe or unsubscribe request.
    #[error("subscription to {channel} for {} rejected: {message}", pair.as_deref().unwrap_or("<private>"))]
    SubscriptionRejected {
        channel: String,
        pair: Option<String>,
        message: String,
    },

    /// The exchange refused an order-management request.
    #[error("{method} rejected: {message}")]
    OrderRejected { method: String, message: String },

    /// A request was refused locally before being sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No frame arrived within the heartbeat window.
    #[error("no inbound traffic for {0:?}")]
    HeartbeatTimeout(Duration),

    /// Dialing the transport did not complete in time.
    #[error("dial timed out after {0:?}")]
    DialTimeout(Duration),

    /// An operation needed a live session but none is running.
    #[error("not connected")]
    NotConnected,

    /// The session has been closed.
    #[error("session closed")]
    Closed,

    /// The reconnect loop gave up.
    #[error("reconnect failed after {attempts} attempts: {source}")]
    ReconnectExhausted {
        attempts: u32,
        #[source]
        source: Box<FeedError>,
    },
}
