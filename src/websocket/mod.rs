//! Async WebSocket session for the Kraken WebSocket (v1) API.
//!
//! This module is organized by domain:
//! - [`subscription`] - Registry of pending and confirmed subscriptions
//! - [`handler`] - Incoming frame classification and dispatch
//! - [`connection`] - Session state machine (heartbeat, reconnect, replay)
//! - [`trading`] - Outbound request encoding
//! - [`client`] - Public API

mod client;
mod connection;
mod handler;
mod subscription;
mod trading;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tracing::info;
use tungstenite::Message;

use crate::Result;

pub use client::{ClientBuilder, KrakenClient};
pub use handler::Dispatcher;
pub use subscription::{PendingKey, SubscriptionRegistry};

/// Write half of a transport.
pub type BoxSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// Read half of a transport.
pub type BoxStream = Pin<Box<dyn Stream<Item = tungstenite::Result<Message>> + Send>>;

/// Dials a duplex message transport.
///
/// The session calls this once per connection attempt and owns the returned
/// halves until the connection is torn down. Tests substitute an in-memory
/// implementation.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<(BoxSink, BoxStream)>;
}

/// Connects over TLS with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<(BoxSink, BoxStream)> {
        let (ws_stream, _) = connect_async(url).await?;
        info!(url, "WebSocket handshake completed");

        let (write, read) = ws_stream.split();
        Ok((Box::pin(write), Box::pin(read)))
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Returns a display string for the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        }
    }

    /// `true` for `Closing` and `Closed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Closing | ConnectionState::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
