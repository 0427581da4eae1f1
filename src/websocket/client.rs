//! The public entry point: a cheap handle onto a running session.
//!
//! ```no_run
//! # async fn demo() -> kraken_feed::Result<()> {
//! use kraken_feed::{ClientConfig, Event, KrakenClient};
//!
//! let client = KrakenClient::connect(ClientConfig::default()).await?;
//! client.subscribe_book(&["XBT/EUR"], 10).await?;
//!
//! let Some(mut events) = client.listen() else {
//!     return Ok(());
//! };
//! while let Some(event) = events.recv().await {
//!     if let Event::Update(update) = event {
//!         println!("{update:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::connection::{Command, EventSink, Session};
use super::handler::Dispatcher;
use super::subscription::SubscriptionRegistry;
use super::trading::{self, Outbound, RequestIds};
use super::{ConnectionState, Connector, WsConnector};
use crate::Result;
use crate::auth::{RestTokenIssuer, TokenIssuer};
use crate::config::ClientConfig;
use crate::decode::ParserRegistry;
use crate::error::FeedError;
use crate::models::{
    AddOrderRequest, BOOK_DEPTHS, CANDLE_INTERVALS, Channel, Event, Subscription,
};

/// Configures a [`KrakenClient`] before connecting.
pub struct ClientBuilder {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    token_issuer: Option<Arc<dyn TokenIssuer>>,
    parsers: Option<ParserRegistry>,
    authenticated: bool,
}

impl ClientBuilder {
    fn new(config: ClientConfig) -> Self {
        let token_issuer = config.credentials.as_ref().map(|c| {
            Arc::new(RestTokenIssuer::new(&c.api_key, &c.api_secret)) as Arc<dyn TokenIssuer>
        });
        Self {
            config,
            connector: Arc::new(WsConnector),
            token_issuer,
            parsers: None,
            authenticated: false,
        }
    }

    /// Replaces the transport, e.g. with an in-memory one.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    /// Source of fresh tokens when private subscriptions are replayed.
    ///
    /// Defaults to a [`RestTokenIssuer`] when the config carries credentials.
    #[must_use]
    pub fn token_issuer(mut self, issuer: Arc<dyn TokenIssuer>) -> Self {
        self.token_issuer = Some(issuer);
        self
    }

    #[must_use]
    pub fn parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = Some(parsers);
        self
    }

    /// Connect to the authenticated endpoint, required for private channels
    /// and order requests.
    #[must_use]
    pub fn authenticated(mut self) -> Self {
        self.authenticated = true;
        self
    }

    /// Dials the endpoint and starts the session.
    ///
    /// # Errors
    ///
    /// Returns the dial error if the first connection attempt fails; only
    /// connections lost after that are retried.
    pub async fn connect(self) -> Result<KrakenClient> {
        let url = if self.authenticated {
            self.config.auth_websocket_url.clone()
        } else {
            self.config.websocket_url.clone()
        };

        let registry = Arc::new(SubscriptionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::with_parsers(
            registry.clone(),
            self.parsers.unwrap_or_default(),
        ));
        let reqids = Arc::new(RequestIds::new());

        let (event_tx, event_rx) = mpsc::channel(self.config.update_buffer.max(1));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let session = Session {
            events: EventSink::new(event_tx, self.config.send_timeout),
            config: self.config,
            url,
            connector: self.connector,
            token_issuer: self.token_issuer,
            registry: registry.clone(),
            dispatcher,
            state: state_tx,
            commands: command_rx,
            shutdown: shutdown_rx,
            reqids: reqids.clone(),
            last_inbound: Arc::new(Mutex::new(Instant::now())),
        };

        session.set_state(ConnectionState::Connecting).await;
        let transport = match session.dial().await {
            Ok(transport) => transport,
            Err(err) => {
                warn!(url = %session.url, error = %err, "Initial connection failed");
                session.set_state(ConnectionState::Disconnected).await;
                return Err(err);
            }
        };
        session.set_state(ConnectionState::Connected).await;

        let task = tokio::spawn(session.run(transport));

        Ok(KrakenClient {
            commands: command_tx,
            events: Mutex::new(Some(event_rx)),
            state: state_rx,
            shutdown: shutdown_tx,
            task: tokio::sync::Mutex::new(Some(task)),
            registry,
            reqids,
        })
    }
}

/// Handle onto a live session.
///
/// All methods take `&self`; the client can be shared behind an `Arc`.
/// Requests issued while the session is reconnecting are queued and written
/// once the new connection is up.
pub struct KrakenClient {
    commands: mpsc::UnboundedSender<Command>,
    events: Mutex<Option<mpsc::Receiver<Event>>>,
    state: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    task: tokio::sync::Mutex<Option<JoinHandle<Result<()>>>>,
    registry: Arc<SubscriptionRegistry>,
    reqids: Arc<RequestIds>,
}

impl KrakenClient {
    /// Connects to the public endpoint with the default transport.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        Self::builder(config).connect().await
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Takes the event stream. Only the first call returns it.
    ///
    /// The stream ends after the session is closed or has given up; in the
    /// latter case the last event is [`Event::Fatal`].
    pub fn listen(&self) -> Option<mpsc::Receiver<Event>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Shared view of pending and confirmed subscriptions.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub async fn subscribe_ticker(&self, pairs: &[&str]) -> Result<()> {
        self.subscribe_public(Channel::Ticker, pairs, |s| s).await
    }

    pub async fn subscribe_trades(&self, pairs: &[&str]) -> Result<()> {
        self.subscribe_public(Channel::Trades, pairs, |s| s).await
    }

    pub async fn subscribe_spread(&self, pairs: &[&str]) -> Result<()> {
        self.subscribe_public(Channel::Spread, pairs, |s| s).await
    }

    /// Subscribes to OHLC candles; `interval` is in minutes.
    ///
    /// # Errors
    ///
    /// [`FeedError::InvalidRequest`] if the interval is not one of
    /// [`CANDLE_INTERVALS`].
    pub async fn subscribe_candles(&self, pairs: &[&str], interval: u32) -> Result<()> {
        if !CANDLE_INTERVALS.contains(&interval) {
            return Err(FeedError::InvalidRequest(format!(
                "unsupported candle interval {interval}"
            )));
        }
        self.subscribe_public(Channel::Candles, pairs, |s| s.with_interval(interval))
            .await
    }

    /// Subscribes to the order book at the given depth.
    ///
    /// # Errors
    ///
    /// [`FeedError::InvalidRequest`] if the depth is not one of
    /// [`BOOK_DEPTHS`].
    pub async fn subscribe_book(&self, pairs: &[&str], depth: u32) -> Result<()> {
        if !BOOK_DEPTHS.contains(&depth) {
            return Err(FeedError::InvalidRequest(format!(
                "unsupported book depth {depth}"
            )));
        }
        self.subscribe_public(Channel::Book, pairs, |s| s.with_depth(depth))
            .await
    }

    /// Private fills. Requires an authenticated connection.
    pub async fn subscribe_own_trades(&self, token: &str) -> Result<()> {
        self.subscribe(vec![Subscription::private(Channel::OwnTrades, token)])
            .await
    }

    /// Private open-order state. Requires an authenticated connection.
    pub async fn subscribe_open_orders(&self, token: &str) -> Result<()> {
        self.subscribe(vec![Subscription::private(Channel::OpenOrders, token)])
            .await
    }

    /// Unsubscribes `channel` for `pairs`, or the private `channel` when
    /// `pairs` is empty.
    ///
    /// Parameters (depth, interval, token) are taken from the confirmed
    /// subscription so the request matches what was subscribed.
    pub async fn unsubscribe(&self, channel: Channel, pairs: &[&str]) -> Result<()> {
        let mut targets = Vec::new();
        if channel.is_private() {
            let active = self.registry.active_for(channel, None);
            if active.is_empty() {
                return Err(FeedError::InvalidRequest(format!(
                    "no active {channel} subscription"
                )));
            }
            targets.extend(active.into_iter().map(|(_, sub)| sub));
        } else {
            if pairs.is_empty() {
                return Err(FeedError::InvalidRequest(format!(
                    "unsubscribe from {channel} needs at least one pair"
                )));
            }
            for pair in pairs {
                let active = self.registry.active_for(channel, Some(*pair));
                if active.is_empty() {
                    targets.push(Subscription::public(channel, pair));
                } else {
                    targets.extend(active.into_iter().map(|(_, sub)| sub));
                }
            }
        }

        for frame in trading::unsubscribe_frames(targets, &self.reqids)? {
            self.send(frame).await?;
        }
        Ok(())
    }

    /// Places an order. Returns the request id echoed by the acknowledgement.
    pub async fn add_order(&self, token: &str, request: AddOrderRequest) -> Result<u64> {
        let reqid = self.reqids.next();
        self.send(trading::add_order(request, token, reqid)?).await?;
        Ok(reqid)
    }

    /// Cancels orders by transaction id (or user reference).
    pub async fn cancel_order(&self, token: &str, txids: Vec<String>) -> Result<u64> {
        if txids.is_empty() {
            return Err(FeedError::InvalidRequest(
                "cancelOrder needs at least one txid".to_string(),
            ));
        }
        let reqid = self.reqids.next();
        self.send(trading::cancel_order(txids, token, reqid)?).await?;
        Ok(reqid)
    }

    pub async fn cancel_all(&self, token: &str) -> Result<u64> {
        let reqid = self.reqids.next();
        self.send(trading::cancel_all(token, reqid)?).await?;
        Ok(reqid)
    }

    /// Drops the current connection and reconnects, replaying every
    /// confirmed subscription.
    pub fn resync(&self) -> Result<()> {
        self.commands
            .send(Command::Resync)
            .map_err(|_| FeedError::Closed)
    }

    /// Closes the session and waits for it to wind down. Idempotent; a call
    /// made while another is in progress waits for the same shutdown.
    ///
    /// # Errors
    ///
    /// Returns the session's fatal error if it had already given up and the
    /// error could not be delivered on the event stream.
    pub async fn close(&self) -> Result<()> {
        self.shutdown.send_replace(true);
        // Held until the session has finished, so concurrent callers only
        // return once the stream is closed.
        let mut slot = self.task.lock().await;
        let Some(task) = slot.take() else {
            return Ok(());
        };
        info!("Closing session");
        match task.await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "Session task failed");
                Err(FeedError::Closed)
            }
        }
    }

    async fn subscribe_public(
        &self,
        channel: Channel,
        pairs: &[&str],
        with_params: impl Fn(Subscription) -> Subscription,
    ) -> Result<()> {
        if pairs.is_empty() {
            return Err(FeedError::InvalidRequest(format!(
                "subscribe to {channel} needs at least one pair"
            )));
        }
        let subscriptions = pairs
            .iter()
            .map(|pair| with_params(Subscription::public(channel, pair)))
            .collect();
        self.subscribe(subscriptions).await
    }

    async fn subscribe(&self, subscriptions: Vec<Subscription>) -> Result<()> {
        for frame in trading::subscribe_frames(subscriptions, &self.reqids)? {
            self.send(frame).await?;
        }
        Ok(())
    }

    /// Hands a frame to the session and waits until it has been written.
    async fn send(&self, frame: Outbound) -> Result<()> {
        if self.state().is_terminal() {
            return Err(FeedError::Closed);
        }
        let (reply, written) = oneshot::channel();
        self.commands
            .send(Command::Send { frame, reply })
            .map_err(|_| FeedError::Closed)?;
        written.await.map_err(|_| FeedError::Closed)?
    }
}

impl Drop for KrakenClient {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}
