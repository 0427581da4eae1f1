//! Shared models for the Kraken WebSocket (v1) push protocol.
//!
//! Contains channel definitions, the subscription descriptor, outbound
//! request types, and the event frames (pong, heartbeat, system status,
//! subscription status, order acknowledgements) the exchange sends back.

pub mod book;
pub mod candle;
pub mod open_orders;
pub mod own_trades;
pub mod spread;
pub mod ticker;
pub mod trade;
pub mod trading;
pub mod update;

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use zeroize::Zeroizing;

pub use trading::{
    AddOrderRequest, AddOrderStatus, CancelAllRequest, CancelAllStatus, CancelOrderRequest,
    CancelOrderStatus,
};
pub use update::{ChannelUpdate, Event, Update};

/// Available channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Ticker,
    /// OHLC candlestick data (wire name: `"ohlc"`).
    Candles,
    Trades,
    Spread,
    Book,
    /// Private fills for the authenticated account.
    OwnTrades,
    /// Private open-order state for the authenticated account.
    OpenOrders,
}

impl Channel {
    /// Returns the wire-format subscription name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Ticker => "ticker",
            Channel::Candles => "ohlc",
            Channel::Trades => "trade",
            Channel::Spread => "spread",
            Channel::Book => "book",
            Channel::OwnTrades => "ownTrades",
            Channel::OpenOrders => "openOrders",
        }
    }

    /// Returns `true` for channels that require an authentication token.
    pub fn is_private(&self) -> bool {
        matches!(self, Channel::OwnTrades | Channel::OpenOrders)
    }

    /// Parses a subscription name such as `"book"` or `"ohlc"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ticker" => Some(Channel::Ticker),
            "ohlc" => Some(Channel::Candles),
            "trade" => Some(Channel::Trades),
            "spread" => Some(Channel::Spread),
            "book" => Some(Channel::Book),
            "ownTrades" => Some(Channel::OwnTrades),
            "openOrders" => Some(Channel::OpenOrders),
            _ => None,
        }
    }

    /// Parses the channel name carried in data frames, which suffixes the
    /// interval or depth: `"ohlc-5"`, `"book-1000"`.
    ///
    /// Returns the channel and its numeric suffix, if any.
    pub fn from_wire(name: &str) -> Option<(Self, Option<u32>)> {
        match name.split_once('-') {
            Some((base, suffix)) => {
                let channel = Self::from_name(base)?;
                let param = suffix.parse().ok()?;
                Some((channel, Some(param)))
            }
            None => Self::from_name(name).map(|c| (c, None)),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OHLC interval in minutes accepted by the exchange.
pub const CANDLE_INTERVALS: [u32; 9] = [1, 5, 15, 30, 60, 240, 1440, 10080, 21600];

/// Book depths accepted by the exchange.
pub const BOOK_DEPTHS: [u32; 5] = [10, 25, 100, 500, 1000];

/// Authentication token that never appears in `Debug` output and is wiped
/// from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct RedactedToken(Zeroizing<String>);

impl RedactedToken {
    pub fn new(token: &str) -> Self {
        Self(Zeroizing::new(token.to_string()))
    }

    /// Returns the raw token.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RedactedToken(..)")
    }
}

impl Serialize for RedactedToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Descriptor of one subscription: which channel, for which pair, with
/// which parameters.
///
/// Private channels have no pair and carry the token used to subscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub channel: Channel,
    pub pair: Option<String>,
    /// Candle interval in minutes (`ohlc` only).
    pub interval: Option<u32>,
    /// Book depth (`book` only).
    pub depth: Option<u32>,
    pub token: Option<RedactedToken>,
}

impl Subscription {
    /// A public subscription for one pair.
    pub fn public(channel: Channel, pair: &str) -> Self {
        Self {
            channel,
            pair: Some(pair.to_string()),
            interval: None,
            depth: None,
            token: None,
        }
    }

    /// A private, account-wide subscription.
    pub fn private(channel: Channel, token: &str) -> Self {
        Self {
            channel,
            pair: None,
            interval: None,
            depth: None,
            token: Some(RedactedToken::new(token)),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = Some(interval);
        self
    }

    #[must_use]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Two descriptors refer to the same stream when channel, pair and
    /// parameters agree; the token is irrelevant.
    pub fn same_stream(&self, other: &Subscription) -> bool {
        self.channel == other.channel
            && self.pair == other.pair
            && self.interval == other.interval
            && self.depth == other.depth
    }

    /// Builds the `subscription` object of a request for this descriptor.
    pub fn params(&self) -> SubscriptionParams {
        SubscriptionParams {
            name: self.channel.as_str().to_string(),
            interval: self.interval,
            depth: self.depth,
            token: self.token.clone(),
        }
    }
}

/// The `subscription` object inside subscribe/unsubscribe requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<RedactedToken>,
}

/// A `subscribe` request.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    pub event: String,
    pub reqid: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pair: Vec<String>,
    pub subscription: SubscriptionParams,
}

impl SubscribeRequest {
    pub fn new(reqid: u64, pairs: Vec<String>, subscription: SubscriptionParams) -> Self {
        Self {
            event: "subscribe".to_string(),
            reqid,
            pair: pairs,
            subscription,
        }
    }
}

/// An `unsubscribe` request.
#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeRequest {
    pub event: String,
    pub reqid: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pair: Vec<String>,
    pub subscription: SubscriptionParams,
}

impl UnsubscribeRequest {
    pub fn new(reqid: u64, pairs: Vec<String>, subscription: SubscriptionParams) -> Self {
        Self {
            event: "unsubscribe".to_string(),
            reqid,
            pair: pairs,
            subscription,
        }
    }
}

/// A `ping` request used to test connection liveness.
#[derive(Debug, Clone, Serialize)]
pub struct PingRequest {
    pub event: String,
    pub reqid: u64,
}

impl PingRequest {
    pub fn new(reqid: u64) -> Self {
        Self {
            event: "ping".to_string(),
            reqid,
        }
    }
}

/// An object-shaped frame, discriminated by its `event` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EventFrame {
    Pong(PongResponse),
    Heartbeat,
    SystemStatus(SystemStatus),
    SubscriptionStatus(SubscriptionStatus),
    AddOrderStatus(AddOrderStatus),
    CancelOrderStatus(CancelOrderStatus),
    CancelAllStatus(CancelAllStatus),
    /// Generic error, e.g. for a malformed request.
    Error(ErrorResponse),
}

/// Server response to a [`PingRequest`].
#[derive(Debug, Clone, Deserialize)]
pub struct PongResponse {
    #[serde(default)]
    pub reqid: Option<u64>,
}

/// Exchange status sent on connect and whenever it changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SystemStatus {
    #[serde(rename = "connectionID", default)]
    pub connection_id: Option<u64>,
    /// `"online"`, `"maintenance"`, `"cancel_only"`, `"limit_only"` or `"post_only"`.
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Outcome reported for a subscribe/unsubscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Subscribed,
    Unsubscribed,
    Error,
}

/// Echo of the `subscription` object in a status event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionInfo {
    pub name: String,
    #[serde(default)]
    pub interval: Option<u32>,
    #[serde(default)]
    pub depth: Option<u32>,
}

/// Subscription status event.
///
/// Public subscriptions carry the server-assigned `channelID`; private
/// ones only carry the channel name.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionStatus {
    #[serde(rename = "channelID", default)]
    pub channel_id: Option<u64>,
    #[serde(rename = "channelName", default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub pair: Option<String>,
    #[serde(default)]
    pub reqid: Option<u64>,
    pub status: SubscriptionState,
    #[serde(default)]
    pub subscription: Option<SubscriptionInfo>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

impl SubscriptionStatus {
    /// Rebuilds the descriptor this status refers to.
    pub fn descriptor(&self) -> Option<Subscription> {
        let info = self.subscription.as_ref()?;
        let channel = Channel::from_name(&info.name)?;
        Some(Subscription {
            channel,
            pair: self.pair.clone(),
            interval: info.interval,
            depth: info.depth,
            token: None,
        })
    }
}

/// A generic `error` event.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub reqid: Option<u64>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}
