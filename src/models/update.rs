//! Typed updates and the events delivered to callers.

use std::fmt;

use super::book::BookUpdate;
use super::candle::Candle;
use super::open_orders::OpenOrder;
use super::own_trades::OwnTrade;
use super::spread::Spread;
use super::ticker::Ticker;
use super::trade::Trade;
use super::trading::{AddOrderStatus, CancelAllStatus, CancelOrderStatus};
use super::{Channel, Subscription, SystemStatus};
use crate::error::FeedError;
use crate::websocket::ConnectionState;

/// Identifies the stream a channel frame belongs to.
///
/// Public channels are identified by a server-assigned number; private
/// channels are sent without one and are identified by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Public(u64),
    Private(Channel),
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Public(id) => write!(f, "{id}"),
            ChannelId::Private(channel) => write!(f, "{channel}"),
        }
    }
}

/// Decoded payload of one channel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelUpdate {
    Ticker(Ticker),
    Candle(Candle),
    Trades(Vec<Trade>),
    Spread(Spread),
    Book(BookUpdate),
    OwnTrades(Vec<OwnTrade>),
    OpenOrders(Vec<OpenOrder>),
}

impl ChannelUpdate {
    /// The channel kind this payload belongs to.
    pub fn channel(&self) -> Channel {
        match self {
            ChannelUpdate::Ticker(_) => Channel::Ticker,
            ChannelUpdate::Candle(_) => Channel::Candles,
            ChannelUpdate::Trades(_) => Channel::Trades,
            ChannelUpdate::Spread(_) => Channel::Spread,
            ChannelUpdate::Book(_) => Channel::Book,
            ChannelUpdate::OwnTrades(_) => Channel::OwnTrades,
            ChannelUpdate::OpenOrders(_) => Channel::OpenOrders,
        }
    }
}

/// A decoded channel frame with its routing information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub channel_id: ChannelId,
    /// Wire channel name, including any suffix (`"book-10"`).
    pub channel_name: String,
    /// Originating pair; `None` for private channels.
    pub pair: Option<String>,
    /// Sequence number, sent with private channels.
    pub sequence: Option<u64>,
    pub data: ChannelUpdate,
}

impl Update {
    /// Returns the book payload, if this is a book update.
    pub fn as_book(&self) -> Option<&BookUpdate> {
        match &self.data {
            ChannelUpdate::Book(book) => Some(book),
            _ => None,
        }
    }
}

/// Everything the session delivers on its output stream.
#[derive(Debug)]
pub enum Event {
    /// A channel data update.
    Update(Update),
    /// Exchange status (sent on connect and on change).
    SystemStatus(SystemStatus),
    /// A subscription was confirmed.
    Subscribed(Subscription),
    /// An unsubscribe was confirmed.
    Unsubscribed(Subscription),
    /// The exchange refused a subscribe/unsubscribe request
    /// ([`FeedError::SubscriptionRejected`]).
    SubscriptionRejected(FeedError),
    AddOrder(AddOrderStatus),
    CancelOrder(CancelOrderStatus),
    CancelAll(CancelAllStatus),
    /// An order request came back with an error status
    /// ([`FeedError::OrderRejected`]).
    OrderRejected(FeedError),
    /// The connection state machine moved.
    StateChanged(ConnectionState),
    /// The session gave up; this is the last event before the stream ends.
    Fatal(FeedError),
}
