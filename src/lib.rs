//! Kraken WebSocket (v1) market-data client.
//!
//! Maintains one resilient session (heartbeat, reconnect, subscription
//! replay), decodes public and private channels into typed updates, and
//! reconstructs order books verified against the exchange's checksum.

pub mod auth;
pub mod config;
pub mod decode;
pub mod error;
pub mod frame;
pub mod models;
pub mod numeric;
pub mod orderbook;
pub mod websocket;

pub use config::{ClientConfig, fetch_config};
pub use error::{FeedError, Result};
pub use models::{Channel, ChannelUpdate, Event, Subscription, Update};
pub use orderbook::OrderBook;
pub use websocket::{ConnectionState, KrakenClient};
