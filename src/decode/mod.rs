//! Per-channel payload decoders.
//!
//! Each channel kind has one [`ChannelParser`] that validates the payload
//! shape explicitly and returns a typed [`ChannelUpdate`]. A payload that does
//! not match is a [`DecodeError`]; the session drops that frame and keeps
//! going.

mod book;
mod market;
mod private;

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::models::update::ChannelId;
use crate::models::{Channel, ChannelUpdate};

pub use book::BookParser;
pub use market::{CandleParser, SpreadParser, TickerParser, TradeParser};
pub use private::{OpenOrdersParser, OwnTradesParser};

/// Why a single frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(String),

    #[error("frame is neither an object nor an array")]
    UnknownShape,

    #[error("channel frame has unexpected arity {0}")]
    Arity(usize),

    #[error("channel id is not numeric: {0}")]
    NonNumericChannelId(String),

    #[error("no subscription registered for channel {0}")]
    UnknownChannel(ChannelId),

    #[error("unknown channel name {0:?}")]
    UnknownChannelName(String),

    #[error("cannot decode {event:?} event: {reason}")]
    Event { event: String, reason: String },

    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("field {field:?} is not {expected}")]
    Shape {
        field: &'static str,
        expected: &'static str,
    },

    #[error("invalid decimal in {field:?}: {value}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("invalid integer in {field:?}: {value}")]
    InvalidInteger { field: &'static str, value: String },

    #[error("unknown side code {0:?}")]
    InvalidSide(String),

    #[error("unknown order type code {0:?}")]
    InvalidOrderType(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err.to_string())
    }
}

/// Decoder for one channel kind.
pub trait ChannelParser: Send + Sync {
    /// The channel kind this parser handles.
    fn channel(&self) -> Channel;

    /// Turns the channel-specific payload into a typed update.
    fn parse(&self, payload: &Value, pair: Option<&str>) -> Result<ChannelUpdate, DecodeError>;
}

/// Lookup table from channel kind to its parser.
pub struct ParserRegistry {
    parsers: HashMap<Channel, Box<dyn ChannelParser>>,
}

impl ParserRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Adds or replaces the parser for its channel kind.
    pub fn register(&mut self, parser: Box<dyn ChannelParser>) {
        self.parsers.insert(parser.channel(), parser);
    }

    pub fn get(&self, channel: Channel) -> Option<&dyn ChannelParser> {
        self.parsers.get(&channel).map(|p| p.as_ref())
    }

    /// Decodes `payload` with the parser registered for `channel`.
    pub fn parse(
        &self,
        channel: Channel,
        payload: &Value,
        pair: Option<&str>,
    ) -> Result<ChannelUpdate, DecodeError> {
        let parser = self
            .get(channel)
            .ok_or_else(|| DecodeError::UnknownChannelName(channel.as_str().to_string()))?;
        parser.parse(payload, pair)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(TickerParser));
        registry.register(Box::new(CandleParser));
        registry.register(Box::new(TradeParser));
        registry.register(Box::new(SpreadParser));
        registry.register(Box::new(BookParser));
        registry.register(Box::new(OwnTradesParser));
        registry.register(Box::new(OpenOrdersParser));
        registry
    }
}

fn as_object<'a>(
    value: &'a Value,
    field: &'static str,
) -> Result<&'a Map<String, Value>, DecodeError> {
    value.as_object().ok_or(DecodeError::Shape {
        field,
        expected: "an object",
    })
}

fn as_array<'a>(value: &'a Value, field: &'static str) -> Result<&'a [Value], DecodeError> {
    value.as_array().map(Vec::as_slice).ok_or(DecodeError::Shape {
        field,
        expected: "an array",
    })
}

/// Requires an array of at least `min` elements.
fn as_tuple<'a>(
    value: &'a Value,
    min: usize,
    field: &'static str,
) -> Result<&'a [Value], DecodeError> {
    let items = as_array(value, field)?;
    if items.len() < min {
        return Err(DecodeError::Shape {
            field,
            expected: "an array of the expected length",
        });
    }
    Ok(items)
}

fn as_str<'a>(value: &'a Value, field: &'static str) -> Result<&'a str, DecodeError> {
    value.as_str().ok_or(DecodeError::Shape {
        field,
        expected: "a string",
    })
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, DecodeError> {
    object.get(field).ok_or(DecodeError::MissingField(field))
}
