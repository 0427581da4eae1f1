//! Wire frame classification.
//!
//! A frame is either an event object (`{"event": ...}`) or a channel-data
//! array. The first non-whitespace byte decides which.
//!
//! Public channel arrays look like `[channelID, payload, channelName, pair]`.
//! Book channels may split one update into two payload slots (asks, then
//! bids): `[channelID, {"a": ...}, {"b": ..., "c": ...}, channelName, pair]`;
//! the two objects are merged before decoding. Private channel arrays carry
//! no id: `[[payload...], channelName, {"sequence": n}]`.

use serde_json::Value;

use crate::decode::DecodeError;
use crate::models::update::ChannelId;
use crate::models::{Channel, EventFrame};
use crate::numeric::parse_u64;

/// A classified frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Event(EventFrame),
    Channel(ChannelFrame),
}

/// Routing fields and raw payload of a channel-data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFrame {
    pub id: ChannelId,
    /// Channel name as sent, e.g. `"book-10"` or `"ownTrades"`.
    pub name: String,
    pub pair: Option<String>,
    pub sequence: Option<u64>,
    pub payload: Value,
}

/// Classifies and splits a raw frame.
pub fn classify(bytes: &[u8]) -> Result<Frame, DecodeError> {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => parse_event(bytes).map(Frame::Event),
        Some(b'[') => {
            let items: Vec<Value> = serde_json::from_slice(bytes)?;
            parse_channel(items).map(Frame::Channel)
        }
        _ => Err(DecodeError::UnknownShape),
    }
}

fn parse_event(bytes: &[u8]) -> Result<EventFrame, DecodeError> {
    let value: Value = serde_json::from_slice(bytes)?;
    let event = value
        .get("event")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingField("event"))?
        .to_string();
    serde_json::from_value(value).map_err(|e| DecodeError::Event {
        event,
        reason: e.to_string(),
    })
}

fn parse_channel(mut items: Vec<Value>) -> Result<ChannelFrame, DecodeError> {
    let head = items.first().map(|v| (v.is_number(), v.is_array()));
    match head {
        None => Err(DecodeError::Arity(0)),
        Some((true, _)) => parse_public(items),
        Some((_, true)) if items.len() == 3 => parse_private(&mut items),
        Some(_) => Err(DecodeError::NonNumericChannelId(items[0].to_string())),
    }
}

fn parse_public(mut items: Vec<Value>) -> Result<ChannelFrame, DecodeError> {
    let len = items.len();
    if len != 4 && len != 5 {
        return Err(DecodeError::Arity(len));
    }

    let id = items[0]
        .as_u64()
        .ok_or_else(|| DecodeError::NonNumericChannelId(items[0].to_string()))?;
    let pair = items[len - 1]
        .as_str()
        .ok_or(DecodeError::Shape {
            field: "pair",
            expected: "a string",
        })?
        .to_string();
    let name = items[len - 2]
        .as_str()
        .ok_or(DecodeError::Shape {
            field: "channelName",
            expected: "a string",
        })?
        .to_string();

    let payload = if len == 5 {
        let second = items[2].take();
        let first = items[1].take();
        merge_objects(first, second)?
    } else {
        items[1].take()
    };

    Ok(ChannelFrame {
        id: ChannelId::Public(id),
        name,
        pair: Some(pair),
        sequence: None,
        payload,
    })
}

fn parse_private(items: &mut [Value]) -> Result<ChannelFrame, DecodeError> {
    let name = items[1]
        .as_str()
        .ok_or(DecodeError::Shape {
            field: "channelName",
            expected: "a string",
        })?
        .to_string();
    let channel = Channel::from_name(&name)
        .filter(Channel::is_private)
        .ok_or_else(|| DecodeError::UnknownChannelName(name.clone()))?;
    let sequence = match items[2].get("sequence") {
        Some(value) => Some(parse_u64(value, "sequence")?),
        None => None,
    };

    Ok(ChannelFrame {
        id: ChannelId::Private(channel),
        name,
        pair: None,
        sequence,
        payload: items[0].take(),
    })
}

/// Merges the split ask/bid payload slots into one object.
fn merge_objects(first: Value, second: Value) -> Result<Value, DecodeError> {
    let (Value::Object(mut merged), Value::Object(rest)) = (first, second) else {
        return Err(DecodeError::Shape {
            field: "payload",
            expected: "two objects",
        });
    };
    for (key, value) in rest {
        merged.insert(key, value);
    }
    Ok(Value::Object(merged))
}
