//! Order book payload decoder.
//!
//! Snapshots use the keys `as`/`bs`, incremental updates `a`/`b` plus a
//! string checksum `c`. Each level is `[price, volume, timestamp]`, with an
//! optional fourth `"r"` marking a republished level.

use serde_json::{Map, Value};

use super::{ChannelParser, DecodeError, as_array, as_object, as_str, as_tuple};
use crate::models::book::{BookLevel, BookUpdate};
use crate::models::{Channel, ChannelUpdate};
use crate::numeric::{parse_decimal, parse_u64};

pub struct BookParser;

impl ChannelParser for BookParser {
    fn channel(&self) -> Channel {
        Channel::Book
    }

    fn parse(&self, payload: &Value, _pair: Option<&str>) -> Result<ChannelUpdate, DecodeError> {
        let object = as_object(payload, "book")?;

        let is_snapshot = object.contains_key("as") || object.contains_key("bs");
        let is_diff = object.contains_key("a") || object.contains_key("b");
        if is_snapshot == is_diff {
            return Err(DecodeError::Shape {
                field: "book",
                expected: "either a snapshot or an update",
            });
        }

        let (ask_key, bid_key) = if is_snapshot { ("as", "bs") } else { ("a", "b") };

        let checksum = match object.get("c") {
            Some(value) => {
                let raw = parse_u64(value, "c")?;
                let checksum = u32::try_from(raw).map_err(|_| DecodeError::InvalidInteger {
                    field: "c",
                    value: raw.to_string(),
                })?;
                Some(checksum)
            }
            None => None,
        };

        Ok(ChannelUpdate::Book(BookUpdate {
            asks: parse_levels(object, ask_key)?,
            bids: parse_levels(object, bid_key)?,
            is_snapshot,
            checksum,
        }))
    }
}

fn parse_levels(object: &Map<String, Value>, key: &'static str) -> Result<Vec<BookLevel>, DecodeError> {
    let Some(value) = object.get(key) else {
        return Ok(Vec::new());
    };
    as_array(value, key)?.iter().map(|l| parse_level(l, key)).collect()
}

fn parse_level(value: &Value, key: &'static str) -> Result<BookLevel, DecodeError> {
    let items = as_tuple(value, 3, key)?;
    let republish = match items.get(3) {
        Some(flag) => as_str(flag, key)? == "r",
        None => false,
    };
    Ok(BookLevel {
        price: parse_decimal(&items[0], "price")?,
        volume: parse_decimal(&items[1], "volume")?,
        time: parse_decimal(&items[2], "timestamp")?,
        republish,
    })
}
