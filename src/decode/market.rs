//! Decoders for the public market channels: ticker, ohlc, trade, spread.

use rust_decimal::Decimal;
use serde_json::Value;

use super::{ChannelParser, DecodeError, as_array, as_object, as_str, as_tuple, required};
use crate::models::candle::Candle;
use crate::models::spread::Spread;
use crate::models::ticker::{LastTrade, Rolling, Ticker, TickerLevel};
use crate::models::trade::Trade;
use crate::models::trading::{OrderType, Side};
use crate::models::{Channel, ChannelUpdate};
use crate::numeric::{parse_decimal, parse_u64};

/// `{"a": [price, wholeLotVolume, lotVolume], "b": [...], "c": [price, lotVolume], "v": [today, 24h], ...}`
pub struct TickerParser;

impl ChannelParser for TickerParser {
    fn channel(&self) -> Channel {
        Channel::Ticker
    }

    fn parse(&self, payload: &Value, _pair: Option<&str>) -> Result<ChannelUpdate, DecodeError> {
        let object = as_object(payload, "ticker")?;

        let level = |field: &'static str| -> Result<TickerLevel, DecodeError> {
            let items = as_tuple(required(object, field)?, 3, field)?;
            Ok(TickerLevel {
                price: parse_decimal(&items[0], field)?,
                whole_lot_volume: parse_decimal(&items[1], field)?,
                lot_volume: parse_decimal(&items[2], field)?,
            })
        };
        let rolling = |field: &'static str| -> Result<Rolling<Decimal>, DecodeError> {
            let items = as_tuple(required(object, field)?, 2, field)?;
            Ok(Rolling {
                today: parse_decimal(&items[0], field)?,
                last_24_hours: parse_decimal(&items[1], field)?,
            })
        };

        let last_trade = || -> Result<LastTrade, DecodeError> {
            let items = as_tuple(required(object, "c")?, 2, "c")?;
            Ok(LastTrade {
                price: parse_decimal(&items[0], "c")?,
                lot_volume: parse_decimal(&items[1], "c")?,
            })
        };
        let trade_counts = || -> Result<Rolling<u64>, DecodeError> {
            let items = as_tuple(required(object, "t")?, 2, "t")?;
            Ok(Rolling {
                today: parse_u64(&items[0], "t")?,
                last_24_hours: parse_u64(&items[1], "t")?,
            })
        };

        // Fields are checked in wire order: a, b, c, v, p, t, l, h, o.
        Ok(ChannelUpdate::Ticker(Ticker {
            ask: level("a")?,
            bid: level("b")?,
            close: last_trade()?,
            volume: rolling("v")?,
            vwap: rolling("p")?,
            trades: trade_counts()?,
            low: rolling("l")?,
            high: rolling("h")?,
            open: rolling("o")?,
        }))
    }
}

/// `[time, etime, open, high, low, close, vwap, volume, count]`
pub struct CandleParser;

impl ChannelParser for CandleParser {
    fn channel(&self) -> Channel {
        Channel::Candles
    }

    fn parse(&self, payload: &Value, _pair: Option<&str>) -> Result<ChannelUpdate, DecodeError> {
        let items = as_tuple(payload, 9, "ohlc")?;
        Ok(ChannelUpdate::Candle(Candle {
            time: parse_decimal(&items[0], "time")?,
            end_time: parse_decimal(&items[1], "etime")?,
            open: parse_decimal(&items[2], "open")?,
            high: parse_decimal(&items[3], "high")?,
            low: parse_decimal(&items[4], "low")?,
            close: parse_decimal(&items[5], "close")?,
            vwap: parse_decimal(&items[6], "vwap")?,
            volume: parse_decimal(&items[7], "volume")?,
            count: parse_u64(&items[8], "count")?,
        }))
    }
}

/// `[[price, volume, time, side, orderType, misc], ...]`
pub struct TradeParser;

impl ChannelParser for TradeParser {
    fn channel(&self) -> Channel {
        Channel::Trades
    }

    fn parse(&self, payload: &Value, _pair: Option<&str>) -> Result<ChannelUpdate, DecodeError> {
        let trades = as_array(payload, "trade")?
            .iter()
            .map(parse_trade)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ChannelUpdate::Trades(trades))
    }
}

fn parse_trade(value: &Value) -> Result<Trade, DecodeError> {
    let items = as_tuple(value, 6, "trade")?;

    let side_code = as_str(&items[3], "side")?;
    let side = Side::from_code(side_code).ok_or_else(|| DecodeError::InvalidSide(side_code.into()))?;

    let type_code = as_str(&items[4], "orderType")?;
    let order_type = OrderType::from_code(type_code)
        .ok_or_else(|| DecodeError::InvalidOrderType(type_code.into()))?;

    Ok(Trade {
        price: parse_decimal(&items[0], "price")?,
        volume: parse_decimal(&items[1], "volume")?,
        time: parse_decimal(&items[2], "time")?,
        side,
        order_type,
        misc: as_str(&items[5], "misc")?.to_string(),
    })
}

/// `[bid, ask, timestamp, bidVolume, askVolume]`
pub struct SpreadParser;

impl ChannelParser for SpreadParser {
    fn channel(&self) -> Channel {
        Channel::Spread
    }

    fn parse(&self, payload: &Value, _pair: Option<&str>) -> Result<ChannelUpdate, DecodeError> {
        let items = as_tuple(payload, 5, "spread")?;
        Ok(ChannelUpdate::Spread(Spread {
            bid: parse_decimal(&items[0], "bid")?,
            ask: parse_decimal(&items[1], "ask")?,
            time: parse_decimal(&items[2], "timestamp")?,
            bid_volume: parse_decimal(&items[3], "bidVolume")?,
            ask_volume: parse_decimal(&items[4], "askVolume")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn decodes_trades_with_expanded_codes() {
        let payload = json!([
            ["5541.20000", "0.15850568", "1534614057.321597", "s", "l", ""],
            ["6060.00000", "0.02455000", "1534614057.324998", "b", "m", ""]
        ]);
        let ChannelUpdate::Trades(trades) = TradeParser.parse(&payload, Some("XBT/USD")).unwrap()
        else {
            panic!("expected trades");
        };
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].price, dec!(5541.20000));
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[0].order_type, OrderType::Limit);
        assert_eq!(trades[1].side, Side::Buy);
        assert_eq!(trades[1].order_type, OrderType::Market);
    }

    #[test]
    fn unknown_side_code_is_an_error() {
        let payload = json!([["1.0", "1.0", "1.0", "x", "l", ""]]);
        let err = TradeParser.parse(&payload, None).unwrap_err();
        assert_eq!(err, DecodeError::InvalidSide("x".into()));

        let payload = json!([["1.0", "1.0", "1.0", "b", "z", ""]]);
        let err = TradeParser.parse(&payload, None).unwrap_err();
        assert_eq!(err, DecodeError::InvalidOrderType("z".into()));
    }

    #[test]
    fn short_candle_is_a_shape_error() {
        let payload = json!(["1542057314.748456", "1542057360.435743", "3586.70000"]);
        assert!(matches!(
            CandleParser.parse(&payload, None),
            Err(DecodeError::Shape { field: "ohlc", .. })
        ));
    }

    #[test]
    fn ticker_requires_every_field() {
        let payload = json!({"a": ["1", 1, "1"]});
        assert!(matches!(
            TickerParser.parse(&payload, None),
            Err(DecodeError::MissingField("b"))
        ));

        let without_close = json!({
            "a": ["1", 1, "1"],
            "b": ["1", 1, "1"],
            "v": ["1", "1"],
        });
        assert!(matches!(
            TickerParser.parse(&without_close, None),
            Err(DecodeError::MissingField("c"))
        ));
    }

    #[test]
    fn decodes_spread() {
        let payload = json!(["5698.40000", "5700.00000", "1542057299.545897", "1.01234567", "0.98765432"]);
        let ChannelUpdate::Spread(spread) = SpreadParser.parse(&payload, None).unwrap() else {
            panic!("expected spread");
        };
        assert_eq!(spread.bid, dec!(5698.4));
        assert_eq!(spread.ask_volume, dec!(0.98765432));
    }
}
