//! Decoders for the private account channels.
//!
//! Both payloads are arrays of single-key objects mapping a transaction id
//! to its fields: `[{"TDLH43-DVQXD-2KHVYY": {...}}, ...]`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{ChannelParser, DecodeError, as_array, as_object};
use crate::models::open_orders::{OpenOrder, OpenOrderFields};
use crate::models::own_trades::{OwnTrade, OwnTradeFields};
use crate::models::{Channel, ChannelUpdate};

pub struct OwnTradesParser;

impl ChannelParser for OwnTradesParser {
    fn channel(&self) -> Channel {
        Channel::OwnTrades
    }

    fn parse(&self, payload: &Value, _pair: Option<&str>) -> Result<ChannelUpdate, DecodeError> {
        let trades = keyed_entries::<OwnTradeFields>(payload, "ownTrades")?
            .into_iter()
            .map(|(trade_id, fields)| OwnTrade { trade_id, fields })
            .collect();
        Ok(ChannelUpdate::OwnTrades(trades))
    }
}

pub struct OpenOrdersParser;

impl ChannelParser for OpenOrdersParser {
    fn channel(&self) -> Channel {
        Channel::OpenOrders
    }

    fn parse(&self, payload: &Value, _pair: Option<&str>) -> Result<ChannelUpdate, DecodeError> {
        let orders = keyed_entries::<OpenOrderFields>(payload, "openOrders")?
            .into_iter()
            .map(|(order_id, fields)| OpenOrder { order_id, fields })
            .collect();
        Ok(ChannelUpdate::OpenOrders(orders))
    }
}

/// Flattens `[{id: fields}, ...]` into `(id, fields)` pairs in wire order.
fn keyed_entries<T: DeserializeOwned>(
    payload: &Value,
    field: &'static str,
) -> Result<Vec<(String, T)>, DecodeError> {
    let mut entries = Vec::new();
    for item in as_array(payload, field)? {
        for (id, fields) in as_object(item, field)? {
            let decoded = T::deserialize(fields).map_err(|e| DecodeError::Event {
                event: field.to_string(),
                reason: format!("{id}: {e}"),
            })?;
            entries.push((id.clone(), decoded));
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trading::Side;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn decodes_own_trades() {
        let payload = json!([{
            "TDLH43-DVQXD-2KHVYY": {
                "cost": "1000000.00000",
                "fee": "1600.00000",
                "margin": "0.00000",
                "ordertxid": "TDLH43-DVQXD-2KHVYY",
                "ordertype": "limit",
                "pair": "XBT/EUR",
                "postxid": "OGTT3Y-C6I3P-XRI6HX",
                "price": "100000.00000",
                "time": "1560516023.070651",
                "type": "sell",
                "vol": "1000000000.00000000"
            }
        }]);
        let ChannelUpdate::OwnTrades(trades) = OwnTradesParser.parse(&payload, None).unwrap() else {
            panic!("expected own trades");
        };
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].trade_id, "TDLH43-DVQXD-2KHVYY");
        assert_eq!(trades[0].fields.side, Side::Sell);
        assert_eq!(trades[0].fields.price, dec!(100000));
        assert_eq!(trades[0].fields.time, dec!(1560516023.070651));
    }

    #[test]
    fn partial_open_order_update() {
        let payload = json!([{"OGTT3Y-C6I3P-XRI6HX": {"status": "canceled"}}]);
        let ChannelUpdate::OpenOrders(orders) = OpenOrdersParser.parse(&payload, None).unwrap()
        else {
            panic!("expected open orders");
        };
        assert_eq!(orders[0].order_id, "OGTT3Y-C6I3P-XRI6HX");
        assert_eq!(orders[0].fields.status.as_deref(), Some("canceled"));
        assert!(orders[0].fields.descr.is_none());
    }

    #[test]
    fn malformed_entry_is_an_error() {
        let payload = json!([{"T1": {"type": "sideways"}}]);
        assert!(OwnTradesParser.parse(&payload, None).is_err());
    }
}
