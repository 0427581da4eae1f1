//! Private `ownTrades` channel models.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::trading::Side;

/// One fill on the authenticated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnTrade {
    /// Trade transaction id (the key of the wire object).
    pub trade_id: String,
    pub fields: OwnTradeFields,
}

/// Fields of an own trade as sent by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OwnTradeFields {
    pub ordertxid: String,
    #[serde(default)]
    pub postxid: Option<String>,
    pub pair: String,
    pub time: Decimal,
    #[serde(rename = "type")]
    pub side: Side,
    /// Order type as free text (`"limit"`, `"market"`, `"stop-loss"`...).
    pub ordertype: String,
    pub price: Decimal,
    pub cost: Decimal,
    pub fee: Decimal,
    pub vol: Decimal,
    #[serde(default)]
    pub margin: Option<Decimal>,
    #[serde(default)]
    pub userref: Option<i64>,
}
