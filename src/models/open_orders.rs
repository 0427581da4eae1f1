//! Private `openOrders` channel models.
//!
//! The first message after subscribing lists every open order in full;
//! later messages carry only the fields that changed (often just
//! `status`), so every field is optional.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::trading::Side;

/// State change of one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOrder {
    /// Order transaction id (the key of the wire object).
    pub order_id: String,
    pub fields: OpenOrderFields,
}

/// Fields of an open-order entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OpenOrderFields {
    /// `"pending"`, `"open"`, `"closed"`, `"canceled"` or `"expired"`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub refid: Option<String>,
    #[serde(default)]
    pub userref: Option<i64>,
    #[serde(default)]
    pub opentm: Option<Decimal>,
    #[serde(default)]
    pub starttm: Option<Decimal>,
    #[serde(default)]
    pub expiretm: Option<Decimal>,
    #[serde(default)]
    pub descr: Option<OrderDescription>,
    #[serde(default)]
    pub vol: Option<Decimal>,
    #[serde(default)]
    pub vol_exec: Option<Decimal>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub fee: Option<Decimal>,
    #[serde(default)]
    pub avg_price: Option<Decimal>,
    #[serde(default)]
    pub stopprice: Option<Decimal>,
    #[serde(default)]
    pub limitprice: Option<Decimal>,
    #[serde(default)]
    pub misc: Option<String>,
    #[serde(default)]
    pub oflags: Option<String>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
}

/// Order description block.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderDescription {
    pub pair: String,
    #[serde(rename = "type")]
    pub side: Side,
    pub ordertype: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub price2: Option<Decimal>,
    #[serde(default)]
    pub leverage: Option<String>,
    /// Human-readable summary.
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
}
