//! Order management models.
//!
//! `addOrder`, `cancelOrder` and `cancelAll` are one-shot requests on the
//! authenticated socket. The exchange acknowledges each with a matching
//! `*Status` event echoing the request's `reqid`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::RedactedToken;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Expands the single-letter code used in trade and spread payloads.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "b" => Some(Side::Buy),
            "s" => Some(Side::Sell),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderType {
    Limit,
    Market,
    StopLoss,
    TakeProfit,
    StopLossLimit,
    TakeProfitLimit,
    SettlePosition,
}

impl OrderType {
    /// Expands the single-letter code used in trade payloads.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "l" => Some(OrderType::Limit),
            "m" => Some(OrderType::Market),
            _ => None,
        }
    }
}

/// The `addOrder` request.
#[derive(Debug, Clone, Serialize)]
pub struct AddOrderRequest {
    event: String,
    token: RedactedToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    reqid: Option<u64>,
    pub ordertype: OrderType,
    #[serde(rename = "type")]
    pub side: Side,
    pub pair: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
    #[serde(
        with = "rust_decimal::serde::str_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,
    #[serde(
        with = "rust_decimal::serde::str_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price2: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<String>,
    /// Comma-delimited order flags, e.g. `"post,fciq"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oflags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userref: Option<i64>,
    /// Validate only, do not submit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate: Option<bool>,
}

impl AddOrderRequest {
    /// A limit order.
    #[must_use]
    pub fn limit(side: Side, pair: &str, volume: Decimal, price: Decimal) -> Self {
        Self::new(OrderType::Limit, side, pair, volume, Some(price))
    }

    /// A market order.
    #[must_use]
    pub fn market(side: Side, pair: &str, volume: Decimal) -> Self {
        Self::new(OrderType::Market, side, pair, volume, None)
    }

    #[must_use]
    pub fn new(
        ordertype: OrderType,
        side: Side,
        pair: &str,
        volume: Decimal,
        price: Option<Decimal>,
    ) -> Self {
        Self {
            event: "addOrder".to_string(),
            token: RedactedToken::new(""),
            reqid: None,
            ordertype,
            side,
            pair: pair.to_string(),
            volume,
            price,
            price2: None,
            leverage: None,
            oflags: None,
            userref: None,
            validate: None,
        }
    }

    /// Stamps the token and request id; done by the client just before
    /// sending.
    pub(crate) fn authorize(&mut self, token: &str, reqid: u64) {
        self.token = RedactedToken::new(token);
        self.reqid = Some(reqid);
    }

    /// Returns the request ID if set.
    #[must_use]
    pub fn reqid(&self) -> Option<u64> {
        self.reqid
    }
}

/// The `cancelOrder` request.
#[derive(Debug, Clone, Serialize)]
pub struct CancelOrderRequest {
    event: String,
    token: RedactedToken,
    reqid: u64,
    /// Transaction ids of the orders to cancel.
    txid: Vec<String>,
}

impl CancelOrderRequest {
    #[must_use]
    pub fn new(token: &str, txids: Vec<String>, reqid: u64) -> Self {
        Self {
            event: "cancelOrder".to_string(),
            token: RedactedToken::new(token),
            reqid,
            txid: txids,
        }
    }

    #[must_use]
    pub fn reqid(&self) -> u64 {
        self.reqid
    }

    #[must_use]
    pub fn order_count(&self) -> usize {
        self.txid.len()
    }
}

/// The `cancelAll` request.
#[derive(Debug, Clone, Serialize)]
pub struct CancelAllRequest {
    event: String,
    token: RedactedToken,
    reqid: u64,
}

impl CancelAllRequest {
    #[must_use]
    pub fn new(token: &str, reqid: u64) -> Self {
        Self {
            event: "cancelAll".to_string(),
            token: RedactedToken::new(token),
            reqid,
        }
    }

    #[must_use]
    pub fn reqid(&self) -> u64 {
        self.reqid
    }
}

/// `"ok"` or `"error"` in order acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Ok,
    Error,
}

/// Acknowledgement of an `addOrder` request.
#[derive(Debug, Clone, Deserialize)]
pub struct AddOrderStatus {
    #[serde(default)]
    pub reqid: Option<u64>,
    pub status: AckStatus,
    #[serde(default)]
    pub txid: Option<String>,
    /// Human-readable order description.
    #[serde(default)]
    pub descr: Option<String>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

/// Acknowledgement of a `cancelOrder` request.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderStatus {
    #[serde(default)]
    pub reqid: Option<u64>,
    pub status: AckStatus,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

/// Acknowledgement of a `cancelAll` request.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelAllStatus {
    #[serde(default)]
    pub reqid: Option<u64>,
    pub status: AckStatus,
    /// Number of orders cancelled.
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}
