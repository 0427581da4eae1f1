//! Trade channel models.

use rust_decimal::Decimal;

use super::trading::{OrderType, Side};

/// A single executed trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub price: Decimal,
    pub volume: Decimal,
    pub time: Decimal,
    /// Side of the taker.
    pub side: Side,
    /// Order type of the taker (limit or market).
    pub order_type: OrderType,
    pub misc: String,
}
