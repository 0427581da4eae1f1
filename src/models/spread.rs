//! Spread channel models.

use rust_decimal::Decimal;

/// Top of book as reported by the `spread` channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spread {
    pub bid: Decimal,
    pub ask: Decimal,
    pub time: Decimal,
    pub bid_volume: Decimal,
    pub ask_volume: Decimal,
}
