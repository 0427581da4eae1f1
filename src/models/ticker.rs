//! Ticker channel models.

use rust_decimal::Decimal;

/// Best bid or ask with its volumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerLevel {
    pub price: Decimal,
    pub whole_lot_volume: Decimal,
    pub lot_volume: Decimal,
}

/// Price and volume of the last trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastTrade {
    pub price: Decimal,
    pub lot_volume: Decimal,
}

/// A statistic reported for the current day and the rolling last 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rolling<T> {
    pub today: T,
    pub last_24_hours: T,
}

/// One `ticker` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticker {
    pub ask: TickerLevel,
    pub bid: TickerLevel,
    pub close: LastTrade,
    pub volume: Rolling<Decimal>,
    /// Volume-weighted average price.
    pub vwap: Rolling<Decimal>,
    pub trades: Rolling<u64>,
    pub low: Rolling<Decimal>,
    pub high: Rolling<Decimal>,
    pub open: Rolling<Decimal>,
}
