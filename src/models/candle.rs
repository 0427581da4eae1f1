//! OHLC candlestick channel models.

use rust_decimal::Decimal;

/// A single OHLC bar, updated in place until its interval ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candle {
    /// Time of the last update, in seconds since the epoch.
    pub time: Decimal,
    /// End of this candle's interval.
    pub end_time: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Volume-weighted average price for this candle.
    pub vwap: Decimal,
    pub volume: Decimal,
    pub count: u64,
}
