//! Order book channel models.

use rust_decimal::Decimal;

/// One price level of a book snapshot or diff.
///
/// A volume of zero means the level was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLevel {
    pub price: Decimal,
    pub volume: Decimal,
    pub time: Decimal,
    /// Set when the exchange republishes a level that re-entered the
    /// subscribed depth after another level was removed.
    pub republish: bool,
}

/// Order book snapshot or incremental update for a single pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookUpdate {
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
    /// `true` when the payload used the `as`/`bs` keys.
    pub is_snapshot: bool,
    /// CRC32 of the top of book after applying this update. Only sent with
    /// incremental updates.
    pub checksum: Option<u32>,
}
