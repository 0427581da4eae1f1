//! Order book reconstruction from a snapshot plus incremental diffs.
//!
//! An [`OrderBook`] is fed the [`BookUpdate`]s of one book subscription. The
//! first update must be a snapshot; every later diff may be verified against
//! the CRC32 checksum the exchange sends with it.
//!
//! Each side sits behind its own [`RwLock`]. Applying an update takes both
//! write locks for the whole batch, so readers never observe a half-applied
//! update. Locks are always taken asks first, then bids.

mod side;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{FeedError, Result};
use crate::models::book::BookUpdate;

pub use side::{BookSide, OrderBookSide, PriceLevel};

/// Levels per side covered by the exchange checksum.
pub const CHECKSUM_LEVELS: usize = 10;

/// Best bid and ask at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopOfBook {
    pub bid: Option<PriceLevel>,
    pub ask: Option<PriceLevel>,
}

impl TopOfBook {
    /// Ask minus bid, when both sides have a level.
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.ask?.price - self.bid?.price)
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        Some((self.ask?.price + self.bid?.price) / Decimal::TWO)
    }
}

/// A locally maintained order book for one pair and depth.
#[derive(Debug)]
pub struct OrderBook {
    asks: RwLock<OrderBookSide>,
    bids: RwLock<OrderBookSide>,
    depth: usize,
}

impl OrderBook {
    /// Creates an empty book.
    ///
    /// `price_precision` and `volume_precision` are the pair's decimal
    /// places; they fix how levels are keyed and how the checksum renders
    /// them.
    pub fn new(depth: usize, price_precision: u32, volume_precision: u32) -> Self {
        Self {
            asks: RwLock::new(OrderBookSide::new(
                BookSide::Ask,
                depth,
                price_precision,
                volume_precision,
            )),
            bids: RwLock::new(OrderBookSide::new(
                BookSide::Bid,
                depth,
                price_precision,
                volume_precision,
            )),
            depth,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// `true` once a snapshot has been applied to both sides.
    pub fn is_initialized(&self) -> bool {
        let (asks, bids) = self.read_both();
        asks.is_initialized() && bids.is_initialized()
    }

    /// Applies a snapshot or diff.
    ///
    /// With `verify_checksum`, a diff carrying a checksum is compared against
    /// the book after the diff is applied. The diff stays applied on
    /// mismatch; the book is then out of sync and should be rebuilt from a
    /// fresh snapshot (see [`OrderBook::clear`]).
    ///
    /// # Errors
    ///
    /// - [`FeedError::BookNotInitialized`] if a diff arrives before the
    ///   snapshot; nothing is applied.
    /// - [`FeedError::ChecksumMismatch`] if verification fails.
    pub fn apply_update(&self, update: &BookUpdate, verify_checksum: bool) -> Result<()> {
        let (mut asks, mut bids) = self.write_both();

        if !update.is_snapshot && !(asks.is_initialized() && bids.is_initialized()) {
            return Err(FeedError::BookNotInitialized);
        }

        asks.apply(&update.asks, update.is_snapshot);
        bids.apply(&update.bids, update.is_snapshot);

        if update.is_snapshot {
            debug!(asks = asks.len(), bids = bids.len(), "Applied book snapshot");
            return Ok(());
        }

        if let (true, Some(expected)) = (verify_checksum, update.checksum) {
            let computed = checksum_of(&asks, &bids);
            if computed != expected {
                warn!(expected, computed, "Order book checksum mismatch");
                return Err(FeedError::ChecksumMismatch { expected, computed });
            }
        }

        Ok(())
    }

    /// CRC32 over the top [`CHECKSUM_LEVELS`] asks then bids.
    pub fn checksum(&self) -> u32 {
        let (asks, bids) = self.read_both();
        checksum_of(&asks, &bids)
    }

    pub fn best(&self) -> TopOfBook {
        let (asks, bids) = self.read_both();
        TopOfBook {
            bid: bids.best(),
            ask: asks.best(),
        }
    }

    /// Level at `price` on `side`, if retained.
    pub fn get(&self, side: BookSide, price: Decimal) -> Option<PriceLevel> {
        self.read(side).get(price)
    }

    /// Visits the levels of `side` best first until `visitor` returns `false`.
    pub fn range<F>(&self, side: BookSide, mut visitor: F)
    where
        F: FnMut(&PriceLevel) -> bool,
    {
        let guard = self.read(side);
        for level in guard.levels() {
            if !visitor(level) {
                break;
            }
        }
    }

    /// Copy of the retained asks, lowest first.
    pub fn asks(&self) -> Vec<PriceLevel> {
        self.read(BookSide::Ask).levels().to_vec()
    }

    /// Copy of the retained bids, highest first.
    pub fn bids(&self) -> Vec<PriceLevel> {
        self.read(BookSide::Bid).levels().to_vec()
    }

    /// Empties both sides; the next update must be a snapshot again.
    pub fn clear(&self) {
        let (mut asks, mut bids) = self.write_both();
        asks.clear();
        bids.clear();
    }

    fn lock_for(&self, side: BookSide) -> &RwLock<OrderBookSide> {
        match side {
            BookSide::Ask => &self.asks,
            BookSide::Bid => &self.bids,
        }
    }

    fn read(&self, side: BookSide) -> RwLockReadGuard<'_, OrderBookSide> {
        self.lock_for(side)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_both(
        &self,
    ) -> (
        RwLockReadGuard<'_, OrderBookSide>,
        RwLockReadGuard<'_, OrderBookSide>,
    ) {
        (self.read(BookSide::Ask), self.read(BookSide::Bid))
    }

    fn write_both(
        &self,
    ) -> (
        RwLockWriteGuard<'_, OrderBookSide>,
        RwLockWriteGuard<'_, OrderBookSide>,
    ) {
        let asks = self.asks.write().unwrap_or_else(PoisonError::into_inner);
        let bids = self.bids.write().unwrap_or_else(PoisonError::into_inner);
        (asks, bids)
    }
}

fn checksum_of(asks: &OrderBookSide, bids: &OrderBookSide) -> u32 {
    let mut text = String::with_capacity(CHECKSUM_LEVELS * 2 * 24);
    asks.write_checksum(CHECKSUM_LEVELS, &mut text);
    bids.write_checksum(CHECKSUM_LEVELS, &mut text);
    crc32fast::hash(text.as_bytes())
}
