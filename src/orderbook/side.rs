//! One side (bids or asks) of a locally maintained order book.

use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::book::BookLevel;
use crate::numeric::{checksum_digits, render_fixed, round_fixed};

/// A retained price level.
///
/// Levels compare by price only.
#[derive(Debug, Clone, Copy)]
pub struct PriceLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

impl PartialEq for PriceLevel {
    fn eq(&self, other: &Self) -> bool {
        self.price == other.price
    }
}

impl Eq for PriceLevel {}

impl PartialOrd for PriceLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriceLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.price.cmp(&other.price)
    }
}

/// Which side of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookSide {
    /// Sorted highest price first.
    Bid,
    /// Sorted lowest price first.
    Ask,
}

/// Price levels for one side, bounded to `depth`.
///
/// Levels are keyed by their price rendered at the book's price precision,
/// so `"50251.2"` and `"50251.20000"` address the same level. `sorted` is
/// rebuilt after every batch and always mirrors `levels`.
#[derive(Debug)]
pub struct OrderBookSide {
    side: BookSide,
    depth: usize,
    price_precision: u32,
    volume_precision: u32,
    levels: HashMap<String, PriceLevel>,
    sorted: Vec<PriceLevel>,
    initialized: bool,
}

impl OrderBookSide {
    pub fn new(side: BookSide, depth: usize, price_precision: u32, volume_precision: u32) -> Self {
        Self {
            side,
            depth,
            price_precision,
            volume_precision,
            levels: HashMap::with_capacity(depth + 1),
            sorted: Vec::with_capacity(depth),
            initialized: false,
        }
    }

    pub fn side(&self) -> BookSide {
        self.side
    }

    /// `true` once a snapshot has been applied.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Applies one batch of levels.
    ///
    /// A snapshot replaces the whole side. Within a batch a zero volume
    /// removes the level (a no-op if the price is absent); anything else
    /// upserts it. The side is re-sorted and truncated to `depth` once the
    /// whole batch is in, and levels beyond `depth` are evicted.
    ///
    /// The caller is responsible for rejecting diffs on an uninitialized side.
    pub fn apply(&mut self, batch: &[BookLevel], is_snapshot: bool) {
        if is_snapshot {
            self.levels.clear();
            self.initialized = true;
        }

        for level in batch {
            let key = self.key(level.price);
            if self.is_zero(level.volume) {
                self.levels.remove(&key);
            } else {
                self.levels.insert(
                    key,
                    PriceLevel {
                        price: level.price,
                        volume: level.volume,
                    },
                );
            }
        }

        self.rebuild();
    }

    /// Drops every level and marks the side as waiting for a snapshot.
    pub fn clear(&mut self) {
        self.levels.clear();
        self.sorted.clear();
        self.initialized = false;
    }

    /// Best level: lowest ask or highest bid.
    pub fn best(&self) -> Option<PriceLevel> {
        self.sorted.first().copied()
    }

    /// Level at `price`, matched at the book's price precision.
    pub fn get(&self, price: Decimal) -> Option<PriceLevel> {
        self.levels.get(&self.key(price)).copied()
    }

    /// Retained levels, best first.
    pub fn levels(&self) -> &[PriceLevel] {
        &self.sorted
    }

    /// Appends the checksum text of the best `count` levels to `out`.
    pub(crate) fn write_checksum(&self, count: usize, out: &mut String) {
        for level in self.sorted.iter().take(count) {
            out.push_str(&checksum_digits(level.price, self.price_precision));
            out.push_str(&checksum_digits(level.volume, self.volume_precision));
        }
    }

    fn key(&self, price: Decimal) -> String {
        render_fixed(price, self.price_precision)
    }

    /// Zero after rounding to the volume precision, with the same rule the
    /// checksum uses.
    fn is_zero(&self, volume: Decimal) -> bool {
        round_fixed(volume, self.volume_precision).is_zero()
    }

    fn rebuild(&mut self) {
        let mut sorted: Vec<PriceLevel> = self.levels.values().copied().collect();
        match self.side {
            BookSide::Ask => sorted.sort_unstable(),
            BookSide::Bid => sorted.sort_unstable_by(|a, b| b.cmp(a)),
        }

        if sorted.len() > self.depth {
            for evicted in sorted.drain(self.depth..) {
                let key = render_fixed(evicted.price, self.price_precision);
                self.levels.remove(&key);
            }
        }

        self.sorted = sorted;
    }
}
