use crate::engine::types::{Level, Side};
use crate::market_data::adapters::RawTick;
use tracing::{instrument, trace};

/// Two-sided snapshot of price levels at one point in time.
///
/// Once built, only the z-score of each level may change (written by
/// [`compute_zscores`](crate::engine::stats::compute_zscores)); prices and
/// quantities are read-only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderBook {
    bids: Vec<Level>,
    asks: Vec<Level>,
}

impl OrderBook {
    /// Build a book from levels. With `sort_levels` bids end up best (highest)
    /// first and asks best (lowest) first; otherwise source order is kept.
    pub fn new(mut bids: Vec<Level>, mut asks: Vec<Level>, sort_levels: bool) -> Self {
        if sort_levels {
            bids.sort_by(|a, b| b.price().total_cmp(&a.price()));
            asks.sort_by(|a, b| a.price().total_cmp(&b.price()));
        }
        Self { bids, asks }
    }

    /// Convert a raw tick into a fresh, unscored book.
    #[instrument(level = "trace", skip(tick), fields(source = %tick.source))]
    pub fn from_tick(tick: &RawTick, sort_levels: bool) -> Self {
        let bids = tick.bids.iter().map(|&(p, q)| Level::new(p, q)).collect();
        let asks = tick.asks.iter().map(|&(p, q)| Level::new(p, q)).collect();
        let book = Self::new(bids, asks, sort_levels);
        trace!(bids = book.bids.len(), asks = book.asks.len(), "Converted tick to order book");
        book
    }

    pub fn bids(&self) -> &[Level] {
        &self.bids
    }

    pub fn asks(&self) -> &[Level] {
        &self.asks
    }

    pub fn side(&self, side: Side) -> &[Level] {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    pub(crate) fn side_mut(&mut self, side: Side) -> &mut [Level] {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    // Highest bid regardless of ordering policy
    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.iter().max_by(|a, b| a.price().total_cmp(&b.price()))
    }

    // Lowest ask regardless of ordering policy
    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.iter().min_by(|a, b| a.price().total_cmp(&b.price()))
    }

    pub fn spread(&self) -> Option<f64> {
        let best_bid = self.best_bid()?.price();
        let best_ask = self.best_ask()?.price();
        Some(best_ask - best_bid)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
