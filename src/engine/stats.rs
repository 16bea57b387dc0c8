// Size statistics over a bounded window of book levels.
//
// Mean and population standard deviation are accumulated in one pass
// (running sum and sum of squares). With very large quantities the
// E[X^2] - E[X]^2 form loses precision; the variance is clamped at zero.

use crate::engine::book::OrderBook;
use crate::engine::types::{Level, ScoreError, Side};
use tracing::{instrument, trace};

/// Number of levels per side that take part in the statistics.
pub const DEFAULT_LEVEL_COUNT: usize = 20;

/// A level is an outlier when its |z-score| is strictly above this.
pub const DEFAULT_OUTLIERS_DETECTION: f64 = 1.5;

/// Mean and population standard deviation of the quantities in the first
/// `min(level_count, levels.len())` levels. Returns `(0.0, 0.0)` for an
/// empty window.
pub fn compute_stats(levels: &[Level], level_count: usize) -> (f64, f64) {
    let window = &levels[..level_count.min(levels.len())];
    if window.is_empty() {
        return (0.0, 0.0);
    }

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for level in window {
        let q = level.quantity();
        sum += q;
        sum_sq += q * q;
        min = min.min(q);
        max = max.max(q);
    }

    let n = window.len() as f64;
    let mean = sum / n;
    // Flat window: report exactly zero instead of a rounding residue
    if min == max {
        return (mean, 0.0);
    }
    let variance = (sum_sq / n - mean * mean).max(0.0);
    (mean, variance.sqrt())
}

/// Score both sides of `book` in place.
///
/// Each side is scored against its own window statistics. Fails without
/// touching the book when a side has no level inside the window or when its
/// quantities have zero variance.
#[instrument(level = "trace", skip(book), fields(bids = book.bids().len(), asks = book.asks().len()))]
pub fn compute_zscores(book: &mut OrderBook, level_count: usize) -> Result<(), ScoreError> {
    for side in [Side::Bid, Side::Ask] {
        if level_count.min(book.side(side).len()) == 0 {
            return Err(ScoreError::InsufficientLevels { side });
        }
    }

    let (bid_mean, bid_std) = compute_stats(book.bids(), level_count);
    let (ask_mean, ask_std) = compute_stats(book.asks(), level_count);
    trace!(bid_mean, bid_std, ask_mean, ask_std, "Computed side statistics");

    if bid_std == 0.0 {
        return Err(ScoreError::DegenerateDistribution { side: Side::Bid });
    }
    if ask_std == 0.0 {
        return Err(ScoreError::DegenerateDistribution { side: Side::Ask });
    }

    apply_zscores(book.side_mut(Side::Bid), level_count, bid_mean, bid_std);
    apply_zscores(book.side_mut(Side::Ask), level_count, ask_mean, ask_std);
    Ok(())
}

fn apply_zscores(levels: &mut [Level], level_count: usize, mean: f64, std_dev: f64) {
    for level in levels.iter_mut().take(level_count) {
        level.set_zscore((level.quantity() - mean) / std_dev);
    }
}

pub fn is_outlier(zscore: f64, threshold: f64) -> bool {
    zscore.abs() > threshold
}
