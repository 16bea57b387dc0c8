// Scoring core: book model, statistics, run loop
pub mod book;
pub mod score;
pub mod stats;
pub mod types;

pub use book::OrderBook;
pub use score::{BatchOutcome, RunState, ScoreEngine};
pub use stats::{compute_stats, compute_zscores, is_outlier};
pub use types::{Level, ScoreError, Side};
