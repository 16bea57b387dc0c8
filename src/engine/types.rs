use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "bids"),
            Side::Ask => write!(f, "asks"),
        }
    }
}

// One price point on one side of the book
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    price: f64,
    quantity: f64,
    zscore: f64,
}

impl Level {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity, zscore: 0.0 }
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Deviation of this level's quantity from its side's mean, in standard
    /// deviations. Zero until the book has been scored.
    pub fn zscore(&self) -> f64 {
        self.zscore
    }

    pub fn is_outlier(&self, threshold: f64) -> bool {
        crate::engine::stats::is_outlier(self.zscore, threshold)
    }

    // Only the statistics pass writes z-scores
    pub(crate) fn set_zscore(&mut self, zscore: f64) {
        self.zscore = zscore;
    }
}

// Errors raised while scoring a single tick. None of them are fatal to the run loop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    #[error("insufficient levels on {side}: need at least one level inside the window")]
    InsufficientLevels { side: Side },

    #[error("degenerate distribution on {side}: quantities have zero variance")]
    DegenerateDistribution { side: Side },

    #[error("level count mismatch on {side}: expected {expected}, got {actual}")]
    LevelCountMismatch { side: Side, expected: usize, actual: usize },
}

impl ScoreError {
    // Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            ScoreError::InsufficientLevels { .. } => "insufficient_levels",
            ScoreError::DegenerateDistribution { .. } => "degenerate_distribution",
            ScoreError::LevelCountMismatch { .. } => "level_count_mismatch",
        }
    }
}
