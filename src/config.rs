// Runtime configuration.
// Layering: built-in defaults -> optional file -> ZSCORE_* environment -> CLI overrides (main.rs).

use crate::engine::stats::{DEFAULT_LEVEL_COUNT, DEFAULT_OUTLIERS_DETECTION};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Tunables of the scoring engine. Shared with the console printer so both
/// agree on the window and the outlier threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Levels per side that take part in the statistics
    pub level_count: usize,
    /// |z-score| above which a level is flagged
    pub outliers_detection: f64,
    /// Ticks a batch must carry (one per source) before it is processed
    pub source_count: usize,
    /// Sort bids descending / asks ascending before scoring
    pub sort_levels: bool,
    /// Reject ticks that do not carry exactly `level_count` levels per side
    pub strict_level_count: bool,
    /// Capacity of the subscription channel
    pub channel_capacity: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            level_count: DEFAULT_LEVEL_COUNT,
            outliers_detection: DEFAULT_OUTLIERS_DETECTION,
            source_count: 1,
            sort_levels: true,
            strict_level_count: false,
            channel_capacity: 1024,
        }
    }
}

impl ScoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.level_count == 0 {
            return Err(ConfigError::Validation("level_count must be greater than 0".into()));
        }
        if self.source_count == 0 {
            return Err(ConfigError::Validation("source_count must be greater than 0".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Validation("channel_capacity must be greater than 0".into()));
        }
        if !self.outliers_detection.is_finite() || self.outliers_detection < 0.0 {
            return Err(ConfigError::Validation(format!(
                "outliers_detection must be a finite, non-negative number (got {})",
                self.outliers_detection
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pair shown in the console header, also the Hyperliquid coin
    pub pair: String,
    /// Default tracing filter when RUST_LOG is unset
    pub log_filter: String,
    /// Hyperliquid websocket endpoint
    pub ws_url: String,
    /// Delay before reconnecting a dropped websocket
    pub reconnect_delay_ms: u64,
    pub score: ScoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pair: "ETH".into(),
            log_filter: "warn".into(),
            ws_url: "wss://api.hyperliquid.xyz/ws".into(),
            reconnect_delay_ms: 2_000,
            score: ScoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` if given, then `ZSCORE_*` environment
    /// variables (`__` separates nested keys, e.g. `ZSCORE_SCORE__LEVEL_COUNT`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("ZSCORE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pair.trim().is_empty() {
            return Err(ConfigError::Validation("pair must not be empty".into()));
        }
        self.score.validate()
    }
}
