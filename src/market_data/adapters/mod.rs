// Shared trait + tick type for market data adapters

use tokio::sync::mpsc;

/// Full book snapshot from one source at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTick {
    /// Name of the adapter that produced the tick
    pub source: String,
    pub bids: Vec<(f64, f64)>, // (price, quantity)
    pub asks: Vec<(f64, f64)>,
    pub ts_ms: u64,
}

#[async_trait::async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Unique name; becomes `RawTick::source`.
    fn name(&self) -> &str;

    // Push ticks into the multiplexer until the receiver goes away.
    async fn spawn(&self, tx: mpsc::Sender<RawTick>);
}

pub mod hyperliquid;
pub mod hyperliquid_types;
pub mod synthetic;
