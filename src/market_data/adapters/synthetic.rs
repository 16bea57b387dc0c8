// Random-walk book generator for offline runs and demos

use super::{RawTick, VenueAdapter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, info};

// Chance that a level gets an oversized quantity
const SPIKE_PROBABILITY: f64 = 0.08;
const SPIKE_MULTIPLIER: f64 = 6.0;

pub struct SyntheticAdapter {
    name: String,
    pub depth: usize,
    pub interval: Duration,
    pub mid: f64,
    pub tick_size: f64,
    pub seed: u64,
}

impl SyntheticAdapter {
    pub fn new(name: &str, seed: u64) -> Self {
        Self {
            name: format!("synthetic:{name}"),
            depth: 20,
            interval: Duration::from_millis(500),
            mid: 2_000.0,
            tick_size: 0.1,
            seed,
        }
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One book around `mid`, best levels first.
    pub fn generate<R: Rng>(&self, rng: &mut R, mid: f64, ts_ms: u64) -> RawTick {
        let mut side = |sign: f64| -> Vec<(f64, f64)> {
            (0..self.depth)
                .map(|i| {
                    let price = mid + sign * self.tick_size * (i as f64 + 1.0);
                    let mut qty = rng.gen_range(0.1..5.0);
                    if rng.gen_bool(SPIKE_PROBABILITY) {
                        qty *= SPIKE_MULTIPLIER;
                    }
                    (price, qty)
                })
                .collect()
        };
        let bids = side(-1.0);
        let asks = side(1.0);
        RawTick { source: self.name.clone(), bids, asks, ts_ms }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl VenueAdapter for SyntheticAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn spawn(&self, tx: mpsc::Sender<RawTick>) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut mid = self.mid;
        let mut interval = tokio::time::interval(self.interval);
        info!(adapter = %self.name, depth = self.depth, "Synthetic source started");

        loop {
            interval.tick().await;
            // Keep the walk away from non-positive prices
            let step = rng.gen_range(-3.0..3.0) * self.tick_size;
            mid = (mid + step).max(self.tick_size * (self.depth as f64 + 1.0));

            let tick = self.generate(&mut rng, mid, now_ms());
            if tx.send(tick).await.is_err() {
                debug!(adapter = %self.name, "Tick receiver closed, stopping adapter");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let adapter = SyntheticAdapter::new("a", 1).with_depth(5);
        let mut rng = StdRng::seed_from_u64(1);
        let tick = adapter.generate(&mut rng, 100.0, 7);

        assert_eq!(tick.source, "synthetic:a");
        assert_eq!(tick.ts_ms, 7);
        assert_eq!(tick.bids.len(), 5);
        assert_eq!(tick.asks.len(), 5);
        assert!(tick.bids.iter().all(|&(p, q)| p < 100.0 && q > 0.0));
        assert!(tick.asks.iter().all(|&(p, q)| p > 100.0 && q > 0.0));
        // Best levels first
        assert!(tick.bids.windows(2).all(|w| w[0].0 > w[1].0));
        assert!(tick.asks.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_generate_is_deterministic_for_a_seed() {
        let adapter = SyntheticAdapter::new("a", 9);
        let a = adapter.generate(&mut StdRng::seed_from_u64(9), 100.0, 0);
        let b = adapter.generate(&mut StdRng::seed_from_u64(9), 100.0, 0);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_spawn_stops_when_receiver_dropped() {
        let adapter = SyntheticAdapter::new("a", 3).with_interval(Duration::from_millis(1));
        let (tx, mut rx) = mpsc::channel(4);
        let handle = tokio::spawn(async move { adapter.spawn(tx).await });

        let tick = rx.recv().await.unwrap();
        assert_eq!(tick.bids.len(), 20);
        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
