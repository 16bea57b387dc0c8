// Scoring run loop: batch barrier -> convert -> z-scores -> printer

use crate::config::ScoreConfig;
use crate::engine::book::OrderBook;
use crate::engine::stats::compute_zscores;
use crate::engine::types::{ScoreError, Side};
use crate::market_data::adapters::RawTick;
use crate::printer::Printer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, instrument, trace, warn};

/// Lifecycle flags shared between callers of [`ScoreEngine::run`] and the loop.
/// `healthy` flips once, on the first synchronized batch, and may lag `running`.
#[derive(Debug, Default)]
pub struct RunState {
    running: AtomicBool,
    healthy: AtomicBool,
}

// Clears `running` however the loop exits, including when its future is dropped
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Size did not match the expected source count
    Dropped { received: usize, expected: usize },
    Processed { scored: usize, rejected: usize },
}

pub struct ScoreEngine {
    config: ScoreConfig,
    printer: Arc<dyn Printer>,
    state: RunState,
}

impl ScoreEngine {
    pub fn new(config: ScoreConfig, printer: Arc<dyn Printer>) -> Self {
        Self { config, printer, state: RunState::default() }
    }

    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    pub fn is_healthy(&self) -> bool {
        self.state.healthy.load(Ordering::Acquire)
    }

    /// Consume batches until `shutdown` turns true (or its sender is dropped).
    ///
    /// Only one run may be active per engine; a second call while running
    /// logs a warning and returns immediately. Per-tick failures are logged
    /// and never end the loop.
    pub async fn run(&self, mut ticks: mpsc::Receiver<Vec<RawTick>>, mut shutdown: watch::Receiver<bool>) {
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("score engine is already running");
            return;
        }
        let _guard = RunGuard(&self.state.running);
        info!(
            level_count = self.config.level_count,
            source_count = self.config.source_count,
            sort_levels = self.config.sort_levels,
            "Score engine started"
        );

        loop {
            tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!("Score engine stopping");
                    break;
                }
                maybe = ticks.recv() => match maybe {
                    Some(batch) => {
                        self.process_batch(batch);
                    }
                    None => {
                        warn!("Tick subscription closed, score engine stopping");
                        break;
                    }
                }
            }
        }
    }

    /// Apply the synchronization barrier to one batch and score every tick in it.
    #[instrument(level = "debug", skip_all, fields(size = batch.len()))]
    pub fn process_batch(&self, batch: Vec<RawTick>) -> BatchOutcome {
        if batch.len() != self.config.source_count {
            trace!(received = batch.len(), expected = self.config.source_count, "Dropping partial batch");
            metrics::counter!("zscore_batches_dropped_total").increment(1);
            return BatchOutcome::Dropped { received: batch.len(), expected: self.config.source_count };
        }

        if !self.state.healthy.swap(true, Ordering::AcqRel) {
            info!("[score engine] receiving ticks and operational");
        }
        metrics::counter!("zscore_batches_processed_total").increment(1);

        let mut scored = 0;
        let mut rejected = 0;
        for tick in &batch {
            match self.score_tick(tick) {
                Ok(book) => {
                    scored += 1;
                    metrics::counter!("zscore_ticks_scored_total").increment(1);
                    self.printer.print(book);
                }
                Err(e) => {
                    rejected += 1;
                    metrics::counter!("zscore_ticks_rejected_total", "reason" => e.reason()).increment(1);
                    warn!(source = %tick.source, ts_ms = tick.ts_ms, error = %e, "Skipping tick");
                }
            }
        }
        BatchOutcome::Processed { scored, rejected }
    }

    /// Convert and score one tick.
    pub fn score_tick(&self, tick: &RawTick) -> Result<OrderBook, ScoreError> {
        if self.config.strict_level_count {
            self.check_level_count(tick)?;
        }
        let mut book = OrderBook::from_tick(tick, self.config.sort_levels);
        compute_zscores(&mut book, self.config.level_count)?;
        debug!(source = %tick.source, spread = ?book.spread(), "Scored tick");
        Ok(book)
    }

    fn check_level_count(&self, tick: &RawTick) -> Result<(), ScoreError> {
        let expected = self.config.level_count;
        for (side, actual) in [(Side::Bid, tick.bids.len()), (Side::Ask, tick.asks.len())] {
            if actual != expected {
                return Err(ScoreError::LevelCountMismatch { side, expected, actual });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingPrinter {
        books: Mutex<Vec<OrderBook>>,
    }

    impl RecordingPrinter {
        fn count(&self) -> usize {
            self.books.lock().len()
        }
    }

    impl Printer for RecordingPrinter {
        fn print(&self, book: OrderBook) {
            self.books.lock().push(book);
        }
    }

    fn tick(source: &str, bids: &[f64], asks: &[f64]) -> RawTick {
        RawTick {
            source: source.into(),
            bids: bids.iter().enumerate().map(|(i, &q)| (100.0 - i as f64, q)).collect(),
            asks: asks.iter().enumerate().map(|(i, &q)| (101.0 + i as f64, q)).collect(),
            ts_ms: 0,
        }
    }

    fn good_tick(source: &str) -> RawTick {
        tick(source, &[5.0, 3.0, 7.0, 1.0, 4.0], &[2.0, 4.0, 6.0])
    }

    fn engine(config: ScoreConfig) -> (Arc<ScoreEngine>, Arc<RecordingPrinter>) {
        let printer = Arc::new(RecordingPrinter::default());
        (Arc::new(ScoreEngine::new(config, printer.clone())), printer)
    }

    #[test]
    fn test_partial_batch_is_dropped() {
        let (engine, printer) = engine(ScoreConfig { source_count: 2, ..Default::default() });

        let outcome = engine.process_batch(vec![good_tick("a")]);
        assert_eq!(outcome, BatchOutcome::Dropped { received: 1, expected: 2 });
        assert_eq!(printer.count(), 0);
        assert!(!engine.is_healthy());

        let outcome = engine.process_batch(vec![good_tick("a"), good_tick("b"), good_tick("c")]);
        assert_eq!(outcome, BatchOutcome::Dropped { received: 3, expected: 2 });
        assert_eq!(printer.count(), 0);
    }

    #[test]
    fn test_full_batch_prints_every_tick() {
        let (engine, printer) = engine(ScoreConfig { source_count: 2, ..Default::default() });

        let outcome = engine.process_batch(vec![good_tick("a"), good_tick("b")]);
        assert_eq!(outcome, BatchOutcome::Processed { scored: 2, rejected: 0 });
        assert!(engine.is_healthy());

        let books = printer.books.lock();
        assert_eq!(books.len(), 2);
        assert!((books[0].bids()[2].zscore() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_bad_tick_is_skipped_not_fatal() {
        let (engine, printer) = engine(ScoreConfig { source_count: 2, ..Default::default() });

        let outcome = engine.process_batch(vec![tick("a", &[1.0, 2.0], &[]), good_tick("b")]);
        assert_eq!(outcome, BatchOutcome::Processed { scored: 1, rejected: 1 });
        assert_eq!(printer.count(), 1);
        assert!(engine.is_healthy());
    }

    #[test]
    fn test_score_tick_errors() {
        let (engine, _) = engine(ScoreConfig::default());
        assert_eq!(
            engine.score_tick(&tick("a", &[1.0, 2.0], &[])).err(),
            Some(ScoreError::InsufficientLevels { side: Side::Ask })
        );
        assert_eq!(
            engine.score_tick(&tick("a", &[3.0, 3.0], &[1.0, 2.0])).err(),
            Some(ScoreError::DegenerateDistribution { side: Side::Bid })
        );
    }

    #[test]
    fn test_strict_level_count() {
        let config = ScoreConfig { level_count: 5, strict_level_count: true, ..Default::default() };
        let (engine, _) = engine(config);

        assert_eq!(
            engine.score_tick(&good_tick("a")).err(),
            Some(ScoreError::LevelCountMismatch { side: Side::Ask, expected: 5, actual: 3 })
        );
        let exact = tick("a", &[5.0, 3.0, 7.0, 1.0, 4.0], &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!(engine.score_tick(&exact).is_ok());
    }

    #[test]
    fn test_unsorted_books_keep_source_order() {
        let (engine, _) = engine(ScoreConfig { sort_levels: false, ..Default::default() });
        let mut raw = good_tick("a");
        raw.bids.reverse();
        let book = engine.score_tick(&raw).unwrap();
        assert_eq!(book.bids()[0].price(), 96.0);
    }

    #[tokio::test]
    async fn test_run_until_shutdown() {
        let (engine, printer) = engine(ScoreConfig::default());
        let (tx, rx) = mpsc::channel(8);
        let (stop, shutdown) = watch::channel(false);

        let task = tokio::spawn({
            let engine = engine.clone();
            async move { engine.run(rx, shutdown).await }
        });

        tx.send(vec![good_tick("a")]).await.unwrap();
        tx.send(vec![tick("a", &[1.0], &[])]).await.unwrap();
        tx.send(vec![good_tick("a")]).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while printer.count() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(engine.is_running());
        assert!(engine.is_healthy());

        stop.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(!engine.is_running());
        assert_eq!(printer.count(), 2);
    }

    #[tokio::test]
    async fn test_second_run_returns_immediately() {
        let (engine, _) = engine(ScoreConfig::default());
        let (_tx, rx) = mpsc::channel(8);
        let (stop, shutdown) = watch::channel(false);

        let task = tokio::spawn({
            let engine = engine.clone();
            let shutdown = shutdown.clone();
            async move { engine.run(rx, shutdown).await }
        });
        tokio::time::timeout(Duration::from_secs(2), async {
            while !engine.is_running() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        let (_tx2, rx2) = mpsc::channel(8);
        tokio::time::timeout(Duration::from_secs(2), engine.run(rx2, shutdown))
            .await
            .expect("re-entrant run must not block");
        // The first run is untouched
        assert!(engine.is_running());

        stop.send(true).unwrap();
        task.await.unwrap();
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_closed_subscription_ends_run() {
        let (engine, _) = engine(ScoreConfig::default());
        let (tx, rx) = mpsc::channel(1);
        let (_stop, shutdown) = watch::channel(false);
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), engine.run(rx, shutdown)).await.unwrap();
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_engine_can_restart_after_stop() {
        let (engine, printer) = engine(ScoreConfig::default());
        for _ in 0..2 {
            let (tx, rx) = mpsc::channel(8);
            let (_stop, shutdown) = watch::channel(false);
            tx.send(vec![good_tick("a")]).await.unwrap();
            drop(tx);
            engine.run(rx, shutdown).await;
            assert!(!engine.is_running());
        }
        assert_eq!(printer.count(), 2);
    }
}
