use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};
use zscore_rs::config::AppConfig;
use zscore_rs::engine::ScoreEngine;
use zscore_rs::market_data::adapters::hyperliquid::HyperliquidAdapter;
use zscore_rs::market_data::adapters::synthetic::SyntheticAdapter;
use zscore_rs::market_data::{Multiplexer, VenueAdapter};
use zscore_rs::printer::ConsolePrinter;
use zscore_rs::telemetry;

const SUBSCRIPTION: &str = "z-score";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Hyperliquid l2Book websocket
    Hyperliquid,
    /// Offline random-walk books
    Synthetic,
}

/// Live order-book size z-scores in the terminal
#[derive(Debug, Parser)]
#[command(name = "zscore", version)]
struct Cli {
    /// Configuration file (toml, json, yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tick source; repeat to attach several
    #[arg(long = "source", value_enum, default_value = "hyperliquid")]
    sources: Vec<SourceKind>,

    /// Pair / coin to watch
    #[arg(long)]
    pair: Option<String>,

    /// Levels per side used for the statistics
    #[arg(long)]
    level_count: Option<usize>,

    /// |z-score| threshold for highlighting outliers
    #[arg(long)]
    outliers: Option<f64>,

    /// Ticks a batch must carry before it is scored; match the number of --source flags
    #[arg(long)]
    source_count: Option<usize>,

    /// Keep levels in source order instead of sorting by price
    #[arg(long)]
    no_sort: bool,

    /// Reject ticks that do not carry exactly `level_count` levels per side
    #[arg(long)]
    strict: bool,

    /// Port for the Prometheus exporter (metrics-exporter feature)
    #[arg(long, default_value_t = 9000)]
    metrics_port: u16,
}

impl Cli {
    fn apply(&self, cfg: &mut AppConfig) {
        if let Some(pair) = &self.pair {
            cfg.pair = pair.clone();
        }
        if let Some(n) = self.level_count {
            cfg.score.level_count = n;
        }
        if let Some(t) = self.outliers {
            cfg.score.outliers_detection = t;
        }
        if let Some(n) = self.source_count {
            cfg.score.source_count = n;
        }
        if self.no_sort {
            cfg.score.sort_levels = false;
        }
        if self.strict {
            cfg.score.strict_level_count = true;
        }
    }

    fn adapters(&self, cfg: &AppConfig) -> Vec<Arc<dyn VenueAdapter>> {
        self.sources
            .iter()
            .enumerate()
            .map(|(i, kind)| -> Arc<dyn VenueAdapter> {
                match kind {
                    SourceKind::Hyperliquid => Arc::new(
                        HyperliquidAdapter::new(&cfg.pair)
                            .with_ws_url(&cfg.ws_url)
                            .with_reconnect_delay(Duration::from_millis(cfg.reconnect_delay_ms)),
                    ),
                    SourceKind::Synthetic => Arc::new(
                        SyntheticAdapter::new(&i.to_string(), i as u64).with_depth(cfg.score.level_count),
                    ),
                }
            })
            .collect()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok(); // load .env

    let cli = Cli::parse();
    let mut cfg = AppConfig::load(cli.config.as_deref())?;
    cli.apply(&mut cfg);
    cfg.validate()?;

    telemetry::init_tracing(&cfg.log_filter);
    telemetry::init_metrics(cli.metrics_port)?;

    let (stop, shutdown) = watch::channel(false);

    let mut mpx = Multiplexer::new(cfg.score.channel_capacity);
    for adapter in cli.adapters(&cfg) {
        mpx.attach(adapter)?;
    }
    if mpx.source_count() != cfg.score.source_count {
        warn!(
            attached = mpx.source_count(),
            expected = cfg.score.source_count,
            "Source count differs from attached sources; batches may never be scored"
        );
    }
    let ticks = mpx.subscribe(SUBSCRIPTION)?;
    let mpx_task = mpx.spawn(shutdown.clone())?;

    let printer = Arc::new(ConsolePrinter::new(
        &cfg.pair,
        cfg.score.level_count,
        cfg.score.outliers_detection,
    ));
    let engine = Arc::new(ScoreEngine::new(cfg.score.clone(), printer));
    let mut engine_task = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.run(ticks, shutdown).await }
    });

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Received shutdown signal, exiting...");
        }
        _ = &mut engine_task => {
            warn!("Score engine stopped on its own");
        }
    }

    stop.send_replace(true);
    if !engine_task.is_finished() {
        engine_task.await?;
    }
    mpx_task.await?;
    Ok(())
}
