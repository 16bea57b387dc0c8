// Fan-in of every attached adapter into batches for named subscribers.
//
// The multiplexer keeps the latest tick of every source. Each incoming tick
// publishes one batch holding the latest tick of every source seen so far,
// ordered by source name. Until all sources have reported, batches are short.

use crate::market_data::adapters::{RawTick, VenueAdapter};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultiplexerError {
    #[error("source {0:?} is already attached")]
    DuplicateSource(String),
    #[error("subscription {0:?} already exists")]
    DuplicateSubscription(String),
    #[error("no sources attached")]
    NoSources,
}

pub type Batch = Vec<RawTick>;

pub struct Multiplexer {
    capacity: usize,
    adapters: Vec<Arc<dyn VenueAdapter>>,
    subscribers: HashMap<String, mpsc::Sender<Batch>>,
}

impl Multiplexer {
    /// `capacity` bounds both the adapter fan-in channel and every subscription.
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), adapters: Vec::new(), subscribers: HashMap::new() }
    }

    pub fn attach(&mut self, adapter: Arc<dyn VenueAdapter>) -> Result<(), MultiplexerError> {
        if self.adapters.iter().any(|a| a.name() == adapter.name()) {
            return Err(MultiplexerError::DuplicateSource(adapter.name().to_string()));
        }
        info!(source = adapter.name(), "Attached source");
        self.adapters.push(adapter);
        Ok(())
    }

    pub fn subscribe(&mut self, name: &str) -> Result<mpsc::Receiver<Batch>, MultiplexerError> {
        if self.subscribers.contains_key(name) {
            return Err(MultiplexerError::DuplicateSubscription(name.to_string()));
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.insert(name.to_string(), tx);
        info!(subscription = name, "Subscribed");
        Ok(rx)
    }

    pub fn source_count(&self) -> usize {
        self.adapters.len()
    }

    /// Start every adapter plus the fan-in task. The returned task ends on
    /// shutdown or once every adapter has stopped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> Result<JoinHandle<()>, MultiplexerError> {
        if self.adapters.is_empty() {
            return Err(MultiplexerError::NoSources);
        }

        let (tx, mut rx) = mpsc::channel::<RawTick>(self.capacity);
        let adapter_tasks: Vec<JoinHandle<()>> = self
            .adapters
            .into_iter()
            .map(|adapter| {
                let tx = tx.clone();
                tokio::spawn(async move { adapter.spawn(tx).await })
            })
            .collect();
        // Only adapters hold senders now, so rx ends when all of them stop
        drop(tx);

        let mut subscribers = self.subscribers;
        Ok(tokio::spawn(async move {
            let mut latest: BTreeMap<String, RawTick> = BTreeMap::new();
            loop {
                tokio::select! {
                    _ = shutdown.wait_for(|stop| *stop) => {
                        info!("Multiplexer shutting down");
                        break;
                    }
                    maybe = rx.recv() => match maybe {
                        Some(tick) => {
                            latest.insert(tick.source.clone(), tick);
                            let batch: Batch = latest.values().cloned().collect();
                            publish(&mut subscribers, batch);
                        }
                        None => {
                            warn!("All sources stopped");
                            break;
                        }
                    }
                }
            }
            for task in adapter_tasks {
                task.abort();
            }
        }))
    }
}

fn publish(subscribers: &mut HashMap<String, mpsc::Sender<Batch>>, batch: Batch) {
    subscribers.retain(|name, tx| match tx.try_send(batch.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            debug!(subscription = %name, "Subscriber lagging, batch skipped");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            info!(subscription = %name, "Subscriber gone, removing");
            false
        }
    });
}
