// Hyperliquid l2Book adapter: one websocket subscription per coin

use super::hyperliquid_types::{WsBook, WsMessage};
use super::{RawTick, VenueAdapter};
use crate::market_data::normaliser::Normaliser;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_WS_URL: &str = "wss://api.hyperliquid.xyz/ws";

// Why a websocket session ended
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    Disconnected,
    ReceiverClosed,
}

pub struct HyperliquidAdapter {
    name: String,
    pub coin: String,   // e.g. "ETH"
    pub ws_url: String, // "wss://api.hyperliquid.xyz/ws"
    pub reconnect_delay: Duration,
    normaliser: Normaliser,
}

impl HyperliquidAdapter {
    pub fn new(coin: &str) -> Self {
        Self {
            name: format!("hyperliquid:{coin}"),
            coin: coin.to_string(),
            ws_url: DEFAULT_WS_URL.into(),
            reconnect_delay: Duration::from_secs(2),
            normaliser: Normaliser::new(),
        }
    }

    pub fn with_ws_url(mut self, ws_url: &str) -> Self {
        self.ws_url = ws_url.to_string();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    fn subscribe_message(&self) -> String {
        serde_json::json!({
            "method": "subscribe",
            "subscription": {
                "type": "l2Book",
                "coin": self.coin
            }
        })
        .to_string()
    }

    // Turn a text frame into a tick; None for anything that is not our l2Book
    fn parse_frame(&self, text: &str) -> Option<RawTick> {
        let msg: WsMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, "Failed to parse websocket frame");
                return None;
            }
        };
        if msg.channel != "l2Book" {
            debug!(channel = %msg.channel, "Ignoring message");
            return None;
        }
        match serde_json::from_value::<WsBook>(msg.data) {
            Ok(book) if book.coin == self.coin => Some(self.to_tick(book)),
            Ok(book) => {
                debug!(coin = %book.coin, "Ignoring book for another coin");
                None
            }
            Err(e) => {
                warn!(error = %e, "Malformed l2Book payload");
                None
            }
        }
    }

    fn to_tick(&self, book: WsBook) -> RawTick {
        let (bids, asks) = &book.levels;
        RawTick {
            source: self.name.clone(),
            bids: self
                .normaliser
                .normalise_side(bids.iter().map(|l| (l.px.as_str(), l.sz.as_str()))),
            asks: self
                .normaliser
                .normalise_side(asks.iter().map(|l| (l.px.as_str(), l.sz.as_str()))),
            ts_ms: book.time,
        }
    }

    #[instrument(skip(self, tx), fields(adapter = %self.name))]
    async fn stream_l2book(&self, tx: &mpsc::Sender<RawTick>) -> SessionEnd {
        let (ws_stream, response) = match tokio_tungstenite::connect_async(&self.ws_url).await {
            Ok(conn) => conn,
            Err(e) => {
                error!(url = %self.ws_url, error = %e, "Failed to connect to websocket");
                return SessionEnd::Disconnected;
            }
        };
        info!(url = %self.ws_url, status = %response.status(), "Connected to websocket");
        let (mut write, mut read) = ws_stream.split();

        if let Err(e) = write.send(Message::Text(self.subscribe_message())).await {
            error!(error = %e, "Failed to send subscription");
            return SessionEnd::Disconnected;
        }
        info!(coin = %self.coin, "Subscribed to l2Book");

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let Some(tick) = self.parse_frame(&text) else { continue };
                    debug!(bids = tick.bids.len(), asks = tick.asks.len(), ts_ms = tick.ts_ms, "Book update");
                    if tx.send(tick).await.is_err() {
                        return SessionEnd::ReceiverClosed;
                    }
                }
                Ok(Message::Close(frame)) => {
                    warn!(?frame, "WebSocket connection closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Error reading from websocket");
                    break;
                }
            }
        }
        SessionEnd::Disconnected
    }
}

#[async_trait::async_trait]
impl VenueAdapter for HyperliquidAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn spawn(&self, tx: mpsc::Sender<RawTick>) {
        loop {
            if self.stream_l2book(&tx).await == SessionEnd::ReceiverClosed || tx.is_closed() {
                info!(adapter = %self.name, "Tick receiver closed, stopping adapter");
                return;
            }
            warn!(adapter = %self.name, delay_ms = self.reconnect_delay.as_millis() as u64, "Reconnecting");
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }
}
