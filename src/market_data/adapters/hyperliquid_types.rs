// Source: https://api.hyperliquid.xyz/ws (Subscriptions -> l2Book)
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WsBook {
    pub coin: String,
    pub levels: (Vec<WsLevel>, Vec<WsLevel>), // (bids, asks)
    pub time: u64,
}

// Envelope of every push message. `data` stays raw so that non-book
// channels (e.g. subscriptionResponse) do not fail to parse.
#[derive(Debug, Deserialize)]
pub struct WsMessage {
    pub channel: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct WsLevel {
    pub px: String, // price string, e.g. "1234.56"
    pub sz: String, // size string, e.g. "0.01"
    pub n: u32,     // number of orders at this level
}
