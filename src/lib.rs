pub mod config;
pub mod engine;
pub mod market_data;
pub mod printer;
pub mod telemetry;
