// Market data module entrypoint
pub mod adapters;     // venue-specific tick sources (Hyperliquid, synthetic)
pub mod multiplexer;  // fans sources into synchronized batches
pub mod normaliser;   // converts wire strings -> validated levels

pub use adapters::{RawTick, VenueAdapter};
pub use multiplexer::{Batch, Multiplexer, MultiplexerError};
