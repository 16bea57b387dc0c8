// Presentation sinks for scored books
use crate::engine::book::OrderBook;

pub mod console;

pub use console::ConsolePrinter;

/// Receives every successfully scored book, synchronously, in tick order.
pub trait Printer: Send + Sync {
    fn print(&self, book: OrderBook);
}
