// Full-screen console table: bids on the left, asks on the right,
// outlier levels highlighted.

use super::Printer;
use crate::engine::book::OrderBook;
use crate::engine::types::Level;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use itertools::Itertools;
use std::io::{self, Write};
use tracing::warn;

const RULE: &str = "+--------------------------------------+--------------------------------------+";
// Width of one side's cell: three 10-wide columns and two " | " separators
const CELL_WIDTH: usize = 36;

pub struct ConsolePrinter {
    pair: String,
    level_count: usize,
    outliers_detection: f64,
}

impl ConsolePrinter {
    pub fn new(pair: &str, level_count: usize, outliers_detection: f64) -> Self {
        Self { pair: pair.to_string(), level_count, outliers_detection }
    }

    /// The frame drawn for `book`: always `level_count` rows, blank-padded
    /// on whichever side runs out of levels first.
    pub fn render(&self, book: &OrderBook) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Pair: {} | Outliers Detection: {} | Level Count: {}\n",
            self.pair, self.outliers_detection, self.level_count
        ));
        out.push_str(RULE);
        out.push('\n');
        out.push_str("|                BIDS                  |                ASKS                  |\n");
        out.push_str(RULE);
        out.push('\n');
        out.push_str("|   Z-Score  |   Price    |  Quantity  |    Price   |  Quantity  |   Z-Score  |\n");

        let rows = (0..self.level_count)
            .map(|i| {
                let bid = book.bids().get(i).map_or_else(blank_cell, |l| self.bid_cell(l));
                let ask = book.asks().get(i).map_or_else(blank_cell, |l| self.ask_cell(l));
                format!("| {bid} | {ask} |")
            })
            .join("\n");
        out.push_str(&rows);
        if self.level_count > 0 {
            out.push('\n');
        }
        out.push_str(RULE);
        out.push('\n');
        out
    }

    fn bid_cell(&self, level: &Level) -> String {
        let (z, px, qty) = columns(level);
        if level.is_outlier(self.outliers_detection) {
            format!("{z} | {px} | {qty}").black().on_white().to_string()
        } else {
            format!("{} | {} | {}", z.white(), px.green(), qty.green())
        }
    }

    fn ask_cell(&self, level: &Level) -> String {
        let (z, px, qty) = columns(level);
        if level.is_outlier(self.outliers_detection) {
            format!("{px} | {qty} | {z}").black().on_white().to_string()
        } else {
            format!("{} | {} | {}", px.red(), qty.red(), z.white())
        }
    }
}

fn columns(level: &Level) -> (String, String, String) {
    (
        format!("{:10.2}", level.zscore()),
        format!("{:10.2}", level.price()),
        format!("{:10.6}", level.quantity()),
    )
}

fn blank_cell() -> String {
    " ".repeat(CELL_WIDTH)
}

impl Printer for ConsolePrinter {
    fn print(&self, book: OrderBook) {
        let frame = self.render(&book);
        let mut stdout = io::stdout().lock();
        let drawn = execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))
            .and_then(|_| stdout.write_all(frame.as_bytes()))
            .and_then(|_| stdout.flush());
        if let Err(e) = drawn {
            warn!(error = %e, "Failed to draw order book");
        }
    }
}
