// Convert wire strings into validated (price, quantity) pairs.
// Anything that is not a positive finite price or a non-negative finite size is dropped.

use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct Normaliser;

impl Normaliser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_price(&self, s: &str) -> Option<f64> {
        s.trim().parse::<f64>().ok().filter(|p| p.is_finite() && *p > 0.0)
    }

    pub fn parse_size(&self, s: &str) -> Option<f64> {
        s.trim().parse::<f64>().ok().filter(|q| q.is_finite() && *q >= 0.0)
    }

    /// Normalise one side of the book, keeping wire order.
    pub fn normalise_side<'a, I>(&self, levels: I) -> Vec<(f64, f64)>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        levels
            .into_iter()
            .filter_map(|(px, sz)| match (self.parse_price(px), self.parse_size(sz)) {
                (Some(p), Some(q)) => Some((p, q)),
                _ => {
                    debug!(px, sz, "Dropping invalid level");
                    None
                }
            })
            .collect()
    }
}
