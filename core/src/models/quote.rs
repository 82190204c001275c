use serde::{Deserialize, Serialize};

/// Immutable top-of-book observation for one ticker at one timestamp.
///
/// Invariants: `bid_price > 0`, `ask_price >= bid_price`. A quote with
/// either size equal to zero is "one-sided": it participates in metrics
/// but is excluded from stacking evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Uppercase symbol, 1-10 alphanumeric characters.
    pub ticker: String,
    /// Milliseconds since the Unix epoch, monotonic per ticker.
    pub ts_ms: u64,
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: u64,
    pub ask_size: u64,
}

impl Quote {
    /// Mid-point of the spread.
    pub fn mid(&self) -> f64 {
        (self.bid_price + self.ask_price) / 2.0
    }

    /// Quoted spread; never negative for a well-formed quote.
    pub fn spread(&self) -> f64 {
        self.ask_price - self.bid_price
    }

    pub fn is_one_sided(&self) -> bool {
        self.bid_size == 0 || self.ask_size == 0
    }
}
