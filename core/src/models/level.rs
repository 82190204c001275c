use serde::{Deserialize, Serialize};

/// Weighted score of a resting price on one side of the book.
///
/// Only prices seen at least 3 times with at least 25 000 total size
/// within the rolling 5-minute window qualify.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Rounded to the ticker's minimum tick.
    pub price: f64,
    pub appearances: u32,
    pub total_size: u64,
    pub last_seen_ms: u64,
}

impl PriceLevel {
    /// Size-weighted, log-dampened appearance score. Strictly monotonic in
    /// both size and appearances.
    pub fn significance(&self) -> f64 {
        self.total_size as f64 * (1.0 + self.appearances as f64).ln()
    }
}
