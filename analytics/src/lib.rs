//! Stateless order-flow analytics.
//!
//! Every function here maps a quote slice (plus, where noted, a computed
//! metrics record) to a value; nothing suspends, nothing touches the
//! store, and every numeric pitfall is an explicit branch rather than a
//! panic. The processor loop owns scheduling and persistence.

pub mod behavior;
pub mod levels;
pub mod metrics;
pub mod patterns;

use corelib::models::{Quote, Side};

pub(crate) fn side_price(q: &Quote, side: Side) -> f64 {
    match side {
        Side::Bid => q.bid_price,
        Side::Ask => q.ask_price,
    }
}

pub(crate) fn side_size(q: &Quote, side: Side) -> u64 {
    match side {
        Side::Bid => q.bid_size,
        Side::Ask => q.ask_size,
    }
}

pub(crate) fn side_label(side: Side) -> &'static str {
    match side {
        Side::Bid => "Bid",
        Side::Ask => "Ask",
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use corelib::models::Quote;

    /// Quote at second `n` with the given book.
    pub fn q(n: u64, bid: f64, ask: f64, bid_size: u64, ask_size: u64) -> Quote {
        Quote {
            ticker: "SPY".to_string(),
            ts_ms: n * 1000,
            bid_price: bid,
            ask_price: ask,
            bid_size,
            ask_size,
        }
    }
}
