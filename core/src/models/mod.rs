pub mod behavior;
pub mod level;
pub mod metrics;
pub mod pattern;
pub mod quote;

pub use behavior::BehaviorFlags;
pub use level::PriceLevel;
pub use metrics::{SizeTrend, SpreadTrend, Window, WindowMetrics};
pub use pattern::{Direction, Pattern, PatternKind, Side, Strength};
pub use quote::Quote;

/// Round a price to 4 decimal places, the precision every price field
/// carries at computation and rendering boundaries.
pub fn round_price(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Round a price to the ticker's minimum tick.
pub fn round_to_tick(price: f64, tick_size: f64) -> f64 {
    if tick_size <= 0.0 {
        return round_price(price);
    }
    round_price((price / tick_size).round() * tick_size)
}
