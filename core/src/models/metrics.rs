use serde::{Deserialize, Serialize};

/// The fixed set of analysis windows, measured back from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    TenSec,
    OneMin,
    FiveMin,
}

impl Window {
    pub const fn seconds(self) -> u64 {
        match self {
            Window::TenSec => 10,
            Window::OneMin => 60,
            Window::FiveMin => 300,
        }
    }

    pub const fn ms(self) -> u64 {
        self.seconds() * 1000
    }

    /// Storage-slot label, also used in log fields.
    pub const fn slot(self) -> &'static str {
        match self {
            Window::TenSec => "10s",
            Window::OneMin => "1min",
            Window::FiveMin => "5min",
        }
    }

    /// A metrics record lives ten times its window duration.
    pub const fn metrics_ttl_seconds(self) -> u64 {
        self.seconds() * 10
    }
}

/// Half-over-half classification of displayed size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SizeTrend {
    Increasing,
    #[default]
    Stable,
    Decreasing,
}

impl SizeTrend {
    pub const fn as_str(self) -> &'static str {
        match self {
            SizeTrend::Increasing => "INCREASING",
            SizeTrend::Stable => "STABLE",
            SizeTrend::Decreasing => "DECREASING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpreadTrend {
    Tightening,
    #[default]
    Stable,
    Widening,
}

impl SpreadTrend {
    pub const fn as_str(self) -> &'static str {
        match self {
            SpreadTrend::Tightening => "TIGHTENING",
            SpreadTrend::Stable => "STABLE",
            SpreadTrend::Widening => "WIDENING",
        }
    }
}

/// Computed summary for one (ticker, window) pair.
///
/// Overwritten on every processor tick. `insufficient_data` marks a record
/// computed from fewer than two quotes; its numeric fields are all zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMetrics {
    pub window: Window,
    pub quote_count: usize,
    pub insufficient_data: bool,

    /// End minus start, 4-decimal precision.
    pub bid_price_change: f64,
    pub ask_price_change: f64,
    pub bid_size_change: i64,
    pub ask_size_change: i64,

    /// Adjacent-pair counters; equal-price transitions count as neither.
    pub bid_lifts: u32,
    pub bid_drops: u32,
    pub ask_lifts: u32,
    pub ask_drops: u32,

    /// Arithmetic mean over quotes where the side's size is positive.
    pub avg_bid_size: u64,
    pub avg_ask_size: u64,
    pub large_bid_count: u32,
    pub large_ask_count: u32,
    pub bid_size_acceleration: SizeTrend,
    pub ask_size_acceleration: SizeTrend,

    pub quotes_per_second: f64,
    /// |mid change| per second over the window.
    pub price_velocity: f64,
    /// (|net bid size change| + |net ask size change|) per second.
    pub size_turnover: f64,

    pub avg_spread: f64,
    pub min_spread: f64,
    pub max_spread: f64,
    pub spread_trend: SpreadTrend,
}

impl WindowMetrics {
    /// Record for a window that did not have enough quotes to derive from.
    pub fn insufficient(window: Window, quote_count: usize) -> Self {
        Self {
            window,
            quote_count,
            insufficient_data: true,
            bid_price_change: 0.0,
            ask_price_change: 0.0,
            bid_size_change: 0,
            ask_size_change: 0,
            bid_lifts: 0,
            bid_drops: 0,
            ask_lifts: 0,
            ask_drops: 0,
            avg_bid_size: 0,
            avg_ask_size: 0,
            large_bid_count: 0,
            large_ask_count: 0,
            bid_size_acceleration: SizeTrend::Stable,
            ask_size_acceleration: SizeTrend::Stable,
            quotes_per_second: 0.0,
            price_velocity: 0.0,
            size_turnover: 0.0,
            avg_spread: 0.0,
            min_spread: 0.0,
            max_spread: 0.0,
            spread_trend: SpreadTrend::Stable,
        }
    }
}
