//! Momentum and size-dynamics metrics over a quote window.

use corelib::models::{round_price, Quote, SizeTrend, SpreadTrend, Window, WindowMetrics};

/// Second-half mean must exceed first-half mean by this factor to count
/// as INCREASING (and fall below its inverse-side factor for DECREASING).
const ACCEL_UP_FACTOR: f64 = 1.2;
const ACCEL_DOWN_FACTOR: f64 = 0.8;

/// Recent-vs-older spread means must diverge by 20% to leave STABLE.
const SPREAD_TREND_FACTOR: f64 = 0.2;
const SPREAD_TREND_RECENT: usize = 5;

/// Compute the full metrics record for one (ticker, window) pair.
///
/// Requires at least 2 quotes; with fewer the record comes back flagged
/// `insufficient_data` with zero-valued numerics. Lifts and drops are
/// counted on adjacent pairs only; an equal-price transition counts as
/// neither.
pub fn compute_window_metrics(
    quotes: &[Quote],
    window: Window,
    large_size_threshold: u64,
) -> WindowMetrics {
    let n = quotes.len();
    if n < 2 {
        return WindowMetrics::insufficient(window, n);
    }

    let first = &quotes[0];
    let last = &quotes[n - 1];
    let seconds = window.seconds() as f64;

    let mut bid_lifts = 0u32;
    let mut bid_drops = 0u32;
    let mut ask_lifts = 0u32;
    let mut ask_drops = 0u32;
    for pair in quotes.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        if curr.bid_price > prev.bid_price {
            bid_lifts += 1;
        } else if curr.bid_price < prev.bid_price {
            bid_drops += 1;
        }
        if curr.ask_price > prev.ask_price {
            ask_lifts += 1;
        } else if curr.ask_price < prev.ask_price {
            ask_drops += 1;
        }
    }

    let bid_size_change = last.bid_size as i64 - first.bid_size as i64;
    let ask_size_change = last.ask_size as i64 - first.ask_size as i64;

    let (avg_spread, min_spread, max_spread, spread_trend) = spread_stats(quotes);

    WindowMetrics {
        window,
        quote_count: n,
        insufficient_data: false,
        bid_price_change: round_price(last.bid_price - first.bid_price),
        ask_price_change: round_price(last.ask_price - first.ask_price),
        bid_size_change,
        ask_size_change,
        bid_lifts,
        bid_drops,
        ask_lifts,
        ask_drops,
        avg_bid_size: positive_mean(quotes.iter().map(|q| q.bid_size)),
        avg_ask_size: positive_mean(quotes.iter().map(|q| q.ask_size)),
        large_bid_count: quotes
            .iter()
            .filter(|q| q.bid_size > large_size_threshold)
            .count() as u32,
        large_ask_count: quotes
            .iter()
            .filter(|q| q.ask_size > large_size_threshold)
            .count() as u32,
        bid_size_acceleration: size_acceleration(quotes.iter().map(|q| q.bid_size)),
        ask_size_acceleration: size_acceleration(quotes.iter().map(|q| q.ask_size)),
        quotes_per_second: n as f64 / seconds,
        price_velocity: (last.mid() - first.mid()).abs() / seconds,
        size_turnover: (bid_size_change.abs() + ask_size_change.abs()) as f64 / seconds,
        avg_spread,
        min_spread,
        max_spread,
        spread_trend,
    }
}

/// Arithmetic mean restricted to positive sizes; 0 when none qualify.
fn positive_mean(sizes: impl Iterator<Item = u64>) -> u64 {
    let mut sum = 0u64;
    let mut count = 0u64;
    for s in sizes.filter(|s| *s > 0) {
        sum += s;
        count += 1;
    }
    if count == 0 {
        0
    } else {
        sum / count
    }
}

/// Split the window in halves and compare mean sizes. The comparison is
/// done by cross-multiplication so an empty-ish first half never divides.
fn size_acceleration(sizes: impl Iterator<Item = u64>) -> SizeTrend {
    let sizes: Vec<u64> = sizes.collect();
    let mid = sizes.len() / 2;
    if mid == 0 || mid == sizes.len() {
        return SizeTrend::Stable;
    }

    let first_mean = sizes[..mid].iter().sum::<u64>() as f64 / mid as f64;
    let second_mean = sizes[mid..].iter().sum::<u64>() as f64 / (sizes.len() - mid) as f64;

    if second_mean > first_mean * ACCEL_UP_FACTOR {
        SizeTrend::Increasing
    } else if second_mean < first_mean * ACCEL_DOWN_FACTOR {
        SizeTrend::Decreasing
    } else {
        SizeTrend::Stable
    }
}

fn spread_stats(quotes: &[Quote]) -> (f64, f64, f64, SpreadTrend) {
    let spreads: Vec<f64> = quotes
        .iter()
        .filter(|q| q.bid_price > 0.0 && q.ask_price > 0.0)
        .map(Quote::spread)
        .collect();
    if spreads.is_empty() {
        return (0.0, 0.0, 0.0, SpreadTrend::Stable);
    }

    let avg = spreads.iter().sum::<f64>() / spreads.len() as f64;
    let min = spreads.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = spreads.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let trend = if spreads.len() > SPREAD_TREND_RECENT {
        let split = spreads.len() - SPREAD_TREND_RECENT;
        let older = spreads[..split].iter().sum::<f64>() / split as f64;
        let recent = spreads[split..].iter().sum::<f64>() / SPREAD_TREND_RECENT as f64;
        if recent < older * (1.0 - SPREAD_TREND_FACTOR) {
            SpreadTrend::Tightening
        } else if recent > older * (1.0 + SPREAD_TREND_FACTOR) {
            SpreadTrend::Widening
        } else {
            SpreadTrend::Stable
        }
    } else {
        SpreadTrend::Stable
    };

    (round_price(avg), round_price(min), round_price(max), trend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::q;

    #[test]
    fn fewer_than_two_quotes_is_insufficient() {
        let quotes = vec![q(0, 450.0, 450.05, 1000, 1000)];
        let m = compute_window_metrics(&quotes, Window::TenSec, 10_000);

        assert!(m.insufficient_data);
        assert_eq!(m.quote_count, 1);
        assert_eq!(m.bid_lifts, 0);
        assert_eq!(m.price_velocity, 0.0);
    }

    #[test]
    fn lifts_drops_and_unchanged_partition_transitions() {
        // bid path: up, up, flat, down, up => 3 lifts, 1 drop, 1 unchanged
        let bids = [450.00, 450.01, 450.02, 450.02, 450.01, 450.02];
        let quotes: Vec<_> = bids
            .iter()
            .enumerate()
            .map(|(i, b)| q(i as u64, *b, b + 0.05, 1000, 1000))
            .collect();

        let m = compute_window_metrics(&quotes, Window::TenSec, 10_000);
        assert_eq!(m.bid_lifts, 3);
        assert_eq!(m.bid_drops, 1);

        let unchanged = (quotes.len() as u32 - 1) - m.bid_lifts - m.bid_drops;
        assert_eq!(m.bid_lifts + m.bid_drops + unchanged, quotes.len() as u32 - 1);
    }

    #[test]
    fn quotes_per_second_recovers_quote_count() {
        let quotes: Vec<_> = (0..37).map(|i| q(i, 450.0, 450.05, 1000, 1000)).collect();
        let m = compute_window_metrics(&quotes, Window::OneMin, 10_000);

        let recovered = (m.quotes_per_second * m.window.seconds() as f64).round() as usize;
        assert!(recovered.abs_diff(m.quote_count) <= 1);
    }

    #[test]
    fn average_size_ignores_one_sided_quotes() {
        let quotes = vec![
            q(0, 450.0, 450.05, 1000, 0),
            q(1, 450.0, 450.05, 2000, 500),
            q(2, 450.0, 450.05, 0, 500),
        ];
        let m = compute_window_metrics(&quotes, Window::TenSec, 10_000);

        assert_eq!(m.avg_bid_size, 1500);
        assert_eq!(m.avg_ask_size, 500);
    }

    #[test]
    fn acceleration_increasing_when_second_half_dominates() {
        let quotes: Vec<_> = (0..10)
            .map(|i| q(i, 450.0, 450.05, 1000 + i * 300, 1000))
            .collect();
        let m = compute_window_metrics(&quotes, Window::TenSec, 10_000);

        assert_eq!(m.bid_size_acceleration, SizeTrend::Increasing);
        assert_eq!(m.ask_size_acceleration, SizeTrend::Stable);
    }

    #[test]
    fn acceleration_decreasing_when_sizes_collapse() {
        let quotes: Vec<_> = (0..10)
            .map(|i| q(i, 450.0, 450.05, 1000, 4000 - i * 350))
            .collect();
        let m = compute_window_metrics(&quotes, Window::TenSec, 10_000);

        assert_eq!(m.ask_size_acceleration, SizeTrend::Decreasing);
    }

    #[test]
    fn large_counts_use_strict_threshold() {
        let quotes = vec![
            q(0, 450.0, 450.05, 10_000, 10_001),
            q(1, 450.0, 450.05, 12_000, 9_999),
        ];
        let m = compute_window_metrics(&quotes, Window::TenSec, 10_000);

        assert_eq!(m.large_bid_count, 1);
        assert_eq!(m.large_ask_count, 1);
    }

    #[test]
    fn price_velocity_uses_mid_change_over_window_seconds() {
        let quotes = vec![q(0, 450.00, 450.10, 1000, 1000), q(9, 450.20, 450.30, 1000, 1000)];
        let m = compute_window_metrics(&quotes, Window::TenSec, 10_000);

        // mid moved 0.20 over a 10s window
        assert!((m.price_velocity - 0.02).abs() < 1e-12);
    }

    #[test]
    fn spread_trend_tightens_when_recent_spreads_shrink() {
        let mut quotes: Vec<_> = (0..10).map(|i| q(i, 450.00, 450.10, 1000, 1000)).collect();
        quotes.extend((10..15).map(|i| q(i, 450.00, 450.02, 1000, 1000)));

        let m = compute_window_metrics(&quotes, Window::OneMin, 10_000);
        assert_eq!(m.spread_trend, SpreadTrend::Tightening);
        assert!((m.min_spread - 0.02).abs() < 1e-9);
        assert!((m.max_spread - 0.10).abs() < 1e-9);
    }
}
