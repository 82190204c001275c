//! Market-behavior flags over the 60-second window.

use corelib::models::{BehaviorFlags, Quote, SizeTrend, WindowMetrics};

/// Minimum qualifying transitions among the last ten for the stacking and
/// pulling flags.
const MIN_TRANSITIONS: usize = 3;

/// Lift/drop imbalance required before momentum is considered.
const MOMENTUM_LIFT_RATIO: f64 = 1.5;

/// Ticker-independent velocity floor: one thousandth of a price unit per
/// second of bid movement.
const MOMENTUM_VELOCITY_FLOOR: f64 = 0.001;

/// Recent ten-quote mean spread must sit at least this far below the
/// prior ten-quote mean.
const TIGHTENING_RATIO: f64 = 0.9;

/// Price move that counts as an aggression indicator on its own.
const AGGRESSION_PRICE_MOVE: f64 = 0.05;

/// Evaluate all behavior flags from the 60s metrics record and the most
/// recent quotes (the caller passes the last 20). Each rule is evaluated
/// independently; none carries state between ticks.
pub fn analyze_behaviors(quotes: &[Quote], metrics: &WindowMetrics) -> BehaviorFlags {
    BehaviorFlags {
        bid_stacking: check_bid_stacking(quotes),
        ask_pulling: check_ask_pulling(quotes),
        spread_tightening: check_spread_tightening(quotes),
        momentum_building: check_momentum_building(metrics),
        aggressive_buying: check_aggressive_buying(metrics),
        aggressive_selling: check_aggressive_selling(metrics),
    }
}

/// At least 3 of the last 10 transitions grew the displayed bid while the
/// bid price held or improved. One-sided quotes are excluded from
/// stacking evaluation.
fn check_bid_stacking(quotes: &[Quote]) -> bool {
    let two_sided: Vec<&Quote> = quotes.iter().filter(|q| q.bid_size > 0).collect();
    let tail = last_n(&two_sided, 11);
    tail.windows(2)
        .filter(|w| w[1].bid_size > w[0].bid_size && w[1].bid_price >= w[0].bid_price)
        .count()
        >= MIN_TRANSITIONS
}

/// At least 3 of the last 10 transitions shrank the displayed ask while
/// the ask price rose or held.
fn check_ask_pulling(quotes: &[Quote]) -> bool {
    let sided: Vec<&Quote> = quotes.iter().filter(|q| q.ask_size > 0).collect();
    let tail = last_n(&sided, 11);
    tail.windows(2)
        .filter(|w| w[1].ask_size < w[0].ask_size && w[1].ask_price >= w[0].ask_price)
        .count()
        >= MIN_TRANSITIONS
}

/// Mean spread of the last 10 quotes at least 10% below the mean of the
/// prior 10. Needs 20 quotes; fewer means no signal.
fn check_spread_tightening(quotes: &[Quote]) -> bool {
    if quotes.len() < 20 {
        return false;
    }
    let tail = &quotes[quotes.len() - 20..];
    let prior: f64 = tail[..10].iter().map(Quote::spread).sum::<f64>() / 10.0;
    let recent: f64 = tail[10..].iter().map(Quote::spread).sum::<f64>() / 10.0;
    prior > 0.0 && recent <= prior * TIGHTENING_RATIO
}

/// Lifts dominate drops and the bid is actually travelling. The velocity
/// term is taken from the bid price change over the window, measured in
/// price units per second.
fn check_momentum_building(metrics: &WindowMetrics) -> bool {
    let ratio = metrics.bid_lifts as f64 / metrics.bid_drops.max(1) as f64;
    let bid_velocity = metrics.bid_price_change.abs() / metrics.window.seconds() as f64;
    ratio > MOMENTUM_LIFT_RATIO && bid_velocity > MOMENTUM_VELOCITY_FLOOR
}

/// Two or more of: ask lifts dominating, repeated large bids, bid size
/// accelerating, bid price travelling up.
fn check_aggressive_buying(metrics: &WindowMetrics) -> bool {
    let mut indicators = 0;
    if metrics.ask_lifts > metrics.ask_drops * 2 {
        indicators += 1;
    }
    if metrics.large_bid_count > 3 {
        indicators += 1;
    }
    if metrics.bid_size_acceleration == SizeTrend::Increasing {
        indicators += 1;
    }
    if metrics.bid_price_change > AGGRESSION_PRICE_MOVE {
        indicators += 1;
    }
    indicators >= 2
}

/// Mirror of aggressive buying on the sell side.
fn check_aggressive_selling(metrics: &WindowMetrics) -> bool {
    let mut indicators = 0;
    if metrics.bid_drops > metrics.bid_lifts * 2 {
        indicators += 1;
    }
    if metrics.large_ask_count > 3 {
        indicators += 1;
    }
    if metrics.ask_size_acceleration == SizeTrend::Increasing {
        indicators += 1;
    }
    if metrics.bid_price_change < -AGGRESSION_PRICE_MOVE {
        indicators += 1;
    }
    indicators >= 2
}

fn last_n<'a>(quotes: &'a [&'a Quote], n: usize) -> &'a [&'a Quote] {
    &quotes[quotes.len().saturating_sub(n)..]
}
