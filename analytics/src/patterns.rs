//! Microstructure pattern detection over the 60-second window.
//!
//! Detectors are pure; the processor owns the "at least 60s of data"
//! gate, appends results to the pattern log, and applies duplicate
//! suppression there. Patterns come back in kind-alphabetical order
//! (absorption, iceberg, momentum_shift, stacking), bid before ask
//! within a kind.

use corelib::models::{
    round_to_tick, Direction, Pattern, PatternKind, Quote, Side, Strength, WindowMetrics,
};

use crate::{side_label, side_price, side_size};

/// Absorption: a price holding within one tick for at least this long.
const ABSORPTION_MIN_SPAN_MS: u64 = 15_000;
const ABSORPTION_MIN_MEAN: f64 = 8_000.0;
const ABSORPTION_STRONG_MEAN: f64 = 20_000.0;
const ABSORPTION_MODERATE_MEAN: f64 = 12_000.0;

/// Stacking: consecutive non-decreasing sizes, each at least the floor.
const STACKING_MIN_RUN: usize = 5;
const STACKING_MIN_SIZE: u64 = 5_000;
const STACKING_STRONG_SIZE: u64 = 15_000;
const STACKING_MODERATE_SIZE: u64 = 10_000;

/// Iceberg/sweep: one-step size change above this without the price
/// following through.
const ICEBERG_SIZE_THRESHOLD: u64 = 15_000;

pub fn detect_patterns(
    quotes: &[Quote],
    metrics: &WindowMetrics,
    tick_size: f64,
    now_ms: u64,
) -> Vec<Pattern> {
    let mut out = Vec::new();
    for side in Side::BOTH {
        out.extend(detect_absorption(quotes, side, tick_size, now_ms));
    }
    out.extend(detect_iceberg(quotes, tick_size, now_ms));
    out.extend(detect_momentum_shift(metrics, now_ms));
    for side in Side::BOTH {
        out.extend(detect_stacking(quotes, side, now_ms));
    }
    out
}

/// Contiguous run of at least 15s where the side's price varies by less
/// than one tick and its mean displayed size exceeds 8 000. The first
/// qualifying run wins.
pub fn detect_absorption(
    quotes: &[Quote],
    side: Side,
    tick_size: f64,
    now_ms: u64,
) -> Option<Pattern> {
    if quotes.is_empty() {
        return None;
    }

    let mut start = 0usize;
    let mut lo = side_price(&quotes[0], side);
    let mut hi = lo;

    let check = |start: usize, end: usize| -> Option<Pattern> {
        let run = &quotes[start..end];
        let span = run.last()?.ts_ms.saturating_sub(run.first()?.ts_ms);
        if span < ABSORPTION_MIN_SPAN_MS {
            return None;
        }
        let total: u64 = run.iter().map(|q| side_size(q, side)).sum();
        let mean = total as f64 / run.len() as f64;
        if mean <= ABSORPTION_MIN_MEAN {
            return None;
        }
        let strength = if mean > ABSORPTION_STRONG_MEAN {
            Strength::Strong
        } else if mean > ABSORPTION_MODERATE_MEAN {
            Strength::Moderate
        } else {
            Strength::Weak
        };
        let price_level = round_to_tick(side_price(&run[0], side), tick_size);
        Some(Pattern {
            kind: PatternKind::Absorption,
            side: Some(side),
            strength,
            ts_ms: now_ms,
            price_level: Some(price_level),
            volume: Some(total),
            levels: None,
            direction: None,
            description: format!(
                "{} absorption at {:.2} with avg size {}",
                side_label(side),
                price_level,
                mean as u64
            ),
        })
    };

    for i in 1..quotes.len() {
        let p = side_price(&quotes[i], side);
        let new_lo = lo.min(p);
        let new_hi = hi.max(p);
        if new_hi - new_lo >= tick_size {
            if let Some(found) = check(start, i) {
                return Some(found);
            }
            start = i;
            lo = p;
            hi = p;
        } else {
            lo = new_lo;
            hi = new_hi;
        }
    }
    check(start, quotes.len())
}

/// At least 5 consecutive quotes with the side's size non-decreasing and
/// each at least 5 000. One-sided quotes break the run. The first run to
/// reach length 5 is extended to its maximal length and emitted.
pub fn detect_stacking(quotes: &[Quote], side: Side, now_ms: u64) -> Option<Pattern> {
    let mut run: Vec<u64> = Vec::new();

    let emit = |run: &[u64]| -> Option<Pattern> {
        if run.len() < STACKING_MIN_RUN {
            return None;
        }
        let last = *run.last()?;
        let strength = if last >= STACKING_STRONG_SIZE {
            Strength::Strong
        } else if last >= STACKING_MODERATE_SIZE {
            Strength::Moderate
        } else {
            Strength::Weak
        };
        Some(Pattern {
            kind: PatternKind::Stacking,
            side: Some(side),
            strength,
            ts_ms: now_ms,
            price_level: None,
            volume: Some(last),
            levels: Some(run.len() as u32),
            direction: None,
            description: format!(
                "{} stacking across {} quotes up to size {}",
                side_label(side),
                run.len(),
                last
            ),
        })
    };

    for q in quotes {
        if q.is_one_sided() {
            if let Some(p) = emit(&run) {
                return Some(p);
            }
            run.clear();
            continue;
        }
        let size = side_size(q, side);
        let extends = size >= STACKING_MIN_SIZE && run.last().map_or(true, |prev| size >= *prev);
        if extends {
            run.push(size);
        } else {
            if let Some(p) = emit(&run) {
                return Some(p);
            }
            run.clear();
            if size >= STACKING_MIN_SIZE {
                run.push(size);
            }
        }
    }
    emit(&run)
}

/// Lift/drop imbalance across both sides of the book. Bullish when bid
/// lifts dominate, bearish when ask drops do.
pub fn detect_momentum_shift(metrics: &WindowMetrics, now_ms: u64) -> Option<Pattern> {
    let dominant = metrics.bid_lifts.max(metrics.ask_drops);
    let opposing = metrics.bid_drops.min(metrics.ask_lifts).max(1);
    if dominant < 2 * opposing {
        return None;
    }

    let ratio = dominant as f64 / opposing as f64;
    let strength = if ratio >= 4.0 {
        Strength::Strong
    } else if ratio >= 3.0 {
        Strength::Moderate
    } else {
        Strength::Weak
    };
    let direction = if metrics.bid_lifts >= metrics.ask_drops {
        Direction::Bullish
    } else {
        Direction::Bearish
    };
    let description = match direction {
        Direction::Bullish => format!(
            "Bullish momentum: {} lifts vs {} drops",
            metrics.bid_lifts, metrics.bid_drops
        ),
        Direction::Bearish => format!(
            "Bearish momentum: {} drops vs {} lifts",
            metrics.ask_drops, metrics.ask_lifts
        ),
    };

    Some(Pattern {
        kind: PatternKind::MomentumShift,
        side: None,
        strength,
        ts_ms: now_ms,
        price_level: None,
        volume: None,
        levels: None,
        direction: Some(direction),
        description,
    })
}

/// Adjacent pair where one side's displayed size jumps by more than
/// 15 000 without that side's price moving more than two ticks. Read as
/// hidden-size execution; the first hit wins, bid checked before ask.
pub fn detect_iceberg(quotes: &[Quote], tick_size: f64, now_ms: u64) -> Option<Pattern> {
    for pair in quotes.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        for side in Side::BOTH {
            let delta = side_size(curr, side).abs_diff(side_size(prev, side));
            let price_move = (side_price(curr, side) - side_price(prev, side)).abs();
            if delta > ICEBERG_SIZE_THRESHOLD && price_move <= 2.0 * tick_size + 1e-9 {
                let price_level = round_to_tick(side_price(curr, side), tick_size);
                let strength = if delta >= 2 * ICEBERG_SIZE_THRESHOLD {
                    Strength::Strong
                } else if delta * 2 >= 3 * ICEBERG_SIZE_THRESHOLD {
                    Strength::Moderate
                } else {
                    Strength::Weak
                };
                return Some(Pattern {
                    kind: PatternKind::Iceberg,
                    side: Some(side),
                    strength,
                    ts_ms: now_ms,
                    price_level: Some(price_level),
                    volume: Some(delta),
                    levels: None,
                    direction: None,
                    description: format!(
                        "{} size moved {} at {:.2} without price follow-through",
                        side_label(side),
                        delta,
                        price_level
                    ),
                });
            }
        }
    }
    None
}
