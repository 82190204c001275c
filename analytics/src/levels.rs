//! Significant price-level tracking over the 5-minute window.

use std::collections::HashMap;

use corelib::models::{
    round_price, Pattern, PatternKind, PriceLevel, Quote, Side, Strength,
};

use crate::{side_label, side_price, side_size};

/// A price qualifies only with this many appearances and this much total
/// size inside the rolling window.
const MIN_APPEARANCES: u32 = 3;
const MIN_TOTAL_SIZE: u64 = 25_000;

/// Levels kept per side after ranking by significance.
const MAX_LEVELS: usize = 10;

/// Previously ranked levels eligible for sweep detection.
const SWEEP_WATCH_DEPTH: usize = 5;

/// Rebuild the side's level table from the 5-minute quote window: group
/// by tick-rounded price, keep qualifying groups, rank by significance
/// descending (price descending on ties) and retain the top 10.
pub fn compute_levels(quotes: &[Quote], side: Side, tick_size: f64) -> Vec<PriceLevel> {
    let mut groups: HashMap<i64, PriceLevel> = HashMap::new();

    for q in quotes {
        let size = side_size(q, side);
        if size == 0 {
            continue;
        }
        let price = side_price(q, side);
        if price <= 0.0 {
            continue;
        }
        let key = (price / tick_size).round() as i64;
        let entry = groups.entry(key).or_insert_with(|| PriceLevel {
            price: round_price(key as f64 * tick_size),
            appearances: 0,
            total_size: 0,
            last_seen_ms: 0,
        });
        entry.appearances += 1;
        entry.total_size += size;
        entry.last_seen_ms = entry.last_seen_ms.max(q.ts_ms);
    }

    let mut levels: Vec<PriceLevel> = groups
        .into_values()
        .filter(|l| l.appearances >= MIN_APPEARANCES && l.total_size >= MIN_TOTAL_SIZE)
        .collect();

    levels.sort_by(|a, b| {
        b.significance()
            .partial_cmp(&a.significance())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.price
                    .partial_cmp(&a.price)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    levels.truncate(MAX_LEVELS);
    levels
}

/// Compare the previous tick's table with the fresh one: a top-5 level
/// whose size fell by more than 75% (or vanished) between consecutive
/// ticks is read as swept and reported into the pattern log.
pub fn detect_level_sweeps(
    previous: &[PriceLevel],
    current: &[PriceLevel],
    side: Side,
    now_ms: u64,
) -> Vec<Pattern> {
    let mut out = Vec::new();

    for prev in previous.iter().take(SWEEP_WATCH_DEPTH) {
        let key = (prev.price * 10_000.0).round() as i64;
        let remaining = current
            .iter()
            .find(|c| (c.price * 10_000.0).round() as i64 == key)
            .map(|c| c.total_size)
            .unwrap_or(0);

        if remaining.saturating_mul(4) < prev.total_size {
            out.push(Pattern {
                kind: PatternKind::Sweep,
                side: Some(side),
                strength: Strength::Strong,
                ts_ms: now_ms,
                price_level: Some(prev.price),
                volume: Some(prev.total_size - remaining),
                levels: None,
                direction: None,
                description: format!(
                    "{} level {:.2} swept, size {} down to {}",
                    side_label(side),
                    prev.price,
                    prev.total_size,
                    remaining
                ),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::q;

    const TICK: f64 = 0.01;

    fn level(price: f64, appearances: u32, total_size: u64) -> PriceLevel {
        PriceLevel {
            price,
            appearances,
            total_size,
            last_seen_ms: 0,
        }
    }

    #[test]
    fn grouping_requires_appearances_and_size() {
        let mut quotes = Vec::new();
        // 449.50 seen 4 times with 40k total: qualifies.
        for i in 0..4 {
            quotes.push(q(i, 449.50, 449.60, 10_000, 2_000));
        }
        // 449.40 seen twice with plenty of size: appearance floor fails.
        for i in 4..6 {
            quotes.push(q(i, 449.40, 449.60, 30_000, 2_000));
        }
        // 449.30 seen often but thin: size floor fails.
        for i in 6..12 {
            quotes.push(q(i, 449.30, 449.60, 1_000, 2_000));
        }

        let levels = compute_levels(&quotes, Side::Bid, TICK);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].price, 449.50);
        assert_eq!(levels[0].appearances, 4);
        assert_eq!(levels[0].total_size, 40_000);
        assert_eq!(levels[0].last_seen_ms, 3_000);
    }

    #[test]
    fn ranking_keeps_top_ten_by_significance() {
        let mut quotes = Vec::new();
        for (rank, cents) in (0..12).enumerate() {
            let price = 450.00 - cents as f64 * 0.01;
            let size = 30_000 + 1_000 * (12 - rank as u64);
            for i in 0..3 {
                quotes.push(q((cents * 3 + i) as u64, price, 450.20, size, 2_000));
            }
        }

        let levels = compute_levels(&quotes, Side::Bid, TICK);
        assert_eq!(levels.len(), 10);
        // Highest total size first; all appearances equal.
        assert!(levels[0].total_size > levels[9].total_size);
    }

    #[test]
    fn significance_is_monotonic_in_size_and_appearances() {
        let a = level(450.00, 5, 50_000);
        let b = level(450.00, 4, 40_000);
        assert!(a.significance() > b.significance());
    }

    #[test]
    fn sweep_detected_when_top_level_vanishes() {
        let prev = vec![level(450.00, 6, 80_000), level(449.95, 4, 40_000)];
        let curr = vec![level(449.95, 4, 40_000)];

        let sweeps = detect_level_sweeps(&prev, &curr, Side::Bid, 1_000);
        assert_eq!(sweeps.len(), 1);
        assert_eq!(sweeps[0].kind, PatternKind::Sweep);
        assert_eq!(sweeps[0].price_level, Some(450.00));
        assert_eq!(sweeps[0].volume, Some(80_000));
    }

    #[test]
    fn sweep_needs_a_deep_enough_drop() {
        let prev = vec![level(450.00, 6, 80_000)];
        // 30% remaining: above the 25% cutoff, not a sweep.
        let curr = vec![level(450.00, 7, 24_000)];
        assert!(detect_level_sweeps(&prev, &curr, Side::Bid, 1_000).is_empty());

        // 20% remaining: swept.
        let curr = vec![level(450.00, 7, 16_000)];
        let sweeps = detect_level_sweeps(&prev, &curr, Side::Bid, 1_000);
        assert_eq!(sweeps.len(), 1);
        assert_eq!(sweeps[0].volume, Some(64_000));
    }

    #[test]
    fn sweep_ignores_levels_outside_the_top_five() {
        let mut prev: Vec<_> = (0..6)
            .map(|i| level(450.00 - i as f64 * 0.01, 5, 60_000 - i as u64 * 1_000))
            .collect();
        // Make the sixth the one that vanishes.
        prev[5].total_size = 55_500;
        let curr: Vec<PriceLevel> = prev[..5].to_vec();

        assert!(detect_level_sweeps(&prev, &curr, Side::Bid, 1_000).is_empty());
    }
}
