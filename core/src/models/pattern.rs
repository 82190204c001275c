use serde::{Deserialize, Serialize};

/// Book side. Patterns that concern neither side (momentum shifts) carry
/// `None` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    pub const fn as_str(self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }

    pub const BOTH: [Side; 2] = [Side::Bid, Side::Ask];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PatternKind {
    Absorption,
    Iceberg,
    MomentumShift,
    Stacking,
    Sweep,
}

impl PatternKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            PatternKind::Absorption => "absorption",
            PatternKind::Iceberg => "iceberg",
            PatternKind::MomentumShift => "momentum_shift",
            PatternKind::Stacking => "stacking",
            PatternKind::Sweep => "sweep",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strength {
    Weak,
    Moderate,
    Strong,
}

impl Strength {
    pub const fn as_str(self) -> &'static str {
        match self {
            Strength::Weak => "weak",
            Strength::Moderate => "moderate",
            Strength::Strong => "strong",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Bullish => "bullish",
            Direction::Bearish => "bearish",
        }
    }
}

/// Discrete microstructure event appended to the per-ticker pattern log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub kind: PatternKind,
    pub side: Option<Side>,
    pub strength: Strength,
    pub ts_ms: u64,
    pub price_level: Option<f64>,
    /// Kind-specific volume: absorption = summed run size, stacking = last
    /// run size, iceberg/sweep = the size that moved.
    pub volume: Option<u64>,
    /// Stacking only: length of the non-decreasing run.
    pub levels: Option<u32>,
    /// Momentum shift only.
    pub direction: Option<Direction>,
    pub description: String,
}

impl Pattern {
    /// Identity used for duplicate suppression: two patterns with the same
    /// key within the suppression window collapse to one occurrence.
    pub fn suppression_key(&self) -> (PatternKind, Option<Side>, Option<i64>) {
        let cents = self.price_level.map(|p| (p * 100.0).round() as i64);
        (self.kind, self.side, cents)
    }
}
