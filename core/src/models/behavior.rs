use serde::{Deserialize, Serialize};

/// Per-ticker market-behavior flags, derived fresh each processor tick
/// from the 60-second window. No memory beyond the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BehaviorFlags {
    pub bid_stacking: bool,
    pub ask_pulling: bool,
    pub spread_tightening: bool,
    pub momentum_building: bool,
    pub aggressive_buying: bool,
    pub aggressive_selling: bool,
}
