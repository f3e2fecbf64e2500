// src/utils/precision.rs
use rust_decimal::{Decimal, RoundingStrategy};

/// How an instrument stores its statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingPolicy {
    /// Keep whatever precision the source sent (crypto assets).
    Source,
    /// Round to a fixed number of decimal places (currency pairs use 2).
    /// Midpoints are exact decimals here, so 32.455 becomes 32.46 where a
    /// binary-float `toFixed(2)` gives 32.45.
    Fixed(u32),
}

impl RoundingPolicy {
    pub fn from_places(places: Option<u32>) -> Self {
        match places {
            Some(dp) => RoundingPolicy::Fixed(dp),
            None => RoundingPolicy::Source,
        }
    }

    pub fn apply(self, value: Decimal) -> Decimal {
        match self {
            RoundingPolicy::Source => value,
            RoundingPolicy::Fixed(dp) => round_to_places(value, dp),
        }
    }
}

/// Rounds to `dp` decimal places, halves away from zero.
/// Example: 32.455, dp=2 -> 32.46
pub fn round_to_places(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}
