// ============================================================================
// Rounding Modes
// Named rounding modes and their mapping onto rust_decimal strategies
// ============================================================================

use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest scale a `Decimal` can carry.
pub const MAX_DECIMAL_PLACES: u32 = 28;

/// Named rounding mode, persisted alongside every calculated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RoundingMode {
    /// 2.5 -> 3, -2.5 -> -3
    #[default]
    HalfUp,
    /// Banker's rounding: 2.5 -> 2, 3.5 -> 4
    HalfEven,
    /// 2.5 -> 2, -2.5 -> -2
    HalfDown,
    /// Truncate toward zero
    Down,
    /// Away from zero
    Up,
    /// Toward negative infinity
    Floor,
    /// Toward positive infinity
    Ceiling,
}

impl RoundingMode {
    pub fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::HalfDown => RoundingStrategy::MidpointTowardZero,
            RoundingMode::Down => RoundingStrategy::ToZero,
            RoundingMode::Up => RoundingStrategy::AwayFromZero,
            RoundingMode::Floor => RoundingStrategy::ToNegativeInfinity,
            RoundingMode::Ceiling => RoundingStrategy::ToPositiveInfinity,
        }
    }

    /// Round `value` to exactly `decimal_places` digits.
    ///
    /// The result always carries the requested scale, so `40` rounded to 6
    /// places renders as `40.000000`.
    pub fn apply(self, value: Decimal, decimal_places: u32) -> Decimal {
        let places = decimal_places.min(MAX_DECIMAL_PLACES);
        let mut rounded = value.round_dp_with_strategy(places, self.strategy());
        // scale is now <= places, so rescale only pads zeros
        rounded.rescale(places);
        rounded
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoundingMode::HalfUp => "half_up",
            RoundingMode::HalfEven => "half_even",
            RoundingMode::HalfDown => "half_down",
            RoundingMode::Down => "down",
            RoundingMode::Up => "up",
            RoundingMode::Floor => "floor",
            RoundingMode::Ceiling => "ceiling",
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "half_up" => Ok(RoundingMode::HalfUp),
            "half_even" | "bankers" => Ok(RoundingMode::HalfEven),
            "half_down" => Ok(RoundingMode::HalfDown),
            "down" | "truncate" => Ok(RoundingMode::Down),
            "up" => Ok(RoundingMode::Up),
            "floor" => Ok(RoundingMode::Floor),
            "ceiling" => Ok(RoundingMode::Ceiling),
            other => Err(format!("unknown rounding mode: {}", other)),
        }
    }
}
