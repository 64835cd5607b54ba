// ============================================================================
// Budget Tracking
// ============================================================================

use rust_decimal::Decimal;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where delivery stands against the expected-to-date target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PacingStatus {
    Behind,
    OnPace,
    Ahead,
}

impl PacingStatus {
    /// 100 is exactly on pace.
    pub fn from_percentage(pacing_percentage: Decimal) -> Self {
        let hundred = Decimal::ONE_HUNDRED;
        if pacing_percentage > hundred {
            PacingStatus::Ahead
        } else if pacing_percentage < hundred {
            PacingStatus::Behind
        } else {
            PacingStatus::OnPace
        }
    }
}

/// Spend tracking for a price or media budget.
///
/// `remaining_amount` is present exactly when both target and actual are,
/// and always equals `target_amount - actual_amount`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BudgetTracking {
    pub target_amount: Option<Decimal>,
    pub actual_amount: Option<Decimal>,
    pub remaining_amount: Option<Decimal>,
    pub pacing_percentage: Option<Decimal>,
}

impl BudgetTracking {
    pub fn pacing_status(&self) -> Option<PacingStatus> {
        self.pacing_percentage.map(PacingStatus::from_percentage)
    }

    pub fn is_overspent(&self) -> bool {
        self.remaining_amount
            .map(|remaining| remaining < Decimal::ZERO)
            .unwrap_or(false)
    }
}
