// ============================================================================
// Numeric Errors
// Error types for decimal parsing and formula evaluation
// ============================================================================

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors that can occur while parsing operands or evaluating a formula.
///
/// `InvalidDecimalFormat`, `FormulaArityError` and `Overflow` describe a
/// single malformed input and are reported per item by the bulk pipeline.
/// `UnknownFormula` and `UnknownVersion` are configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CalculationError {
    /// Input string could not be parsed as an exact decimal
    #[error("invalid decimal format: {raw:?}")]
    InvalidDecimalFormat { raw: String },

    /// Operand count does not match the formula's arity
    #[error("formula {formula} expects {expected} operands, got {actual}")]
    FormulaArityError {
        formula: String,
        expected: usize,
        actual: usize,
    },

    /// No formula with this name is registered for the active version
    #[error("unknown formula {formula} for calculation version {version}")]
    UnknownFormula { formula: String, version: String },

    /// No formula set is registered under this version
    #[error("no formulas registered for calculation version {version}")]
    UnknownVersion { version: String },

    /// Intermediate result exceeded the decimal range
    #[error("arithmetic overflow while evaluating {formula}")]
    Overflow { formula: String },
}

impl CalculationError {
    /// Configuration errors abort a bulk call instead of failing one item.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CalculationError::UnknownFormula { .. } | CalculationError::UnknownVersion { .. }
        )
    }
}

/// Result type alias for calculation operations
pub type CalculationResultOf<T> = Result<T, CalculationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CalculationError::InvalidDecimalFormat {
            raw: "12,5".to_string(),
        };
        assert_eq!(err.to_string(), "invalid decimal format: \"12,5\"");

        let err = CalculationError::FormulaArityError {
            formula: "marginAmount".to_string(),
            expected: 2,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "formula marginAmount expects 2 operands, got 3"
        );
    }

    #[test]
    fn test_configuration_errors() {
        assert!(CalculationError::UnknownVersion {
            version: "9".to_string()
        }
        .is_configuration_error());
        assert!(!CalculationError::Overflow {
            formula: "unitCost".to_string()
        }
        .is_configuration_error());
    }
}
