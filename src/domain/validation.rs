// ============================================================================
// Validation Errors
// ============================================================================

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single validation problem on an input record.
///
/// Bulk validation collects every issue on an item; nothing here is thrown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid date range: end {end} is before start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("{field} must be positive, got {value}")]
    NonPositiveAmount { field: String, value: Decimal },

    #[error("{field} cannot be negative, got {value}")]
    NegativeAmount { field: String, value: Decimal },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("{field} is in {found}, expected {expected}")]
    CurrencyMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("record has neither an id nor a natural key")]
    MissingIdentity,
}

impl ValidationError {
    pub fn missing(field: &str) -> Self {
        ValidationError::MissingField(field.to_string())
    }
}

/// Render a list of issues as one message.
pub fn describe(issues: &[ValidationError]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_joins_all_issues() {
        let issues = vec![
            ValidationError::missing("name"),
            ValidationError::MissingIdentity,
        ];
        assert_eq!(
            describe(&issues),
            "missing required field: name; record has neither an id nor a natural key"
        );
    }
}
