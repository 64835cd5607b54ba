// ============================================================================
// Bulk Operation Model
// Options, per-item failures and the aggregate result of a bulk call
// ============================================================================

use super::validation::{describe, ValidationError};
use crate::interfaces::PersistenceError;
use crate::numeric::CalculationError;
use std::fmt;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Caller intent for a bulk call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BulkOperation {
    Create,
    Update,
    Upsert,
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BulkOperation::Create => "create",
            BulkOperation::Update => "update",
            BulkOperation::Upsert => "upsert",
        })
    }
}

// ============================================================================
// Options
// ============================================================================

/// Options for `bulk_create` / `bulk_update` / `bulk_upsert`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct BulkOptions {
    /// Validate every item before calculating (default: true)
    pub validate_all: bool,
    /// Stop after the first batch with any failure (default: false)
    pub stop_on_error: bool,
    /// Derive calculated fields before persisting (default: true)
    pub apply_calculations: bool,
    /// Attach the rejected item to its failure entry (default: true)
    pub return_failed_records: bool,
    /// With `stop_on_error`, return `BulkError::Aborted` instead of a result
    pub hard_abort: bool,
    /// Override the configured batch size
    pub batch_size: Option<usize>,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            validate_all: true,
            stop_on_error: false,
            apply_calculations: true,
            return_failed_records: true,
            hard_abort: false,
            batch_size: None,
        }
    }
}

impl BulkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate_all(mut self, value: bool) -> Self {
        self.validate_all = value;
        self
    }

    pub fn stop_on_error(mut self, value: bool) -> Self {
        self.stop_on_error = value;
        self
    }

    pub fn apply_calculations(mut self, value: bool) -> Self {
        self.apply_calculations = value;
        self
    }

    pub fn return_failed_records(mut self, value: bool) -> Self {
        self.return_failed_records = value;
        self
    }

    pub fn hard_abort(mut self, value: bool) -> Self {
        self.hard_abort = value;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }
}

// ============================================================================
// Failures
// ============================================================================

/// Why a single input item was not applied.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BulkItemError {
    #[error("validation failed: {}", describe(.0))]
    Validation(Vec<ValidationError>),

    #[error("calculation failed: {0}")]
    Calculation(CalculationError),

    #[error("persistence failed: {0}")]
    Persistence(PersistenceError),

    #[error("identity conflict: natural key {natural_key} belongs to another record")]
    IdentityConflict { natural_key: String },

    #[error("no existing record matches {0}")]
    NotFound(String),

    #[error("not processed: bulk operation stopped after an earlier failure")]
    NotProcessed,
}

/// A failed input item, indexed into the caller's original array.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BulkFailure<T> {
    pub index: usize,
    pub error: BulkItemError,
    pub data: Option<T>,
}

impl<T> BulkFailure<T> {
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

// ============================================================================
// Result
// ============================================================================

/// Aggregate outcome of one bulk call.
///
/// Every input item is accounted for exactly once:
/// `inserted + updated + failed.len() == input length`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct BulkResult<T> {
    pub operation: BulkOperation,
    pub inserted: usize,
    pub updated: usize,
    pub failed: Vec<BulkFailure<T>>,
    pub calculation_version: String,
    pub batches_processed: usize,
    pub stopped_early: bool,
}

impl<T> BulkResult<T> {
    pub fn new(operation: BulkOperation, calculation_version: impl Into<String>) -> Self {
        Self {
            operation,
            inserted: 0,
            updated: 0,
            failed: Vec::new(),
            calculation_version: calculation_version.into(),
            batches_processed: 0,
            stopped_early: false,
        }
    }

    /// Items accounted for so far
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.failed.len()
    }

    pub fn succeeded(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Some items applied, some failed: treat as partially applied
    pub fn is_partial_failure(&self) -> bool {
        !self.failed.is_empty() && self.succeeded() > 0
    }

    /// Sorted indices of failed items, for retrying exactly that subset
    pub fn failed_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.failed.iter().map(|f| f.index).collect();
        indices.sort_unstable();
        indices
    }

    pub fn failure_at(&self, index: usize) -> Option<&BulkFailure<T>> {
        self.failed.iter().find(|f| f.index == index)
    }

    pub(crate) fn push_failure(&mut self, index: usize, error: BulkItemError, data: Option<T>) {
        self.failed.push(BulkFailure { index, error, data });
    }

    pub(crate) fn sort_failures(&mut self) {
        self.failed.sort_by_key(|f| f.index);
    }
}

// ============================================================================
// Propagated errors
// ============================================================================

/// Conditions that abort a bulk call instead of being reported per item.
#[derive(Debug, Error)]
pub enum BulkError<T: fmt::Debug> {
    /// `stop_on_error` with `hard_abort`; carries what was applied so far
    #[error(
        "bulk {} aborted: {} applied, {} failed",
        .result.operation,
        .result.succeeded(),
        .result.failed.len()
    )]
    Aborted { result: Box<BulkResult<T>> },

    /// Unknown formula or version; no item can be calculated
    #[error("calculation configuration error: {0}")]
    Configuration(CalculationError),

    /// A calculation worker thread panicked
    #[error("calculation worker panicked in batch {batch_index}")]
    WorkerPanicked { batch_index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = BulkOptions::default();
        assert!(options.validate_all);
        assert!(!options.stop_on_error);
        assert!(options.apply_calculations);
        assert!(options.return_failed_records);
        assert!(!options.hard_abort);
        assert_eq!(options.batch_size, None);
    }

    #[test]
    fn test_result_accounting() {
        let mut result: BulkResult<()> = BulkResult::new(BulkOperation::Upsert, "1.0.0");
        result.inserted = 3;
        result.updated = 1;
        result.push_failure(7, BulkItemError::NotProcessed, None);
        result.push_failure(2, BulkItemError::NotFound("id 1".to_string()), None);
        result.sort_failures();

        assert_eq!(result.total(), 6);
        assert!(result.is_partial_failure());
        assert_eq!(result.failed_indices(), vec![2, 7]);
        assert_eq!(
            result.failure_at(7).unwrap().message(),
            "not processed: bulk operation stopped after an earlier failure"
        );
    }

    #[test]
    fn test_item_error_messages() {
        let err = BulkItemError::Validation(vec![
            ValidationError::missing("name"),
            ValidationError::missing("campaignNumber"),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: missing required field: name; missing required field: campaignNumber"
        );
    }

    #[test]
    fn test_aborted_message() {
        let mut result: BulkResult<()> = BulkResult::new(BulkOperation::Create, "1.0.0");
        result.inserted = 100;
        result.push_failure(100, BulkItemError::NotProcessed, None);
        let err = BulkError::Aborted {
            result: Box::new(result),
        };
        assert_eq!(err.to_string(), "bulk create aborted: 100 applied, 1 failed");
    }
}
