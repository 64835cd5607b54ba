// ============================================================================
// Storage Port Interface
// Narrow persistence contract the bulk orchestrator depends on
// ============================================================================

use crate::domain::RecordId;
use std::fmt;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Storage-side failure, either for a whole call or a single write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PersistenceError {
    #[error("storage connection failed: {0}")]
    Connection(String),

    #[error("storage call timed out: {0}")]
    Timeout(String),

    #[error("write conflict: {0}")]
    WriteConflict(String),

    /// Unique natural-key index violation
    #[error("duplicate natural key {key}")]
    DuplicateKey { key: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// How a write locates its target record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RecordFilter {
    Id(RecordId),
    NaturalKey(String),
}

impl fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFilter::Id(id) => write!(f, "id {}", id),
            RecordFilter::NaturalKey(key) => write!(f, "natural key {}", key),
        }
    }
}

/// One operation of a `bulk_write` call.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation<T> {
    InsertOne(T),
    /// Replace the record matching `filter`; insert it when `upsert` is set
    /// and nothing matches.
    UpdateOne {
        filter: RecordFilter,
        replacement: T,
        upsert: bool,
    },
}

/// Per-operation outcome of a `bulk_write` call, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Modified,
    /// Update without upsert matched nothing
    Unmatched,
    Failed(PersistenceError),
}

/// A write error at `index` within the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteError {
    pub index: usize,
    pub error: PersistenceError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertManyResult {
    pub inserted_count: usize,
    /// Documents that were not inserted; all others were
    pub write_errors: Vec<WriteError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub inserted_count: usize,
    pub modified_count: usize,
    /// One entry per requested operation
    pub outcomes: Vec<WriteOutcome>,
}

impl BulkWriteResult {
    pub fn from_outcomes(outcomes: Vec<WriteOutcome>) -> Self {
        let inserted_count = outcomes
            .iter()
            .filter(|o| matches!(o, WriteOutcome::Inserted))
            .count();
        let modified_count = outcomes
            .iter()
            .filter(|o| matches!(o, WriteOutcome::Modified))
            .count();
        Self {
            inserted_count,
            modified_count,
            outcomes,
        }
    }
}

/// Persistence contract implemented by the data-access layer.
///
/// A call-level `Err` means nothing in the request is known to have been
/// applied; the orchestrator records the whole batch as failed. Per-write
/// problems are reported inside the `Ok` result instead.
pub trait StoragePort<T>: Send + Sync {
    /// Insert every document (unordered)
    fn insert_many(&self, docs: Vec<T>) -> Result<InsertManyResult, PersistenceError>;

    /// Apply insert / update / upsert operations (unordered)
    fn bulk_write(&self, ops: Vec<WriteOperation<T>>) -> Result<BulkWriteResult, PersistenceError>;

    /// Replace the matching record and return the stored document
    fn find_one_and_update(
        &self,
        filter: &RecordFilter,
        update: T,
    ) -> Result<Option<T>, PersistenceError>;

    /// Read one record
    fn find_one(&self, filter: &RecordFilter) -> Result<Option<T>, PersistenceError>;

    /// Read the record matching each filter, in filter order
    fn find_many(&self, filters: &[RecordFilter]) -> Result<Vec<Option<T>>, PersistenceError> {
        filters.iter().map(|filter| self.find_one(filter)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_from_outcomes() {
        let result = BulkWriteResult::from_outcomes(vec![
            WriteOutcome::Inserted,
            WriteOutcome::Modified,
            WriteOutcome::Modified,
            WriteOutcome::Unmatched,
            WriteOutcome::Failed(PersistenceError::DuplicateKey {
                key: "CN-1".to_string(),
            }),
        ]);
        assert_eq!(result.inserted_count, 1);
        assert_eq!(result.modified_count, 2);
        assert_eq!(result.outcomes.len(), 5);
    }

    #[test]
    fn test_filter_display() {
        assert_eq!(
            RecordFilter::NaturalKey("CN-7".to_string()).to_string(),
            "natural key CN-7"
        );
    }
}
