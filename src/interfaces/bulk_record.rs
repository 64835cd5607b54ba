// ============================================================================
// Bulk Record Interface
// What an entity must provide to flow through the bulk pipeline
// ============================================================================

use super::storage_port::RecordFilter;
use crate::domain::{RecordId, ValidationError};
use crate::engine::FieldCalculator;
use crate::numeric::CalculationError;
use std::fmt;

/// An entity the orchestrator can validate, calculate and persist.
pub trait BulkRecord: Clone + fmt::Debug + Send + Sync + 'static {
    /// Entity name for logs
    const ENTITY: &'static str;

    fn record_id(&self) -> Option<RecordId>;

    fn set_record_id(&mut self, id: RecordId);

    /// Business-assigned unique key, e.g. a campaign number
    fn natural_key(&self) -> Option<&str>;

    /// Every validation problem on this record; empty when valid
    fn validate(&self) -> Vec<ValidationError>;

    /// Unit type or `platform/unit` used to pick precision overrides
    fn precision_qualifier(&self) -> Option<String> {
        None
    }

    /// Take over derived state from the stored copy of this record.
    ///
    /// Called before an update or upsert is recalculated, so the write keeps
    /// the stored audit history instead of replacing it.
    fn carry_forward(&mut self, _stored: &Self) {}

    /// Recompute all derived fields through `calculator`.
    fn apply_calculations(&mut self, calculator: &FieldCalculator<'_>)
        -> Result<(), CalculationError>;

    /// Identity used by update/upsert: the id wins over the natural key.
    fn identity_filter(&self) -> Option<RecordFilter> {
        if let Some(id) = self.record_id() {
            return Some(RecordFilter::Id(id));
        }
        self.natural_key()
            .filter(|k| !k.trim().is_empty())
            .map(|k| RecordFilter::NaturalKey(k.to_string()))
    }

    fn matches(&self, filter: &RecordFilter) -> bool {
        match filter {
            RecordFilter::Id(id) => self.record_id() == Some(*id),
            RecordFilter::NaturalKey(key) => self.natural_key() == Some(key.as_str()),
        }
    }
}
