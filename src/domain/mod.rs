// ============================================================================
// Domain Models Module
// Contains all core domain entities and value objects
// ============================================================================

pub mod budget;
pub mod bulk;
pub mod calculation;
pub mod campaign;
pub mod config;
pub mod record;
pub mod validation;

pub use budget::{BudgetTracking, PacingStatus};
pub use bulk::{BulkError, BulkFailure, BulkItemError, BulkOperation, BulkOptions, BulkResult};
pub use calculation::{
    CalculatedField, CalculatedFieldName, CalculatedFields, CalculationResult, PrecisionResult,
    SupersededField,
};
pub use campaign::Campaign;
pub use config::{
    ConfigError, EngineConfig, PrecisionContext, PrecisionOverride, PrecisionPolicyTable,
    PrecisionRule, DEFAULT_BATCH_SIZE, STANDARD_CALCULATION_VERSION,
};
pub use record::RecordId;
pub use validation::ValidationError;
