// ============================================================================
// Engine Module
// Contains the calculation engine and the bulk pipeline built on it
// ============================================================================

mod calculation_engine;
mod orchestrator;
mod precision;
mod recorder;

pub mod factory;
pub mod formulas;

pub use calculation_engine::{CalculationEngine, EngineVersion};
pub use factory::{create_from_config, EngineBuilder};
pub use formulas::{standard_formulas, ArithmeticOverflow, Formula, FormulaRegistry};
pub use orchestrator::BulkOrchestrator;
pub use precision::{PrecisionResolver, ResolutionLevel};
pub use recorder::{CalculatedFieldRecorder, FieldCalculator};
