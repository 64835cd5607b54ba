// ============================================================================
// Campaign Finance Engine Library
// Versioned decimal calculations and a bulk application pipeline
// ============================================================================

//! # Campaign Finance Engine
//!
//! Derives monetary and delivery metrics for media campaigns under strict
//! decimal-precision rules and applies them across large record sets.
//!
//! ## Features
//!
//! - **Exact decimals** (`rust_decimal`) for every amount, never binary floats
//! - **Versioned formula registry**; the active version is injected, not global
//! - **Precision policy table** per context (storage, display, api) and unit type
//! - **Audit metadata** on every derived value (formula, version, rounding, time)
//! - **Bulk pipeline** with per-item failure isolation and batch persistence
//!
//! ## Example
//!
//! ```rust
//! use campaign_finance_engine::prelude::*;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(EngineBuilder::new().build().unwrap());
//! let store = Arc::new(InMemoryStore::<Campaign>::new());
//! let service = CampaignService::new(engine, store);
//!
//! let campaign = Campaign::new("CN-1", "Spring launch")
//!     .with_budget(Decimal::new(1000000, 2))
//!     .with_actual_spend(Decimal::new(400000, 2));
//!
//! let result = service
//!     .upsert_many(vec![campaign.clone()], &BulkOptions::default())
//!     .unwrap();
//! assert_eq!(result.inserted, 1);
//!
//! let metrics = service
//!     .preview_metrics(&campaign, PrecisionContext::Display)
//!     .unwrap();
//! println!("Spend: {:?}%", metrics.spend_percentage);
//! ```

pub mod domain;
pub mod engine;
pub mod interfaces;
pub mod numeric;
pub mod service;
pub mod storage;
pub mod utils;

// Re-exports for convenience
pub mod prelude {
    pub use crate::domain::{
        BudgetTracking, BulkError, BulkFailure, BulkItemError, BulkOperation, BulkOptions,
        BulkResult, CalculatedField, CalculatedFieldName, CalculatedFields, CalculationResult,
        Campaign, ConfigError, EngineConfig, PacingStatus, PrecisionContext, PrecisionPolicyTable,
        PrecisionResult, PrecisionRule, RecordId, ValidationError,
    };
    pub use crate::engine::{
        create_from_config, BulkOrchestrator, CalculationEngine, EngineBuilder, FieldCalculator,
        Formula, FormulaRegistry, PrecisionResolver,
    };
    pub use crate::interfaces::{
        BulkEvent, BulkRecord, EventHandler, LoggingEventHandler, NoOpEventHandler,
        PersistenceError, RecordFilter, StoragePort,
    };
    pub use crate::numeric::{CalculationError, Currency, FinancialAmount, RoundingMode};
    pub use crate::service::{CampaignMetrics, CampaignService, ServiceError};
    pub use crate::storage::InMemoryStore;
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn service() -> CampaignService<InMemoryStore<Campaign>> {
        let engine = Arc::new(EngineBuilder::new().build().unwrap());
        let store: Arc<InMemoryStore<Campaign>> = Arc::new(InMemoryStore::new());
        CampaignService::new(engine, store)
    }

    #[test]
    fn test_spend_percentage_per_context() {
        let engine = EngineBuilder::new().build().unwrap();
        let result = engine
            .calculate_str("spendPercentage", &["4000.00", "10000.00"])
            .unwrap()
            .unwrap();

        let storage = engine.with_precision(&result, PrecisionContext::Storage, None);
        let display = engine.with_precision(&result, PrecisionContext::Display, None);
        assert_eq!(storage.value().to_string(), "40.000000");
        assert_eq!(display.value().to_string(), "40.00");
        assert_eq!(storage.calculation_version(), "1.0.0");
    }

    #[test]
    fn test_upsert_same_campaign_twice() {
        let service = service();
        let campaign = Campaign::new("CN-1", "Launch").with_budget(dec!(100.00));

        let first = service
            .upsert_many(vec![campaign.clone()], &BulkOptions::default())
            .unwrap();
        assert_eq!((first.inserted, first.updated), (1, 0));

        let second = service
            .upsert_many(vec![campaign], &BulkOptions::default())
            .unwrap();
        assert_eq!((second.inserted, second.updated), (0, 1));
        assert!(second.failed.is_empty());
    }

    #[test]
    fn test_zero_target_omits_ratios() {
        let engine = EngineBuilder::new().build().unwrap();
        assert!(engine
            .calculate("spendPercentage", &[dec!(4000.00), dec!(0)])
            .unwrap()
            .is_none());
        assert!(engine
            .calculate("pacingPercentage", &[dec!(4000.00), dec!(0)])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_on_pace_campaign() {
        let service = service();
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let campaign = Campaign::new("CN-5", "Summer")
            .with_flight(start, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap())
            .with_as_of(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
            .with_budget(dec!(3000.00))
            .with_actual_spend(dec!(1500.00));

        let tracking = service
            .budget_tracking(&campaign, PrecisionContext::Display)
            .unwrap();
        assert_eq!(tracking.pacing_percentage, Some(dec!(100)));
        assert_eq!(tracking.pacing_status(), Some(PacingStatus::OnPace));
        assert_eq!(tracking.remaining_amount, Some(dec!(1500)));
    }

    #[test]
    fn test_bulk_create_with_one_malformed_item() {
        let service = service();
        let mut campaigns: Vec<Campaign> = (0..100)
            .map(|i| Campaign::new(format!("CN-{}", i), "Bulk").with_budget(dec!(500.00)))
            .collect();
        campaigns[50] = campaigns[50].clone().with_budget(dec!(-1));

        let result = service
            .create_many(campaigns, &BulkOptions::default())
            .unwrap();
        assert_eq!(result.inserted, 99);
        assert_eq!(result.failed_indices(), vec![50]);
        assert!(result.is_partial_failure());
    }

    #[test]
    fn test_unknown_version_is_configuration_error() {
        let err = EngineBuilder::new()
            .calculation_version("9.9.9")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::UnregisteredVersion("9.9.9".to_string()));
    }
}
