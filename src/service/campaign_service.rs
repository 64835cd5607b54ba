// ============================================================================
// Campaign Service
// Entry point wiring the calculation engine, orchestrator and storage port
// ============================================================================

use crate::domain::{
    BudgetTracking, BulkError, BulkOptions, BulkResult, CalculatedFieldName, CalculatedFields,
    Campaign, ConfigError, EngineConfig, PacingStatus, PrecisionContext, ValidationError,
};
use crate::engine::{
    create_from_config, BulkOrchestrator, CalculationEngine, FieldCalculator, FormulaRegistry,
};
use crate::interfaces::{BulkRecord, EventHandler, PersistenceError, RecordFilter, StoragePort};
use crate::numeric::CalculationError;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from single-record service calls.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("validation failed: {}", crate::domain::validation::describe(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Calculation(#[from] CalculationError),

    #[error(transparent)]
    Persistence(PersistenceError),

    #[error("no campaign matches {0}")]
    NotFound(RecordFilter),

    #[error("natural key {natural_key} belongs to another campaign")]
    IdentityConflict { natural_key: String },
}

impl From<PersistenceError> for ServiceError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::DuplicateKey { key } => {
                ServiceError::IdentityConflict { natural_key: key }
            }
            other => ServiceError::Persistence(other),
        }
    }
}

/// Derived metrics for presentation; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignMetrics {
    pub context: PrecisionContext,
    pub calculation_version: String,
    pub margin_amount: Option<Decimal>,
    pub margin_percentage: Option<Decimal>,
    pub net_revenue: Option<Decimal>,
    pub media_budget: Option<Decimal>,
    pub remaining_budget: Option<Decimal>,
    pub spend_percentage: Option<Decimal>,
    pub expected_spend_to_date: Option<Decimal>,
    pub pacing_percentage: Option<Decimal>,
    pub pacing_status: Option<PacingStatus>,
    pub delivery_percentage: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
    pub cost_per_mille: Option<Decimal>,
}

impl CampaignMetrics {
    fn from_fields(
        context: PrecisionContext,
        calculation_version: &str,
        fields: &CalculatedFields,
    ) -> Self {
        use CalculatedFieldName::*;
        let pacing_percentage = fields.value(PacingPercentage);
        Self {
            context,
            calculation_version: calculation_version.to_string(),
            margin_amount: fields.value(MarginAmount),
            margin_percentage: fields.value(MarginPercentage),
            net_revenue: fields.value(NetRevenue),
            media_budget: fields.value(MediaBudget),
            remaining_budget: fields.value(RemainingBudget),
            spend_percentage: fields.value(SpendPercentage),
            expected_spend_to_date: fields.value(ExpectedSpendToDate),
            pacing_percentage,
            pacing_status: pacing_percentage.map(PacingStatus::from_percentage),
            delivery_percentage: fields.value(DeliveryPercentage),
            unit_cost: fields.value(UnitCost),
            cost_per_mille: fields.value(CostPerMille),
        }
    }
}

/// Campaign operations over any storage port.
pub struct CampaignService<S: StoragePort<Campaign> + 'static> {
    engine: Arc<CalculationEngine>,
    storage: Arc<S>,
    orchestrator: BulkOrchestrator<Campaign>,
}

impl<S: StoragePort<Campaign> + 'static> CampaignService<S> {
    pub fn new(engine: Arc<CalculationEngine>, storage: Arc<S>) -> Self {
        let port: Arc<dyn StoragePort<Campaign>> = storage.clone();
        Self {
            orchestrator: BulkOrchestrator::new(engine.clone(), port),
            engine,
            storage,
        }
    }

    /// Build the engine from `config` and size batches from it
    pub fn from_config(
        config: &EngineConfig,
        registry: Arc<FormulaRegistry>,
        storage: Arc<S>,
    ) -> Result<Self, ConfigError> {
        let engine = Arc::new(create_from_config(config, registry)?);
        let port: Arc<dyn StoragePort<Campaign>> = storage.clone();
        Ok(Self {
            orchestrator: BulkOrchestrator::from_config(engine.clone(), port, config),
            engine,
            storage,
        })
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.orchestrator = self.orchestrator.with_event_handler(handler);
        self
    }

    pub fn engine(&self) -> &CalculationEngine {
        &self.engine
    }

    pub fn orchestrator(&self) -> &BulkOrchestrator<Campaign> {
        &self.orchestrator
    }

    // ========================================================================
    // Bulk operations
    // ========================================================================

    pub fn create_many(
        &self,
        campaigns: Vec<Campaign>,
        options: &BulkOptions,
    ) -> Result<BulkResult<Campaign>, BulkError<Campaign>> {
        self.orchestrator.bulk_create(campaigns, options)
    }

    pub fn update_many(
        &self,
        campaigns: Vec<Campaign>,
        options: &BulkOptions,
    ) -> Result<BulkResult<Campaign>, BulkError<Campaign>> {
        self.orchestrator.bulk_update(campaigns, options)
    }

    pub fn upsert_many(
        &self,
        campaigns: Vec<Campaign>,
        options: &BulkOptions,
    ) -> Result<BulkResult<Campaign>, BulkError<Campaign>> {
        self.orchestrator.bulk_upsert(campaigns, options)
    }

    // ========================================================================
    // Single records
    // ========================================================================

    /// Validate, recalculate and replace one stored campaign.
    ///
    /// Calculated fields of the stored campaign are carried forward, so
    /// superseded values stay in its history.
    pub fn update_one(
        &self,
        filter: &RecordFilter,
        mut campaign: Campaign,
    ) -> Result<Campaign, ServiceError> {
        let issues = campaign.validate();
        if !issues.is_empty() {
            return Err(ServiceError::Validation(issues));
        }

        let stored = self
            .storage
            .find_one(filter)?
            .ok_or_else(|| ServiceError::NotFound(filter.clone()))?;
        campaign.carry_forward(&stored);

        self.calculate_for_storage(&mut campaign)?;

        match self.storage.find_one_and_update(filter, campaign)? {
            Some(stored) => {
                debug!(%filter, "campaign updated");
                Ok(stored)
            }
            None => Err(ServiceError::NotFound(filter.clone())),
        }
    }

    /// Recompute a stored campaign under the engine's current version.
    ///
    /// Fields from older versions move to the campaign's history.
    pub fn recalculate(&self, filter: &RecordFilter) -> Result<Campaign, ServiceError> {
        let mut campaign = self
            .storage
            .find_one(filter)?
            .ok_or_else(|| ServiceError::NotFound(filter.clone()))?;

        self.calculate_for_storage(&mut campaign)?;

        // the stored id is the stable identity; the caller's filter may be a key
        let target = campaign
            .identity_filter()
            .unwrap_or_else(|| filter.clone());
        let stored = self
            .storage
            .find_one_and_update(&target, campaign)?
            .ok_or_else(|| {
                warn!(%filter, "campaign disappeared during recalculation");
                ServiceError::NotFound(filter.clone())
            })?;

        info!(
            %filter,
            version = self.engine.version_str(),
            fields = stored.calculated.len(),
            "campaign recalculated"
        );
        Ok(stored)
    }

    // ========================================================================
    // Read-only projections
    // ========================================================================

    /// Metrics rounded for `context`; the campaign is left untouched.
    pub fn preview_metrics(
        &self,
        campaign: &Campaign,
        context: PrecisionContext,
    ) -> Result<CampaignMetrics, CalculationError> {
        let qualifier = campaign.precision_qualifier();
        let calculator =
            FieldCalculator::new(&self.engine, context).with_qualifier(qualifier.as_deref());

        let mut fields = CalculatedFields::new();
        campaign.derive_into(&calculator, &mut fields)?;
        Ok(CampaignMetrics::from_fields(
            context,
            self.engine.version_str(),
            &fields,
        ))
    }

    pub fn budget_tracking(
        &self,
        campaign: &Campaign,
        context: PrecisionContext,
    ) -> Result<BudgetTracking, CalculationError> {
        let qualifier = campaign.precision_qualifier();
        let calculator =
            FieldCalculator::new(&self.engine, context).with_qualifier(qualifier.as_deref());
        campaign.derive_into(&calculator, &mut CalculatedFields::new())
    }

    fn calculate_for_storage(&self, campaign: &mut Campaign) -> Result<(), CalculationError> {
        let qualifier = campaign.precision_qualifier();
        let calculator = FieldCalculator::new(&self.engine, PrecisionContext::Storage)
            .with_qualifier(qualifier.as_deref());
        campaign.apply_calculations(&calculator)
    }
}
