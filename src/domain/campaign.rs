// ============================================================================
// Campaign Domain Model
// ============================================================================

use super::budget::BudgetTracking;
use super::calculation::{CalculatedFieldName, CalculatedFields};
use super::record::RecordId;
use super::validation::ValidationError;
use crate::engine::FieldCalculator;
use crate::interfaces::BulkRecord;
use crate::numeric::{CalculationError, Currency, FinancialAmount};
use chrono::NaiveDate;
use rust_decimal::Decimal;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A media campaign with its raw financial inputs and derived metrics.
///
/// Raw inputs are set by callers; `calculated` and `budget_tracking` are
/// only ever written through a `FieldCalculator`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Campaign {
    pub id: Option<RecordId>,
    /// Natural key, unique across campaigns
    pub campaign_number: String,
    pub name: String,
    pub advertiser: Option<String>,
    pub platform: Option<String>,
    /// Pricing unit, e.g. `cpm`, `cpc`, `cpv`
    pub unit_type: Option<String>,
    pub currency: Currency,

    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Date pacing is measured at
    pub as_of: Option<NaiveDate>,

    pub gross_revenue: Option<FinancialAmount>,
    pub agency_fee_percentage: Option<Decimal>,
    pub target_margin_percentage: Option<Decimal>,
    pub media_cost: Option<FinancialAmount>,

    /// Spend target for the flight
    pub budget: Option<FinancialAmount>,
    pub actual_spend: Option<FinancialAmount>,

    pub target_units: Option<Decimal>,
    pub delivered_units: Option<Decimal>,
    pub impressions: Option<Decimal>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub calculated: CalculatedFields,
    pub budget_tracking: Option<BudgetTracking>,
}

impl Campaign {
    pub fn new(campaign_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            campaign_number: campaign_number.into(),
            name: name.into(),
            advertiser: None,
            platform: None,
            unit_type: None,
            currency: Currency::usd(),
            start_date: None,
            end_date: None,
            as_of: None,
            gross_revenue: None,
            agency_fee_percentage: None,
            target_margin_percentage: None,
            media_cost: None,
            budget: None,
            actual_spend: None,
            target_units: None,
            delivered_units: None,
            impressions: None,
            calculated: CalculatedFields::new(),
            budget_tracking: None,
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_advertiser(mut self, advertiser: impl Into<String>) -> Self {
        self.advertiser = Some(advertiser.into());
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_unit_type(mut self, unit_type: impl Into<String>) -> Self {
        self.unit_type = Some(unit_type.into());
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn with_flight(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    pub fn with_revenue(
        mut self,
        gross_revenue: Decimal,
        agency_fee_percentage: Option<Decimal>,
    ) -> Self {
        self.gross_revenue = Some(self.amount(gross_revenue));
        self.agency_fee_percentage = agency_fee_percentage;
        self
    }

    pub fn with_target_margin(mut self, percentage: Decimal) -> Self {
        self.target_margin_percentage = Some(percentage);
        self
    }

    pub fn with_media_cost(mut self, cost: Decimal) -> Self {
        self.media_cost = Some(self.amount(cost));
        self
    }

    pub fn with_budget(mut self, budget: Decimal) -> Self {
        self.budget = Some(self.amount(budget));
        self
    }

    pub fn with_actual_spend(mut self, spend: Decimal) -> Self {
        self.actual_spend = Some(self.amount(spend));
        self
    }

    pub fn with_delivery(
        mut self,
        target_units: Option<Decimal>,
        delivered_units: Option<Decimal>,
        impressions: Option<Decimal>,
    ) -> Self {
        self.target_units = target_units;
        self.delivered_units = delivered_units;
        self.impressions = impressions;
        self
    }

    fn amount(&self, value: Decimal) -> FinancialAmount {
        FinancialAmount::new(value, self.currency.clone())
    }

    /// Inclusive flight length in days
    pub fn total_days(&self) -> Option<Decimal> {
        let (start, end) = (self.start_date?, self.end_date?);
        let days = (end - start).num_days() + 1;
        (days > 0).then(|| Decimal::from(days))
    }

    /// Inclusive days elapsed at `as_of`, clamped to the flight
    pub fn elapsed_days(&self) -> Option<Decimal> {
        let (start, end, as_of) = (self.start_date?, self.end_date?, self.as_of?);
        if as_of < start {
            return Some(Decimal::ZERO);
        }
        let elapsed = (as_of.min(end) - start).num_days() + 1;
        Some(Decimal::from(elapsed))
    }

    pub fn calculated_value(&self, name: CalculatedFieldName) -> Option<Decimal> {
        self.calculated.value(name)
    }

    /// Derive every metric into `fields`, returning the budget tracking block.
    ///
    /// Fields whose inputs are missing, or whose ratio is undefined, are
    /// removed rather than stored.
    pub(crate) fn derive_into(
        &self,
        calculator: &FieldCalculator<'_>,
        fields: &mut CalculatedFields,
    ) -> Result<BudgetTracking, CalculationError> {
        use CalculatedFieldName::*;

        let gross = self.gross_revenue.as_ref().map(|a| a.amount);
        let cost = self.media_cost.as_ref().map(|a| a.amount);
        let budget = self.budget.as_ref().map(|a| a.amount);
        let spend = self.actual_spend.as_ref().map(|a| a.amount);

        calculator.refresh(fields, MarginAmount, pair(gross, cost).as_deref())?;
        calculator.refresh(fields, MarginPercentage, pair(gross, cost).as_deref())?;

        let net = calculator.refresh(
            fields,
            NetRevenue,
            pair(gross, self.agency_fee_percentage).as_deref(),
        )?;
        calculator.refresh(
            fields,
            MediaBudget,
            pair(net, self.target_margin_percentage).as_deref(),
        )?;

        calculator.refresh(fields, RemainingBudget, pair(budget, spend).as_deref())?;
        calculator.refresh(fields, SpendPercentage, pair(spend, budget).as_deref())?;

        let schedule = match (budget, self.elapsed_days(), self.total_days()) {
            (Some(b), Some(elapsed), Some(total)) => Some(vec![b, elapsed, total]),
            _ => None,
        };
        let expected = calculator.refresh(fields, ExpectedSpendToDate, schedule.as_deref())?;
        calculator.refresh(fields, PacingPercentage, pair(spend, expected).as_deref())?;

        calculator.refresh(
            fields,
            DeliveryPercentage,
            pair(self.delivered_units, self.target_units).as_deref(),
        )?;
        calculator.refresh(fields, UnitCost, pair(spend, self.delivered_units).as_deref())?;
        calculator.refresh(fields, CostPerMille, pair(spend, self.impressions).as_deref())?;

        Ok(BudgetTracking {
            target_amount: budget,
            actual_amount: spend,
            remaining_amount: fields.value(RemainingBudget),
            pacing_percentage: fields.value(PacingPercentage),
        })
    }

    fn check_currency(
        &self,
        field: &str,
        amount: Option<&FinancialAmount>,
        issues: &mut Vec<ValidationError>,
    ) {
        if let Some(amount) = amount {
            if amount.currency != self.currency {
                issues.push(ValidationError::CurrencyMismatch {
                    field: field.to_string(),
                    expected: self.currency.to_string(),
                    found: amount.currency.to_string(),
                });
            }
        }
    }
}

fn pair(a: Option<Decimal>, b: Option<Decimal>) -> Option<Vec<Decimal>> {
    Some(vec![a?, b?])
}

fn check_non_negative(field: &str, value: Option<Decimal>, issues: &mut Vec<ValidationError>) {
    if let Some(value) = value.filter(|v| *v < Decimal::ZERO) {
        issues.push(ValidationError::NegativeAmount {
            field: field.to_string(),
            value,
        });
    }
}

fn check_percentage(field: &str, value: Option<Decimal>, issues: &mut Vec<ValidationError>) {
    if let Some(value) = value {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            issues.push(ValidationError::OutOfRange {
                field: field.to_string(),
                value,
                min: Decimal::ZERO,
                max: Decimal::ONE_HUNDRED,
            });
        }
    }
}

impl BulkRecord for Campaign {
    const ENTITY: &'static str = "campaign";

    fn record_id(&self) -> Option<RecordId> {
        self.id
    }

    fn set_record_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn natural_key(&self) -> Option<&str> {
        let key = self.campaign_number.trim();
        (!key.is_empty()).then_some(key)
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(ValidationError::missing("name"));
        }
        if self.campaign_number.trim().is_empty() {
            issues.push(ValidationError::missing("campaignNumber"));
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                issues.push(ValidationError::InvalidDateRange { start, end });
            }
        }

        if let Some(budget) = &self.budget {
            if !budget.is_positive() {
                issues.push(ValidationError::NonPositiveAmount {
                    field: "budget".to_string(),
                    value: budget.amount,
                });
            }
        }

        let amount_of = |a: &Option<FinancialAmount>| a.as_ref().map(|a| a.amount);
        check_non_negative("grossRevenue", amount_of(&self.gross_revenue), &mut issues);
        check_non_negative("mediaCost", amount_of(&self.media_cost), &mut issues);
        check_non_negative("actualSpend", amount_of(&self.actual_spend), &mut issues);
        check_non_negative("targetUnits", self.target_units, &mut issues);
        check_non_negative("deliveredUnits", self.delivered_units, &mut issues);
        check_non_negative("impressions", self.impressions, &mut issues);

        check_percentage("agencyFeePercentage", self.agency_fee_percentage, &mut issues);
        check_percentage("targetMarginPercentage", self.target_margin_percentage, &mut issues);

        self.check_currency("grossRevenue", self.gross_revenue.as_ref(), &mut issues);
        self.check_currency("mediaCost", self.media_cost.as_ref(), &mut issues);
        self.check_currency("budget", self.budget.as_ref(), &mut issues);
        self.check_currency("actualSpend", self.actual_spend.as_ref(), &mut issues);

        issues
    }

    fn carry_forward(&mut self, stored: &Self) {
        self.calculated = stored.calculated.clone();
        self.budget_tracking = stored.budget_tracking.clone();
    }

    fn precision_qualifier(&self) -> Option<String> {
        match (self.platform.as_deref(), self.unit_type.as_deref()) {
            (Some(platform), Some(unit)) => Some(format!("{}/{}", platform, unit)),
            (None, Some(unit)) => Some(unit.to_string()),
            (Some(platform), None) => Some(platform.to_string()),
            (None, None) => None,
        }
    }

    fn apply_calculations(
        &mut self,
        calculator: &FieldCalculator<'_>,
    ) -> Result<(), CalculationError> {
        let mut fields = std::mem::take(&mut self.calculated);
        let result = self.derive_into(calculator, &mut fields);
        self.calculated = fields;
        self.budget_tracking = Some(result?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::PrecisionContext;
    use crate::engine::factory::EngineBuilder;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Campaign {
        Campaign::new("CN-1", "Spring launch")
            .with_platform("meta")
            .with_unit_type("cpm")
            .with_flight(date(2024, 3, 1), date(2024, 3, 10))
            .with_as_of(date(2024, 3, 5))
            .with_revenue(dec!(10000.00), Some(dec!(15)))
            .with_target_margin(dec!(20))
            .with_media_cost(dec!(6000.00))
            .with_budget(dec!(10000.00))
            .with_actual_spend(dec!(5000.00))
            .with_delivery(Some(dec!(2000000)), Some(dec!(1000000)), Some(dec!(1000000)))
    }

    #[test]
    fn test_valid_campaign_has_no_issues() {
        assert!(sample().validate().is_empty());
    }

    #[test]
    fn test_validation_collects_every_issue() {
        let mut campaign = sample()
            .with_flight(date(2024, 3, 10), date(2024, 3, 1))
            .with_budget(dec!(0))
            .with_target_margin(dec!(120));
        campaign.name = String::new();
        campaign.actual_spend = Some(FinancialAmount::new(
            dec!(10),
            Currency::new("EUR").unwrap(),
        ));

        let issues = campaign.validate();
        assert_eq!(issues.len(), 5);
        assert!(issues.contains(&ValidationError::missing("name")));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationError::InvalidDateRange { .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationError::NonPositiveAmount { .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationError::OutOfRange { .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, ValidationError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_flight_days() {
        let campaign = sample();
        assert_eq!(campaign.total_days(), Some(dec!(10)));
        assert_eq!(campaign.elapsed_days(), Some(dec!(5)));

        let late = sample().with_as_of(date(2024, 4, 1));
        assert_eq!(late.elapsed_days(), Some(dec!(10)));
    }

    #[test]
    fn test_apply_calculations() {
        let engine = EngineBuilder::new().build().unwrap();
        let calculator = FieldCalculator::new(&engine, PrecisionContext::Storage);
        let mut campaign = sample();
        campaign.apply_calculations(&calculator).unwrap();

        use CalculatedFieldName::*;
        assert_eq!(campaign.calculated_value(MarginAmount), Some(dec!(4000)));
        assert_eq!(
            campaign.calculated_value(MarginPercentage).unwrap().to_string(),
            "40.000000"
        );
        assert_eq!(campaign.calculated_value(NetRevenue), Some(dec!(8500)));
        assert_eq!(campaign.calculated_value(MediaBudget), Some(dec!(6800)));
        assert_eq!(campaign.calculated_value(ExpectedSpendToDate), Some(dec!(5000)));
        assert_eq!(campaign.calculated_value(PacingPercentage), Some(dec!(100)));
        assert_eq!(campaign.calculated_value(DeliveryPercentage), Some(dec!(50)));
        assert_eq!(campaign.calculated_value(CostPerMille), Some(dec!(5)));

        let tracking = campaign.budget_tracking.as_ref().unwrap();
        assert_eq!(tracking.remaining_amount, Some(dec!(5000)));
        assert_eq!(
            tracking.pacing_status(),
            Some(crate::domain::budget::PacingStatus::OnPace)
        );

        let field = campaign.calculated.get(SpendPercentage).unwrap();
        assert_eq!(field.calculation_version, "1.0.0");
        assert_eq!(field.value.to_string(), "50.000000");
    }

    #[test]
    fn test_missing_inputs_omit_fields() {
        let engine = EngineBuilder::new().build().unwrap();
        let calculator = FieldCalculator::new(&engine, PrecisionContext::Storage);
        let mut campaign = Campaign::new("CN-2", "Bare").with_budget(dec!(100.00));
        campaign.apply_calculations(&calculator).unwrap();

        assert!(campaign.calculated.is_empty());
        let tracking = campaign.budget_tracking.unwrap();
        assert_eq!(tracking.target_amount, Some(dec!(100.00)));
        assert_eq!(tracking.remaining_amount, None);
    }

    #[test]
    fn test_precision_qualifier() {
        assert_eq!(sample().precision_qualifier(), Some("meta/cpm".to_string()));
        assert_eq!(Campaign::new("CN-3", "x").precision_qualifier(), None);
    }

    #[test]
    fn test_pacing_chains_on_exact_expected_spend() {
        let engine = EngineBuilder::new().build().unwrap();
        let campaign = Campaign::new("CN-4", "Short flight")
            .with_flight(date(2024, 5, 1), date(2024, 5, 3))
            .with_as_of(date(2024, 5, 1))
            .with_budget(dec!(100.00))
            .with_actual_spend(dec!(33.33));

        for context in [PrecisionContext::Storage, PrecisionContext::Display] {
            let calculator = FieldCalculator::new(&engine, context);
            let mut fields = CalculatedFields::new();
            let tracking = campaign.derive_into(&calculator, &mut fields).unwrap();

            assert_eq!(tracking.pacing_percentage, Some(dec!(99.99)));
            assert_eq!(
                tracking.pacing_status(),
                Some(crate::domain::budget::PacingStatus::Behind)
            );
        }
    }

    #[test]
    fn test_media_budget_uses_exact_net_revenue() {
        let engine = EngineBuilder::new().build().unwrap();
        let calculator = FieldCalculator::new(&engine, PrecisionContext::Display);
        let campaign = Campaign::new("CN-5", "Fees")
            .with_revenue(dec!(100.00), Some(dec!(33.335)))
            .with_target_margin(dec!(50));

        let mut fields = CalculatedFields::new();
        campaign.derive_into(&calculator, &mut fields).unwrap();

        // net 66.665 displays as 66.67, but half of it is 33.3325
        assert_eq!(
            fields.value(CalculatedFieldName::NetRevenue).unwrap().to_string(),
            "66.67"
        );
        assert_eq!(
            fields.value(CalculatedFieldName::MediaBudget).unwrap().to_string(),
            "33.33"
        );
    }

    #[test]
    fn test_unit_precision_only_for_unit_costs() {
        let engine = EngineBuilder::new().build().unwrap();
        let qualifier = sample().precision_qualifier();
        let calculator = FieldCalculator::new(&engine, PrecisionContext::Display)
            .with_qualifier(qualifier.as_deref());
        let campaign = sample().with_actual_spend(dec!(4000.00));

        let mut fields = CalculatedFields::new();
        campaign.derive_into(&calculator, &mut fields).unwrap();

        use CalculatedFieldName::*;
        assert_eq!(fields.value(SpendPercentage).unwrap().to_string(), "40.00");
        assert_eq!(fields.value(RemainingBudget).unwrap().to_string(), "6000.00");
        assert_eq!(fields.value(CostPerMille).unwrap().to_string(), "4.000");
    }

    #[test]
    fn test_carry_forward_keeps_stored_audit() {
        let engine = EngineBuilder::new().build().unwrap();
        let calculator = FieldCalculator::new(&engine, PrecisionContext::Storage);
        let mut stored = sample();
        stored.apply_calculations(&calculator).unwrap();

        let mut incoming = sample();
        incoming.carry_forward(&stored);
        assert_eq!(incoming.calculated, stored.calculated);
        assert_eq!(incoming.budget_tracking, stored.budget_tracking);
    }
}
