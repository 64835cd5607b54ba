// ============================================================================
// Calculation Domain Model
// Calculation results, precision-narrowed results and persisted fields
// ============================================================================

use super::config::PrecisionContext;
use crate::numeric::RoundingMode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Calculation Result
// ============================================================================

/// Raw output of a formula evaluation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalculationResult {
    value: Decimal,
    formula: String,
    calculation_version: String,
    calculated_at: DateTime<Utc>,
}

impl CalculationResult {
    pub(crate) fn new(
        value: Decimal,
        formula: String,
        calculation_version: String,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            value,
            formula,
            calculation_version,
            calculated_at,
        }
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Expression text of the formula that produced the value
    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn calculation_version(&self) -> &str {
        &self.calculation_version
    }

    pub fn calculated_at(&self) -> DateTime<Utc> {
        self.calculated_at
    }
}

// ============================================================================
// Precision Result
// ============================================================================

/// A `CalculationResult` narrowed to a fixed scale for a given context.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrecisionResult {
    result: CalculationResult,
    context: PrecisionContext,
    decimal_places: u32,
    rounding_mode: RoundingMode,
}

impl PrecisionResult {
    pub(crate) fn new(
        result: CalculationResult,
        context: PrecisionContext,
        decimal_places: u32,
        rounding_mode: RoundingMode,
    ) -> Self {
        Self {
            result,
            context,
            decimal_places,
            rounding_mode,
        }
    }

    /// Rounded value, carrying exactly `decimal_places` digits of scale
    pub fn value(&self) -> Decimal {
        self.result.value
    }

    /// Underlying (already rounded) calculation result
    pub fn result(&self) -> &CalculationResult {
        &self.result
    }

    pub fn context(&self) -> PrecisionContext {
        self.context
    }

    pub fn decimal_places(&self) -> u32 {
        self.decimal_places
    }

    pub fn rounding_mode(&self) -> RoundingMode {
        self.rounding_mode
    }

    pub fn formula(&self) -> &str {
        &self.result.formula
    }

    pub fn calculation_version(&self) -> &str {
        &self.result.calculation_version
    }
}

// ============================================================================
// Calculated Field
// ============================================================================

/// Persisted form of a derived value and the metadata that reproduces it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CalculatedField {
    pub value: Decimal,
    pub calculation_version: String,
    pub calculated_at: DateTime<Utc>,
    pub context: PrecisionContext,
    pub formula: String,
    pub precision: u32,
    pub rounding_mode: RoundingMode,
    pub is_stored: bool,
}

impl CalculatedField {
    /// Same value produced by the same formula version
    pub fn is_equivalent(&self, other: &CalculatedField) -> bool {
        self.value == other.value
            && self.calculation_version == other.calculation_version
            && self.formula == other.formula
            && self.precision == other.precision
            && self.rounding_mode == other.rounding_mode
    }
}

// ============================================================================
// Calculated Field Names
// ============================================================================

/// Every derived value an entity can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum CalculatedFieldName {
    MarginAmount,
    MarginPercentage,
    NetRevenue,
    MediaBudget,
    RemainingBudget,
    SpendPercentage,
    ExpectedSpendToDate,
    PacingPercentage,
    DeliveryPercentage,
    UnitCost,
    CostPerMille,
}

impl CalculatedFieldName {
    pub const ALL: [CalculatedFieldName; 11] = [
        CalculatedFieldName::MarginAmount,
        CalculatedFieldName::MarginPercentage,
        CalculatedFieldName::NetRevenue,
        CalculatedFieldName::MediaBudget,
        CalculatedFieldName::RemainingBudget,
        CalculatedFieldName::SpendPercentage,
        CalculatedFieldName::ExpectedSpendToDate,
        CalculatedFieldName::PacingPercentage,
        CalculatedFieldName::DeliveryPercentage,
        CalculatedFieldName::UnitCost,
        CalculatedFieldName::CostPerMille,
    ];

    /// Name of the registered formula that produces this field
    pub fn formula_name(self) -> &'static str {
        match self {
            CalculatedFieldName::MarginAmount => "marginAmount",
            CalculatedFieldName::MarginPercentage => "marginPercentage",
            CalculatedFieldName::NetRevenue => "netRevenue",
            CalculatedFieldName::MediaBudget => "mediaBudget",
            CalculatedFieldName::RemainingBudget => "remainingAmount",
            CalculatedFieldName::SpendPercentage => "spendPercentage",
            CalculatedFieldName::ExpectedSpendToDate => "expectedToDate",
            CalculatedFieldName::PacingPercentage => "pacingPercentage",
            CalculatedFieldName::DeliveryPercentage => "deliveryPercentage",
            CalculatedFieldName::UnitCost => "unitCost",
            CalculatedFieldName::CostPerMille => "costPerMille",
        }
    }

    /// Costs per delivered unit, the only fields unit-type precision applies to
    pub fn is_per_unit_cost(self) -> bool {
        matches!(self, CalculatedFieldName::UnitCost | CalculatedFieldName::CostPerMille)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CalculatedFieldName::MarginAmount => "marginAmount",
            CalculatedFieldName::MarginPercentage => "marginPercentage",
            CalculatedFieldName::NetRevenue => "netRevenue",
            CalculatedFieldName::MediaBudget => "mediaBudget",
            CalculatedFieldName::RemainingBudget => "remainingBudget",
            CalculatedFieldName::SpendPercentage => "spendPercentage",
            CalculatedFieldName::ExpectedSpendToDate => "expectedSpendToDate",
            CalculatedFieldName::PacingPercentage => "pacingPercentage",
            CalculatedFieldName::DeliveryPercentage => "deliveryPercentage",
            CalculatedFieldName::UnitCost => "unitCost",
            CalculatedFieldName::CostPerMille => "costPerMille",
        }
    }
}

impl fmt::Display for CalculatedFieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Calculated Fields
// ============================================================================

/// A field that was replaced or removed, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SupersededField {
    pub name: CalculatedFieldName,
    pub field: CalculatedField,
    pub superseded_at: DateTime<Utc>,
}

/// Current calculated fields of an entity plus the audit history.
///
/// Fields are never edited in place: a differing value or version replaces
/// the current entry and the old one moves to `history`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalculatedFields {
    current: BTreeMap<CalculatedFieldName, CalculatedField>,
    history: Vec<SupersededField>,
}

impl CalculatedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: CalculatedFieldName) -> Option<&CalculatedField> {
        self.current.get(&name)
    }

    pub fn value(&self, name: CalculatedFieldName) -> Option<Decimal> {
        self.current.get(&name).map(|f| f.value)
    }

    pub fn contains(&self, name: CalculatedFieldName) -> bool {
        self.current.contains_key(&name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CalculatedFieldName, &CalculatedField)> {
        self.current.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn history(&self) -> &[SupersededField] {
        &self.history
    }

    /// Superseded entries for one field, oldest first
    pub fn history_of(&self, name: CalculatedFieldName) -> impl Iterator<Item = &CalculatedField> {
        self.history
            .iter()
            .filter(move |s| s.name == name)
            .map(|s| &s.field)
    }

    /// Store a freshly recorded field.
    ///
    /// Returns `false` when an equivalent field is already current, in which
    /// case the original entry and its timestamp are kept.
    pub fn insert(&mut self, name: CalculatedFieldName, field: CalculatedField) -> bool {
        match self.current.get(&name) {
            Some(existing) if existing.is_equivalent(&field) => false,
            _ => {
                let superseded_at = field.calculated_at;
                if let Some(previous) = self.current.insert(name, field) {
                    self.history.push(SupersededField {
                        name,
                        field: previous,
                        superseded_at,
                    });
                }
                true
            }
        }
    }

    /// Drop a field whose value became undefined, keeping it in history.
    pub fn remove(&mut self, name: CalculatedFieldName, at: DateTime<Utc>) -> bool {
        match self.current.remove(&name) {
            Some(previous) => {
                self.history.push(SupersededField {
                    name,
                    field: previous,
                    superseded_at: at,
                });
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn field(value: Decimal, version: &str) -> CalculatedField {
        CalculatedField {
            value,
            calculation_version: version.to_string(),
            calculated_at: Utc::now(),
            context: PrecisionContext::Storage,
            formula: "revenue - cost".to_string(),
            precision: 6,
            rounding_mode: RoundingMode::HalfUp,
            is_stored: true,
        }
    }

    #[test]
    fn test_insert_keeps_equivalent_field() {
        let mut fields = CalculatedFields::new();
        let first = field(dec!(10.000000), "1.0.0");
        let original_time = first.calculated_at;

        assert!(fields.insert(CalculatedFieldName::MarginAmount, first));
        assert!(!fields.insert(CalculatedFieldName::MarginAmount, field(dec!(10.000000), "1.0.0")));

        let current = fields.get(CalculatedFieldName::MarginAmount).unwrap();
        assert_eq!(current.calculated_at, original_time);
        assert!(fields.history().is_empty());
    }

    #[test]
    fn test_new_version_supersedes_without_overwrite() {
        let mut fields = CalculatedFields::new();
        fields.insert(CalculatedFieldName::MarginAmount, field(dec!(10), "1.0.0"));
        fields.insert(CalculatedFieldName::MarginAmount, field(dec!(10), "2.0.0"));

        assert_eq!(
            fields
                .get(CalculatedFieldName::MarginAmount)
                .unwrap()
                .calculation_version,
            "2.0.0"
        );
        let old: Vec<_> = fields.history_of(CalculatedFieldName::MarginAmount).collect();
        assert_eq!(old.len(), 1);
        assert_eq!(old[0].calculation_version, "1.0.0");
    }

    #[test]
    fn test_remove_moves_to_history() {
        let mut fields = CalculatedFields::new();
        fields.insert(CalculatedFieldName::SpendPercentage, field(dec!(40), "1.0.0"));

        assert!(fields.remove(CalculatedFieldName::SpendPercentage, Utc::now()));
        assert!(!fields.contains(CalculatedFieldName::SpendPercentage));
        assert_eq!(fields.history().len(), 1);
        assert!(!fields.remove(CalculatedFieldName::SpendPercentage, Utc::now()));
    }

    #[test]
    fn test_field_names_map_to_formulas() {
        assert_eq!(CalculatedFieldName::RemainingBudget.formula_name(), "remainingAmount");
        assert_eq!(CalculatedFieldName::ALL.len(), 11);
        let per_unit: Vec<_> = CalculatedFieldName::ALL
            .iter()
            .filter(|name| name.is_per_unit_cost())
            .collect();
        assert_eq!(
            per_unit,
            vec![&CalculatedFieldName::UnitCost, &CalculatedFieldName::CostPerMille]
        );
    }
}
