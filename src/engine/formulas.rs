// ============================================================================
// Formula Registry
// Named, versioned formulas over exact decimal operands
// ============================================================================

use crate::domain::config::STANDARD_CALCULATION_VERSION;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

/// Intermediate result left the decimal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOverflow;

/// `Ok(None)` means the value is undefined for these operands (zero
/// denominator); the caller omits the field instead of storing a sentinel.
pub type Evaluation = Result<Option<Decimal>, ArithmeticOverflow>;

/// Pure formula body. Receives exactly `parameters.len()` operands.
pub type FormulaFn = fn(&[Decimal]) -> Evaluation;

/// A named formula with its human-readable expression.
///
/// The expression text is what gets stored with every calculated value, so
/// it must change whenever the body changes (together with the version).
#[derive(Debug, Clone)]
pub struct Formula {
    name: String,
    expression: String,
    parameters: Vec<String>,
    eval: FormulaFn,
}

impl Formula {
    pub fn new(name: &str, expression: &str, parameters: &[&str], eval: FormulaFn) -> Self {
        Self {
            name: name.to_string(),
            expression: expression.to_string(),
            parameters: parameters.iter().map(|p| p.to_string()).collect(),
            eval,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Evaluate without an arity check; the engine checks arity first.
    pub(crate) fn evaluate(&self, operands: &[Decimal]) -> Evaluation {
        (self.eval)(operands)
    }
}

// ============================================================================
// Arithmetic helpers
// ============================================================================

fn sub(a: Decimal, b: Decimal) -> Result<Decimal, ArithmeticOverflow> {
    a.checked_sub(b).ok_or(ArithmeticOverflow)
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal, ArithmeticOverflow> {
    a.checked_mul(b).ok_or(ArithmeticOverflow)
}

/// `None` for a zero denominator, overflow otherwise.
fn div(a: Decimal, b: Decimal) -> Result<Option<Decimal>, ArithmeticOverflow> {
    if b.is_zero() {
        return Ok(None);
    }
    a.checked_div(b).map(Some).ok_or(ArithmeticOverflow)
}

fn percent_of(numerator: Decimal, denominator: Decimal) -> Evaluation {
    match div(numerator, denominator)? {
        Some(ratio) => mul(ratio, Decimal::ONE_HUNDRED).map(Some),
        None => Ok(None),
    }
}

/// `amount * (100 - pct) / 100`
fn less_percentage(amount: Decimal, pct: Decimal) -> Evaluation {
    let kept = sub(Decimal::ONE_HUNDRED, pct)?;
    div(mul(amount, kept)?, Decimal::ONE_HUNDRED)
}

// ============================================================================
// Standard formula set
// ============================================================================

fn margin_amount(ops: &[Decimal]) -> Evaluation {
    sub(ops[0], ops[1]).map(Some)
}

fn margin_percentage(ops: &[Decimal]) -> Evaluation {
    percent_of(sub(ops[0], ops[1])?, ops[0])
}

fn net_revenue(ops: &[Decimal]) -> Evaluation {
    less_percentage(ops[0], ops[1])
}

fn media_budget(ops: &[Decimal]) -> Evaluation {
    less_percentage(ops[0], ops[1])
}

fn remaining_amount(ops: &[Decimal]) -> Evaluation {
    sub(ops[0], ops[1]).map(Some)
}

fn spend_percentage(ops: &[Decimal]) -> Evaluation {
    percent_of(ops[0], ops[1])
}

fn expected_to_date(ops: &[Decimal]) -> Evaluation {
    div(mul(ops[0], ops[1])?, ops[2])
}

fn pacing_percentage(ops: &[Decimal]) -> Evaluation {
    percent_of(ops[0], ops[1])
}

fn delivery_percentage(ops: &[Decimal]) -> Evaluation {
    percent_of(ops[0], ops[1])
}

fn unit_cost(ops: &[Decimal]) -> Evaluation {
    div(ops[0], ops[1])
}

fn cost_per_mille(ops: &[Decimal]) -> Evaluation {
    match div(ops[0], ops[1])? {
        Some(per_impression) => mul(per_impression, Decimal::ONE_THOUSAND).map(Some),
        None => Ok(None),
    }
}

/// Formulas of the standard set, registered under `"1.0.0"`.
pub fn standard_formulas() -> Vec<Formula> {
    vec![
        Formula::new(
            "marginAmount",
            "revenue - cost",
            &["revenue", "cost"],
            margin_amount,
        ),
        Formula::new(
            "marginPercentage",
            "(revenue - cost) / revenue * 100",
            &["revenue", "cost"],
            margin_percentage,
        ),
        Formula::new(
            "netRevenue",
            "grossRevenue * (100 - agencyFeePercentage) / 100",
            &["grossRevenue", "agencyFeePercentage"],
            net_revenue,
        ),
        Formula::new(
            "mediaBudget",
            "netRevenue * (100 - targetMarginPercentage) / 100",
            &["netRevenue", "targetMarginPercentage"],
            media_budget,
        ),
        Formula::new(
            "remainingAmount",
            "targetAmount - actualAmount",
            &["targetAmount", "actualAmount"],
            remaining_amount,
        ),
        Formula::new(
            "spendPercentage",
            "actualAmount / targetAmount * 100",
            &["actualAmount", "targetAmount"],
            spend_percentage,
        ),
        Formula::new(
            "expectedToDate",
            "targetAmount * elapsedDays / totalDays",
            &["targetAmount", "elapsedDays", "totalDays"],
            expected_to_date,
        ),
        Formula::new(
            "pacingPercentage",
            "actualToDate / expectedToDate * 100",
            &["actualToDate", "expectedToDate"],
            pacing_percentage,
        ),
        Formula::new(
            "deliveryPercentage",
            "actualUnits / targetUnits * 100",
            &["actualUnits", "targetUnits"],
            delivery_percentage,
        ),
        Formula::new("unitCost", "cost / units", &["cost", "units"], unit_cost),
        Formula::new(
            "costPerMille",
            "cost / impressions * 1000",
            &["cost", "impressions"],
            cost_per_mille,
        ),
    ]
}

// ============================================================================
// Registry
// ============================================================================

/// Formulas keyed by `(version, name)`.
///
/// A formula change is registered under a new version; earlier versions
/// stay available so stored values remain reproducible.
#[derive(Debug, Clone, Default)]
pub struct FormulaRegistry {
    formulas: HashMap<(String, String), Formula>,
}

impl FormulaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the standard formula set
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for formula in standard_formulas() {
            registry.register(STANDARD_CALCULATION_VERSION, formula);
        }
        registry
    }

    /// Register (or replace) a formula under a version.
    pub fn register(&mut self, version: &str, formula: Formula) -> &mut Self {
        self.formulas
            .insert((version.to_string(), formula.name.clone()), formula);
        self
    }

    /// Builder method: register a formula
    pub fn with_formula(mut self, version: &str, formula: Formula) -> Self {
        self.register(version, formula);
        self
    }

    /// Builder method: start `version` as a copy of every formula in `base`
    pub fn with_version_from(mut self, version: &str, base: &str) -> Self {
        let copied: Vec<Formula> = self
            .formulas
            .iter()
            .filter(|((v, _), _)| v == base)
            .map(|(_, f)| f.clone())
            .collect();
        for formula in copied {
            self.register(version, formula);
        }
        self
    }

    pub fn get(&self, version: &str, name: &str) -> Option<&Formula> {
        self.formulas.get(&(version.to_string(), name.to_string()))
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.formulas.keys().any(|(v, _)| v == version)
    }

    pub fn versions(&self) -> BTreeSet<&str> {
        self.formulas.keys().map(|(v, _)| v.as_str()).collect()
    }

    /// Names registered under a version, sorted
    pub fn formula_names(&self, version: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .formulas
            .keys()
            .filter(|(v, _)| v == version)
            .map(|(_, n)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}
