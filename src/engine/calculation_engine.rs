// ============================================================================
// Calculation Engine
// Stateless, versioned formula evaluation with precision narrowing
// ============================================================================

use super::formulas::{Formula, FormulaRegistry};
use super::precision::PrecisionResolver;
use crate::domain::calculation::{CalculationResult, PrecisionResult};
use crate::domain::config::PrecisionContext;
use crate::numeric::{parse_decimal, CalculationError, CalculationResultOf};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Active formula version reported by `CalculationEngine::version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersion {
    pub version: String,
}

/// Evaluates registered formulas under one injected calculation version.
///
/// The engine holds no state between calls, so a single instance can be
/// shared across threads. Two engines built with different versions can run
/// side by side during a migration window.
///
/// # Example
/// ```
/// use campaign_finance_engine::prelude::*;
/// use rust_decimal::Decimal;
///
/// let engine = EngineBuilder::new().build().unwrap();
/// let result = engine
///     .calculate("spendPercentage", &[Decimal::new(400000, 2), Decimal::new(1000000, 2)])
///     .unwrap()
///     .unwrap();
/// let display = engine.with_precision(&result, PrecisionContext::Display, None);
/// assert_eq!(display.value().to_string(), "40.00");
/// ```
#[derive(Debug, Clone)]
pub struct CalculationEngine {
    version: String,
    registry: Arc<FormulaRegistry>,
    resolver: PrecisionResolver,
}

impl CalculationEngine {
    /// Create an engine for `version`.
    ///
    /// # Errors
    /// Returns `UnknownVersion` when the registry has no formulas under it.
    pub fn new(
        version: impl Into<String>,
        registry: Arc<FormulaRegistry>,
        resolver: PrecisionResolver,
    ) -> CalculationResultOf<Self> {
        let version = version.into();
        if !registry.has_version(&version) {
            return Err(CalculationError::UnknownVersion { version });
        }
        Ok(Self {
            version,
            registry,
            resolver,
        })
    }

    pub fn version(&self) -> EngineVersion {
        EngineVersion {
            version: self.version.clone(),
        }
    }

    pub fn version_str(&self) -> &str {
        &self.version
    }

    pub fn resolver(&self) -> &PrecisionResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &FormulaRegistry {
        &self.registry
    }

    /// Look up a formula of the active version.
    pub fn formula(&self, name: &str) -> CalculationResultOf<&Formula> {
        self.registry
            .get(&self.version, name)
            .ok_or_else(|| CalculationError::UnknownFormula {
                formula: name.to_string(),
                version: self.version.clone(),
            })
    }

    /// Evaluate `formula_name` over `operands`.
    ///
    /// Returns `Ok(None)` when the value is undefined for these operands,
    /// e.g. a percentage of a zero target.
    ///
    /// # Errors
    /// - `UnknownFormula` if the name is not registered for this version
    /// - `FormulaArityError` on an operand count mismatch
    /// - `Overflow` if an intermediate result leaves the decimal range
    pub fn calculate(
        &self,
        formula_name: &str,
        operands: &[Decimal],
    ) -> CalculationResultOf<Option<CalculationResult>> {
        let formula = self.formula(formula_name)?;
        if operands.len() != formula.arity() {
            return Err(CalculationError::FormulaArityError {
                formula: formula_name.to_string(),
                expected: formula.arity(),
                actual: operands.len(),
            });
        }

        let value = formula
            .evaluate(operands)
            .map_err(|_| CalculationError::Overflow {
                formula: formula_name.to_string(),
            })?;

        match value {
            Some(value) => Ok(Some(CalculationResult::new(
                value,
                formula.expression().to_string(),
                self.version.clone(),
                Utc::now(),
            ))),
            None => {
                tracing::trace!(formula = formula_name, "undefined ratio, value omitted");
                Ok(None)
            }
        }
    }

    /// Parse raw operand strings, then `calculate`.
    ///
    /// # Errors
    /// `InvalidDecimalFormat` carrying the first malformed operand, plus
    /// everything `calculate` can return.
    pub fn calculate_str(
        &self,
        formula_name: &str,
        operands: &[&str],
    ) -> CalculationResultOf<Option<CalculationResult>> {
        let parsed = operands
            .iter()
            .map(|raw| parse_decimal(raw))
            .collect::<CalculationResultOf<Vec<_>>>()?;
        self.calculate(formula_name, &parsed)
    }

    /// Narrow a result to the precision policy for `context`.
    ///
    /// Idempotent: applying it again to the returned value for the same
    /// context and qualifier yields the same value.
    pub fn with_precision(
        &self,
        result: &CalculationResult,
        context: PrecisionContext,
        unit_type: Option<&str>,
    ) -> PrecisionResult {
        let (value, rule) = self.resolver.apply(result.value(), context, unit_type);
        let rounded = CalculationResult::new(
            value,
            result.formula().to_string(),
            result.calculation_version().to_string(),
            result.calculated_at(),
        );
        PrecisionResult::new(rounded, context, rule.decimal_places, rule.rounding_mode)
    }
}
