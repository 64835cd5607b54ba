// ============================================================================
// Calculated-Field Recorder
// Attaches calculation metadata to every derived value
// ============================================================================

use super::calculation_engine::CalculationEngine;
use crate::domain::calculation::{
    CalculatedField, CalculatedFieldName, CalculatedFields, PrecisionResult,
};
use crate::domain::config::PrecisionContext;
use crate::numeric::CalculationResultOf;
use chrono::Utc;
use rust_decimal::Decimal;

/// Turns a precision-narrowed result into its persisted form. No I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatedFieldRecorder;

impl CalculatedFieldRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record a result; the context and formula travel with `result`.
    pub fn record(&self, result: &PrecisionResult) -> CalculatedField {
        CalculatedField {
            value: result.value(),
            calculation_version: result.calculation_version().to_string(),
            calculated_at: result.result().calculated_at(),
            context: result.context(),
            formula: result.formula().to_string(),
            precision: result.decimal_places(),
            rounding_mode: result.rounding_mode(),
            is_stored: true,
        }
    }
}

/// Derives named fields for one record: calculate, narrow, record.
///
/// This is the only path that attaches derived values to an entity, so
/// every stored number carries the formula, version, rounding mode and
/// timestamp that produced it.
#[derive(Debug, Clone, Copy)]
pub struct FieldCalculator<'a> {
    engine: &'a CalculationEngine,
    recorder: CalculatedFieldRecorder,
    context: PrecisionContext,
    qualifier: Option<&'a str>,
}

impl<'a> FieldCalculator<'a> {
    pub fn new(engine: &'a CalculationEngine, context: PrecisionContext) -> Self {
        Self {
            engine,
            recorder: CalculatedFieldRecorder,
            context,
            qualifier: None,
        }
    }

    /// Same calculator with a unit type / platform qualifier for precision
    pub fn with_qualifier(self, qualifier: Option<&'a str>) -> Self {
        Self { qualifier, ..self }
    }

    pub fn engine(&self) -> &'a CalculationEngine {
        self.engine
    }

    pub fn context(&self) -> PrecisionContext {
        self.context
    }

    pub fn qualifier(&self) -> Option<&'a str> {
        self.qualifier
    }

    /// Calculate a field; `Ok(None)` when it is undefined for the operands.
    pub fn derive(
        &self,
        name: CalculatedFieldName,
        operands: &[Decimal],
    ) -> CalculationResultOf<Option<CalculatedField>> {
        Ok(self.evaluate(name, operands)?.map(|(_, field)| field))
    }

    /// Refresh one field of `fields`.
    ///
    /// `operands` is `None` when an input is missing. A missing input or an
    /// undefined value removes the current field (keeping it in history).
    /// Returns the unrounded value so dependent formulas chain on exact
    /// inputs; only the recorded field is narrowed.
    pub fn refresh(
        &self,
        fields: &mut CalculatedFields,
        name: CalculatedFieldName,
        operands: Option<&[Decimal]>,
    ) -> CalculationResultOf<Option<Decimal>> {
        let evaluated = match operands {
            Some(ops) => self.evaluate(name, ops)?,
            None => None,
        };
        match evaluated {
            Some((exact, field)) => {
                fields.insert(name, field);
                Ok(Some(exact))
            }
            None => {
                fields.remove(name, Utc::now());
                Ok(None)
            }
        }
    }

    fn evaluate(
        &self,
        name: CalculatedFieldName,
        operands: &[Decimal],
    ) -> CalculationResultOf<Option<(Decimal, CalculatedField)>> {
        let result = match self.engine.calculate(name.formula_name(), operands)? {
            Some(result) => result,
            None => return Ok(None),
        };
        // unit overrides only narrow low-value per-unit costs
        let qualifier = if name.is_per_unit_cost() {
            self.qualifier
        } else {
            None
        };
        let narrowed = self.engine.with_precision(&result, self.context, qualifier);
        Ok(Some((result.value(), self.recorder.record(&narrowed))))
    }
}
