// ============================================================================
// Precision Policy Resolver
// Maps (context, unit type / platform) to decimal places and rounding mode
// ============================================================================

use crate::domain::config::{PrecisionContext, PrecisionPolicyTable, PrecisionRule};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Which level of the policy table produced a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionLevel {
    /// Exact `(context, qualifier)` entry
    Exact,
    /// Unit part of a `platform/unit` qualifier
    UnitType,
    /// Context default
    Context,
    /// Global default
    Global,
}

/// Pure lookup over an immutable policy table.
///
/// Resolution order:
/// 1. exact `(context, qualifier)` match
/// 2. for `platform/unit` qualifiers, `(context, unit)`
/// 3. context default
/// 4. global default (2 dp, half-up unless configured otherwise)
///
/// # Example
/// ```
/// use campaign_finance_engine::domain::{PrecisionContext, PrecisionPolicyTable};
/// use campaign_finance_engine::engine::PrecisionResolver;
///
/// let resolver = PrecisionResolver::new(PrecisionPolicyTable::standard());
/// assert_eq!(resolver.resolve(PrecisionContext::Storage, None).decimal_places, 6);
/// assert_eq!(resolver.resolve(PrecisionContext::Display, Some("meta/cpm")).decimal_places, 3);
/// ```
#[derive(Debug, Clone)]
pub struct PrecisionResolver {
    table: Arc<PrecisionPolicyTable>,
}

impl PrecisionResolver {
    pub fn new(table: PrecisionPolicyTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &PrecisionPolicyTable {
        &self.table
    }

    pub fn resolve(&self, context: PrecisionContext, qualifier: Option<&str>) -> PrecisionRule {
        self.resolve_with_level(context, qualifier).0
    }

    pub fn resolve_with_level(
        &self,
        context: PrecisionContext,
        qualifier: Option<&str>,
    ) -> (PrecisionRule, ResolutionLevel) {
        if let Some(qualifier) = qualifier.filter(|q| !q.trim().is_empty()) {
            if let Some(rule) = self.table.override_for(context, qualifier) {
                return (rule, ResolutionLevel::Exact);
            }
            if let Some((_, unit)) = qualifier.split_once('/') {
                if let Some(rule) = self.table.override_for(context, unit) {
                    return (rule, ResolutionLevel::UnitType);
                }
            }
        }

        match self.table.default_for(context) {
            Some(rule) => (rule, ResolutionLevel::Context),
            None => (self.table.global(), ResolutionLevel::Global),
        }
    }

    /// Round `value` under the resolved rule.
    pub fn apply(
        &self,
        value: Decimal,
        context: PrecisionContext,
        qualifier: Option<&str>,
    ) -> (Decimal, PrecisionRule) {
        let rule = self.resolve(context, qualifier);
        (rule.rounding_mode.apply(value, rule.decimal_places), rule)
    }
}

impl Default for PrecisionResolver {
    fn default() -> Self {
        Self::new(PrecisionPolicyTable::standard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::RoundingMode;
    use rust_decimal_macros::dec;

    fn resolver() -> PrecisionResolver {
        let table = PrecisionPolicyTable::standard().with_override(
            PrecisionContext::Display,
            "google_ads/cpc",
            PrecisionRule::new(4, RoundingMode::HalfEven),
        );
        PrecisionResolver::new(table)
    }

    #[test]
    fn test_context_defaults() {
        let r = resolver();
        assert_eq!(r.resolve(PrecisionContext::Storage, None), PrecisionRule::half_up(6));
        assert_eq!(r.resolve(PrecisionContext::Display, None), PrecisionRule::half_up(2));
        assert_eq!(r.resolve(PrecisionContext::Api, None), PrecisionRule::half_up(2));
    }

    #[test]
    fn test_resolution_order() {
        let r = resolver();

        assert_eq!(
            r.resolve_with_level(PrecisionContext::Display, Some("Google_Ads/CPC")),
            (PrecisionRule::new(4, RoundingMode::HalfEven), ResolutionLevel::Exact)
        );
        assert_eq!(
            r.resolve_with_level(PrecisionContext::Display, Some("meta/cpc")),
            (PrecisionRule::half_up(3), ResolutionLevel::UnitType)
        );
        assert_eq!(
            r.resolve_with_level(PrecisionContext::Display, Some("flat_fee")),
            (PrecisionRule::half_up(2), ResolutionLevel::Context)
        );
        assert_eq!(
            r.resolve_with_level(PrecisionContext::Storage, Some("cpm")),
            (PrecisionRule::half_up(6), ResolutionLevel::Context)
        );
    }

    #[test]
    fn test_global_fallback() {
        let r = PrecisionResolver::new(PrecisionPolicyTable::new(PrecisionRule::default()));
        assert_eq!(
            r.resolve_with_level(PrecisionContext::Storage, Some("cpm")),
            (PrecisionRule::half_up(2), ResolutionLevel::Global)
        );
    }

    #[test]
    fn test_apply() {
        let r = resolver();
        let (value, rule) = r.apply(dec!(12.34567), PrecisionContext::Api, Some("cpm"));
        assert_eq!(rule.decimal_places, 4);
        assert_eq!(value.to_string(), "12.3457");
    }
}
