// ============================================================================
// Engine Factory
// Creates calculation engines with proper configuration
// ============================================================================

use crate::domain::config::{
    ConfigError, EngineConfig, PrecisionContext, PrecisionPolicyTable, PrecisionRule,
};
use crate::engine::formulas::{Formula, FormulaRegistry};
use crate::engine::{CalculationEngine, PrecisionResolver};
use std::sync::Arc;

// ============================================================================
// Factory Functions
// ============================================================================

/// Creates a calculation engine from configuration
///
/// # Arguments
/// * `config` - Engine configuration (version, precision table)
/// * `registry` - Formula registry the version is resolved against
///
/// # Example
/// ```
/// use campaign_finance_engine::prelude::*;
/// use campaign_finance_engine::engine::factory::create_from_config;
/// use std::sync::Arc;
///
/// let registry = Arc::new(FormulaRegistry::standard());
/// let engine = create_from_config(&EngineConfig::standard(), registry).unwrap();
/// assert_eq!(engine.version().version, "1.0.0");
/// ```
pub fn create_from_config(
    config: &EngineConfig,
    registry: Arc<FormulaRegistry>,
) -> Result<CalculationEngine, ConfigError> {
    // Validate configuration first
    config.validate()?;

    let resolver = PrecisionResolver::new(config.precision.clone());

    CalculationEngine::new(config.calculation_version.clone(), registry, resolver)
        .map_err(|_| ConfigError::UnregisteredVersion(config.calculation_version.clone()))
}

// ============================================================================
// Builder Pattern for Advanced Configuration
// ============================================================================

/// Builder for creating calculation engines with fluent API
///
/// # Example
/// ```
/// use campaign_finance_engine::prelude::*;
///
/// let engine = EngineBuilder::new()
///     .storage_decimal_places(8)
///     .precision_override(PrecisionContext::Display, "meta/cpm", PrecisionRule::half_up(4))
///     .build()
///     .unwrap();
///
/// assert_eq!(engine.resolver().resolve(PrecisionContext::Storage, None).decimal_places, 8);
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    registry: FormulaRegistry,
}

impl EngineBuilder {
    /// Standard formulas, standard precision table
    pub fn new() -> Self {
        Self {
            config: EngineConfig::standard(),
            registry: FormulaRegistry::standard(),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            registry: FormulaRegistry::standard(),
        }
    }

    // ========================================================================
    // Formula Configuration
    // ========================================================================

    /// Select the active calculation version
    pub fn calculation_version(mut self, version: impl Into<String>) -> Self {
        self.config.calculation_version = version.into();
        self
    }

    /// Replace the formula registry
    pub fn registry(mut self, registry: FormulaRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register a formula under a version
    pub fn formula(mut self, version: &str, formula: Formula) -> Self {
        self.registry.register(version, formula);
        self
    }

    // ========================================================================
    // Precision Configuration
    // ========================================================================

    /// Replace the precision table
    pub fn precision_table(mut self, table: PrecisionPolicyTable) -> Self {
        self.config.precision = table;
        self
    }

    /// Set decimal places for the storage context (half-up)
    pub fn storage_decimal_places(mut self, places: u32) -> Self {
        self.config.precision = self
            .config
            .precision
            .with_default(PrecisionContext::Storage, PrecisionRule::half_up(places));
        self
    }

    /// Add a `(context, qualifier)` override
    pub fn precision_override(
        mut self,
        context: PrecisionContext,
        qualifier: &str,
        rule: PrecisionRule,
    ) -> Self {
        self.config.precision = self.config.precision.with_override(context, qualifier, rule);
        self
    }

    // ========================================================================
    // Batching Configuration
    // ========================================================================

    /// Set batch size used by orchestrators built from this config
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Set per-batch calculation worker count
    pub fn calculation_workers(mut self, workers: usize) -> Self {
        self.config.calculation_workers = workers;
        self
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Build the calculation engine
    pub fn build(self) -> Result<CalculationEngine, ConfigError> {
        create_from_config(&self.config, Arc::new(self.registry))
    }

    /// Build the engine and return the configuration it was built from
    pub fn build_with_config(self) -> Result<(CalculationEngine, EngineConfig), ConfigError> {
        let engine = create_from_config(&self.config, Arc::new(self.registry))?;
        Ok((engine, self.config))
    }

    /// Get the configuration without building (for inspection)
    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::RoundingMode;

    #[test]
    fn test_create_standard_engine() {
        let engine =
            create_from_config(&EngineConfig::standard(), Arc::new(FormulaRegistry::standard()))
                .unwrap();
        assert_eq!(engine.version_str(), "1.0.0");
    }

    #[test]
    fn test_unregistered_version() {
        let result = EngineBuilder::new().calculation_version("3.0.0").build();
        assert_eq!(
            result.unwrap_err(),
            ConfigError::UnregisteredVersion("3.0.0".to_string())
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert_eq!(
            EngineBuilder::new().batch_size(0).build().unwrap_err(),
            ConfigError::ZeroBatchSize
        );
        assert_eq!(
            EngineBuilder::new().calculation_workers(0).build().unwrap_err(),
            ConfigError::ZeroWorkers
        );
    }

    #[test]
    fn test_builder_precision() {
        let engine = EngineBuilder::new()
            .precision_override(
                PrecisionContext::Api,
                "tiktok/cpv",
                PrecisionRule::new(5, RoundingMode::Down),
            )
            .build()
            .unwrap();

        assert_eq!(
            engine
                .resolver()
                .resolve(PrecisionContext::Api, Some("tiktok/cpv")),
            PrecisionRule::new(5, RoundingMode::Down)
        );
    }

    #[test]
    fn test_build_with_config() {
        let (engine, config) = EngineBuilder::new()
            .batch_size(25)
            .calculation_workers(4)
            .build_with_config()
            .unwrap();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.calculation_workers, 4);
        assert_eq!(engine.version_str(), config.calculation_version);
    }
}
