// ============================================================================
// Engine Configuration
// Precision policy table, calculation version and batching parameters
// ============================================================================

use crate::numeric::{RoundingMode, MAX_DECIMAL_PLACES};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Version string of the standard formula set.
pub const STANDARD_CALCULATION_VERSION: &str = "1.0.0";

/// Default number of records per persistence batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

// ============================================================================
// Precision Context
// ============================================================================

/// Where a calculated value is going to be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PrecisionContext {
    /// Persisted values (6 decimal places by default)
    Storage,
    /// Values rendered in the UI (2 decimal places by default)
    Display,
    /// Values returned over the HTTP API (2 decimal places by default)
    Api,
}

impl PrecisionContext {
    pub fn as_str(self) -> &'static str {
        match self {
            PrecisionContext::Storage => "storage",
            PrecisionContext::Display => "display",
            PrecisionContext::Api => "api",
        }
    }
}

impl fmt::Display for PrecisionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrecisionContext {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "storage" => Ok(PrecisionContext::Storage),
            "display" => Ok(PrecisionContext::Display),
            "api" => Ok(PrecisionContext::Api),
            other => Err(ConfigError::UnknownContext(other.to_string())),
        }
    }
}

// ============================================================================
// Precision Rule
// ============================================================================

/// Decimal places and rounding mode applied to a calculated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrecisionRule {
    pub decimal_places: u32,
    pub rounding_mode: RoundingMode,
}

impl PrecisionRule {
    pub const fn new(decimal_places: u32, rounding_mode: RoundingMode) -> Self {
        Self {
            decimal_places,
            rounding_mode,
        }
    }

    pub const fn half_up(decimal_places: u32) -> Self {
        Self::new(decimal_places, RoundingMode::HalfUp)
    }
}

impl Default for PrecisionRule {
    /// Global fallback: 2 decimal places, round half-up.
    fn default() -> Self {
        Self::half_up(2)
    }
}

// ============================================================================
// Precision Policy Table
// ============================================================================

/// Override entry keyed by context and a unit type / platform qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrecisionOverride {
    pub context: PrecisionContext,
    /// Unit type (`cpm`), platform (`meta`) or `platform/unit` pair
    pub qualifier: String,
    pub rule: PrecisionRule,
}

/// Immutable precision policy table supplied at construction.
///
/// Qualifiers are normalised to lower case when the table is built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "PolicyTableSpec", into = "PolicyTableSpec"))]
pub struct PrecisionPolicyTable {
    defaults: HashMap<PrecisionContext, PrecisionRule>,
    overrides: HashMap<(PrecisionContext, String), PrecisionRule>,
    global: PrecisionRule,
}

impl PrecisionPolicyTable {
    /// Empty table: every lookup falls through to the global default.
    pub fn new(global: PrecisionRule) -> Self {
        Self {
            defaults: HashMap::new(),
            overrides: HashMap::new(),
            global,
        }
    }

    /// Standard platform policy.
    ///
    /// - storage: 6 dp, display/api: 2 dp
    /// - per-unit costs (CPM, CPC, CPV): 3 dp for display, 4 dp over the API
    pub fn standard() -> Self {
        let mut table = Self::new(PrecisionRule::default())
            .with_default(PrecisionContext::Storage, PrecisionRule::half_up(6))
            .with_default(PrecisionContext::Display, PrecisionRule::half_up(2))
            .with_default(PrecisionContext::Api, PrecisionRule::half_up(2));

        for unit in ["cpm", "cpc", "cpv"] {
            table = table
                .with_override(PrecisionContext::Display, unit, PrecisionRule::half_up(3))
                .with_override(PrecisionContext::Api, unit, PrecisionRule::half_up(4));
        }
        table
    }

    /// Builder method: set the default rule for a context
    pub fn with_default(mut self, context: PrecisionContext, rule: PrecisionRule) -> Self {
        self.defaults.insert(context, rule);
        self
    }

    /// Builder method: add an override for a `(context, qualifier)` pair
    pub fn with_override(
        mut self,
        context: PrecisionContext,
        qualifier: &str,
        rule: PrecisionRule,
    ) -> Self {
        self.overrides
            .insert((context, normalize_qualifier(qualifier)), rule);
        self
    }

    pub fn global(&self) -> PrecisionRule {
        self.global
    }

    pub fn default_for(&self, context: PrecisionContext) -> Option<PrecisionRule> {
        self.defaults.get(&context).copied()
    }

    pub fn override_for(
        &self,
        context: PrecisionContext,
        qualifier: &str,
    ) -> Option<PrecisionRule> {
        self.overrides
            .get(&(context, normalize_qualifier(qualifier)))
            .copied()
    }

    /// Validate that every rule fits within the decimal scale ceiling
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rules = std::iter::once(&self.global)
            .chain(self.defaults.values())
            .chain(self.overrides.values());
        for rule in rules {
            if rule.decimal_places > MAX_DECIMAL_PLACES {
                return Err(ConfigError::DecimalPlacesOutOfRange(rule.decimal_places));
            }
        }
        for (_, qualifier) in self.overrides.keys() {
            if qualifier.is_empty() {
                return Err(ConfigError::EmptyQualifier);
            }
        }
        Ok(())
    }
}

impl Default for PrecisionPolicyTable {
    fn default() -> Self {
        Self::standard()
    }
}

pub(crate) fn normalize_qualifier(qualifier: &str) -> String {
    qualifier.trim().to_ascii_lowercase()
}

/// Flat form of the policy table used for (de)serialization.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct PolicyTableSpec {
    #[serde(default)]
    global: PrecisionRule,
    #[serde(default)]
    defaults: HashMap<PrecisionContext, PrecisionRule>,
    #[serde(default)]
    overrides: Vec<PrecisionOverride>,
}

#[cfg(feature = "serde")]
impl From<PolicyTableSpec> for PrecisionPolicyTable {
    fn from(spec: PolicyTableSpec) -> Self {
        let mut table = PrecisionPolicyTable::new(spec.global);
        for (context, rule) in spec.defaults {
            table = table.with_default(context, rule);
        }
        for entry in spec.overrides {
            table = table.with_override(entry.context, &entry.qualifier, entry.rule);
        }
        table
    }
}

#[cfg(feature = "serde")]
impl From<PrecisionPolicyTable> for PolicyTableSpec {
    fn from(table: PrecisionPolicyTable) -> Self {
        let mut overrides: Vec<PrecisionOverride> = table
            .overrides
            .into_iter()
            .map(|((context, qualifier), rule)| PrecisionOverride {
                context,
                qualifier,
                rule,
            })
            .collect();
        overrides.sort_by(|a, b| {
            (a.context.as_str(), &a.qualifier).cmp(&(b.context.as_str(), &b.qualifier))
        });
        Self {
            global: table.global,
            defaults: table.defaults,
            overrides,
        }
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Configuration errors surfaced at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("calculation version cannot be empty")]
    EmptyVersion,
    #[error("batch size must be positive")]
    ZeroBatchSize,
    #[error("calculation worker count must be positive")]
    ZeroWorkers,
    #[error("decimal places {0} exceed the maximum decimal scale")]
    DecimalPlacesOutOfRange(u32),
    #[error("precision override qualifier cannot be empty")]
    EmptyQualifier,
    #[error("unknown precision context: {0}")]
    UnknownContext(String),
    #[error("no formulas registered for calculation version {0}")]
    UnregisteredVersion(String),
    #[error("invalid configuration document: {0}")]
    Parse(String),
}

/// Complete configuration for building a calculation engine and orchestrator.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Active formula version; injected, never global
    pub calculation_version: String,

    /// Precision policy table
    #[cfg_attr(feature = "serde", serde(default))]
    pub precision: PrecisionPolicyTable,

    /// Records per persistence batch
    #[cfg_attr(feature = "serde", serde(default = "default_batch_size"))]
    pub batch_size: usize,

    /// Worker threads for per-item calculation within a batch (1 = inline)
    #[cfg_attr(feature = "serde", serde(default = "default_workers"))]
    pub calculation_workers: usize,
}

#[cfg(feature = "serde")]
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[cfg(feature = "serde")]
fn default_workers() -> usize {
    1
}

impl EngineConfig {
    /// Create a new configuration with required parameters
    pub fn new(calculation_version: impl Into<String>, precision: PrecisionPolicyTable) -> Self {
        Self {
            calculation_version: calculation_version.into(),
            precision,
            batch_size: DEFAULT_BATCH_SIZE,
            calculation_workers: 1,
        }
    }

    /// Standard formula set with the standard precision table
    pub fn standard() -> Self {
        Self::new(STANDARD_CALCULATION_VERSION, PrecisionPolicyTable::standard())
    }

    /// Builder method: Set batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builder method: Set calculation worker count
    pub fn with_calculation_workers(mut self, workers: usize) -> Self {
        self.calculation_workers = workers;
        self
    }

    /// Builder method: Replace the precision table
    pub fn with_precision(mut self, precision: PrecisionPolicyTable) -> Self {
        self.precision = precision;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.calculation_version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.calculation_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        self.precision.validate()
    }

    /// Load and validate a configuration document.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::standard()
    }
}
