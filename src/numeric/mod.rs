// ============================================================================
// Numeric Module
// Exact decimal arithmetic for financial calculations
// ============================================================================
//
// This module provides:
// - FinancialAmount: Decimal amount plus currency code
// - RoundingMode: named rounding modes persisted with every derived value
// - CalculationError: Error types for parsing and formula evaluation
//
// Design principles:
// - No floating-point operations
// - Parsing and evaluation return Result (no panics)
// - Rounding always yields the exact requested scale

mod amount;
mod errors;
mod rounding;

pub use amount::{parse_decimal, Currency, FinancialAmount};
pub use errors::{CalculationError, CalculationResultOf};
pub use rounding::{RoundingMode, MAX_DECIMAL_PLACES};
