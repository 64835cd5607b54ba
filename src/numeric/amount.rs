// ============================================================================
// Financial Amount
// Exact decimal amounts with a currency code
// ============================================================================

use super::errors::{CalculationError, CalculationResultOf};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Parse a raw operand string into an exact decimal.
///
/// Accepts an optional sign, digits and a single decimal point. Thousands
/// separators, exponents and anything `Decimal` would have to round are
/// rejected with `InvalidDecimalFormat` carrying the raw input.
pub fn parse_decimal(raw: &str) -> CalculationResultOf<Decimal> {
    let invalid = || CalculationError::InvalidDecimalFormat {
        raw: raw.to_string(),
    };

    let s = raw.trim();
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    if digits.is_empty() || digits == "." {
        return Err(invalid());
    }
    if digits.matches('.').count() > 1 || !digits.chars().all(|c| c.is_ascii_digit() || c == '.')
    {
        return Err(invalid());
    }

    let mut normalized = String::with_capacity(digits.len() + 2);
    if digits.starts_with('.') {
        normalized.push('0');
    }
    normalized.push_str(digits);
    if digits.ends_with('.') {
        normalized.push('0');
    }

    let value = Decimal::from_str_exact(&normalized).map_err(|_| invalid())?;
    if s.starts_with('-') {
        Ok(-value)
    } else {
        Ok(value)
    }
}

// ============================================================================
// Currency
// ============================================================================

/// ISO-4217 style three-letter currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Currency(String);

impl Currency {
    /// Returns `None` unless `code` is exactly three ASCII letters.
    pub fn new(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(Self(code.to_ascii_uppercase()))
        } else {
            None
        }
    }

    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::usd()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value).ok_or_else(|| format!("invalid currency code: {}", value))
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

// ============================================================================
// Financial Amount
// ============================================================================

/// An exact decimal amount in a given currency.
///
/// Never backed by a binary float; all arithmetic stays in `Decimal`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FinancialAmount {
    pub amount: Decimal,
    pub currency: Currency,
}

impl FinancialAmount {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Amount in US dollars, the platform's default reporting currency.
    pub fn usd(amount: Decimal) -> Self {
        Self::new(amount, Currency::usd())
    }

    /// Parse a raw amount string.
    ///
    /// # Errors
    /// Returns `InvalidDecimalFormat` when `raw` is not an exact decimal.
    pub fn parse(raw: &str, currency: Currency) -> CalculationResultOf<Self> {
        parse_decimal(raw).map(|amount| Self::new(amount, currency))
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn same_currency(&self, other: &FinancialAmount) -> bool {
        self.currency == other.currency
    }
}

impl fmt::Display for FinancialAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

impl FromStr for FinancialAmount {
    type Err = CalculationError;

    /// Parse `"<amount> <CUR>"`; a bare amount is taken as USD.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let amount = parts.next().unwrap_or_default();
        let currency = match parts.next() {
            Some(code) => Currency::new(code).ok_or_else(|| {
                CalculationError::InvalidDecimalFormat { raw: s.to_string() }
            })?,
            None => Currency::usd(),
        };
        if parts.next().is_some() {
            return Err(CalculationError::InvalidDecimalFormat { raw: s.to_string() });
        }
        Self::parse(amount, currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("10000.00").unwrap(), dec!(10000.00));
        assert_eq!(parse_decimal(" -0.001 ").unwrap(), dec!(-0.001));
        assert_eq!(parse_decimal("+42").unwrap(), dec!(42));
        assert_eq!(parse_decimal(".5").unwrap(), dec!(0.5));
        assert_eq!(parse_decimal("7.").unwrap(), dec!(7));
    }

    #[test]
    fn test_parse_decimal_rejects_malformed() {
        for raw in ["", "abc", "1,000.00", "1.2.3", "1e5", "1_000", "-", "."] {
            assert_eq!(
                parse_decimal(raw),
                Err(CalculationError::InvalidDecimalFormat {
                    raw: raw.to_string()
                }),
                "input {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_parse_keeps_scale() {
        // "100.00" must stay 100.00, not collapse through a float
        let amount = FinancialAmount::parse("100.00", Currency::usd()).unwrap();
        assert_eq!(amount.amount.to_string(), "100.00");
        assert_eq!(amount.to_string(), "100.00 USD");
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(Currency::new("eur").unwrap().as_str(), "EUR");
        assert!(Currency::new("EURO").is_none());
        assert!(Currency::new("U$D").is_none());
    }

    #[test]
    fn test_from_str() {
        let amount: FinancialAmount = "250.50 EUR".parse().unwrap();
        assert_eq!(amount.amount, dec!(250.50));
        assert_eq!(amount.currency.as_str(), "EUR");

        let bare: FinancialAmount = "12".parse().unwrap();
        assert_eq!(bare.currency, Currency::usd());

        assert!("12 EUR extra".parse::<FinancialAmount>().is_err());
    }
}
