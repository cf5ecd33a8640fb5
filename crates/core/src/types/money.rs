//! Currency helpers shared by the pricing pipeline.
//!
//! All monetary values in Quince are carried as [`rust_decimal::Decimal`]
//! in the currency's standard unit (e.g., dollars, not cents). Intermediate
//! arithmetic keeps full precision; displayed/charged amounts are rounded
//! to 2 decimal places with [`round2`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors for monetary values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// A value that must be non-negative was negative.
    #[error("amount must not be negative: {0}")]
    Negative(Decimal),
}

/// Round a currency amount to 2 decimal places, half-up.
///
/// Applied to tax and total outputs only; subtotal and discount inputs are
/// carried at full precision.
#[must_use]
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate that an amount is not negative.
///
/// # Errors
///
/// Returns `MoneyError::Negative` if the amount is below zero.
pub fn ensure_non_negative(amount: Decimal) -> Result<Decimal, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }
    Ok(amount)
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// The display symbol for this currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "\u{20ac}",
            Self::GBP => "\u{a3}",
        }
    }

    /// The ISO 4217 code as a string.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_round2_half_up() {
        // 9.00915 -> 9.01 (half-up at the third decimal)
        assert_eq!(round2(d("9.00915")), d("9.01"));
        assert_eq!(round2(d("3.82415")), d("3.82"));
        assert_eq!(round2(d("2.005")), d("2.01"));
        assert_eq!(round2(d("2.004")), d("2.00"));
    }

    #[test]
    fn test_round2_passthrough() {
        assert_eq!(round2(d("115.00")), d("115.00"));
        assert_eq!(round2(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_ensure_non_negative() {
        assert_eq!(ensure_non_negative(d("5.99")).unwrap(), d("5.99"));
        assert_eq!(ensure_non_negative(Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert!(matches!(
            ensure_non_negative(d("-0.01")),
            Err(MoneyError::Negative(_))
        ));
    }

    #[test]
    fn test_currency_code_display() {
        assert_eq!(CurrencyCode::USD.to_string(), "USD");
        assert_eq!(CurrencyCode::USD.symbol(), "$");
        assert_eq!(CurrencyCode::GBP.symbol(), "\u{a3}");
    }
}
