//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are stored as decimals in the currency's standard unit (dollars,
//! not cents) and converted to minor units only at the payment provider
//! boundary.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors produced by price arithmetic.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is negative.
    #[error("price cannot be negative")]
    Negative,
    /// The amount has more precision than the currency's minor unit.
    #[error("price {0} has sub-cent precision")]
    SubMinorPrecision(Decimal),
    /// Arithmetic overflowed.
    #[error("price arithmetic overflow")]
    Overflow,
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A zero amount in the given currency.
    #[must_use]
    pub const fn zero(currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::ZERO, currency_code)
    }

    /// Convert to the currency's minor unit (cents for USD).
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` for negative amounts and
    /// `PriceError::SubMinorPrecision` if the amount cannot be represented
    /// exactly in minor units.
    pub fn minor_units(&self) -> Result<i64, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative);
        }

        let scaled = self
            .amount
            .checked_mul(Decimal::from(self.currency_code.minor_unit_factor()))
            .ok_or(PriceError::Overflow)?;

        if scaled.fract() != Decimal::ZERO {
            return Err(PriceError::SubMinorPrecision(self.amount));
        }

        scaled.to_i64().ok_or(PriceError::Overflow)
    }

    /// Multiply by a line quantity.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the result does not fit.
    pub fn times(&self, quantity: u32) -> Result<Self, PriceError> {
        let amount = self
            .amount
            .checked_mul(Decimal::from(quantity))
            .ok_or(PriceError::Overflow)?;
        Ok(Self::new(amount, self.currency_code))
    }
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
    /// Lower-case code as expected by the payment provider (`"usd"`).
    #[must_use]
    pub const fn provider_code(self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::CAD => "cad",
            Self::AUD => "aud",
        }
    }

    /// Number of minor units in one standard unit.
    #[must_use]
    pub const fn minor_unit_factor(self) -> i64 {
        100
    }
}
