//! Type-safe price snapshots in minor currency units.
//!
//! Prices captured at add-to-cart time are stored as positive integers in
//! the currency's minor unit (paise for INR, cents for USD). A price that
//! could not be resolved is simply absent; zero and negative amounts are
//! unrepresentable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A positive price snapshot in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UnitPrice(i64);

/// Error returned when a raw amount cannot form a [`UnitPrice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unit price must be a positive amount in minor units, got {0}")]
pub struct InvalidUnitPrice(i64);

impl UnitPrice {
    /// Create a price from a minor-unit amount, rejecting non-positive values.
    #[must_use]
    pub fn from_minor_units(minor_units: i64) -> Option<Self> {
        (minor_units > 0).then_some(Self(minor_units))
    }

    /// Get the underlying minor-unit amount.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// The amount in the currency's standard unit (e.g., 119900 -> 1199.00).
    #[must_use]
    pub fn display_amount(self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl TryFrom<i64> for UnitPrice {
    type Error = InvalidUnitPrice;

    fn try_from(minor_units: i64) -> Result<Self, Self::Error> {
        Self::from_minor_units(minor_units).ok_or(InvalidUnitPrice(minor_units))
    }
}

impl From<UnitPrice> for i64 {
    fn from(price: UnitPrice) -> Self {
        price.0
    }
}

impl std::fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_amount())
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// ISO 4217 alphabetic code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            other => Err(UnknownCurrency(other.to_owned())),
        }
    }
}

/// Error returned when parsing an unsupported currency code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported currency code: {0}")]
pub struct UnknownCurrency(String);
