//! Monetary amounts for the transfer engine
//!
//! All balances, amounts and fees are fixed-point decimals with exactly two
//! fractional digits (the minor unit of every supported currency). Arithmetic
//! is exact, so balance checks never need a rounding tolerance.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of fractional digits kept for every amount
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Fixed-point monetary amount with two-digit precision
///
/// The inner value always carries scale 2, so `Display` renders `58.50`
/// rather than `58.5`. Construct through [`Money::from_decimal`] for caller
/// input (rejects extra precision) or [`Money::round_from`] for computed
/// values such as percentage fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    /// Zero with scale 2
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, MINOR_UNIT_SCALE));

    /// Build from an exact decimal
    ///
    /// Returns `None` when the value carries more than two significant
    /// fractional digits (`1.005`), since that amount has no exact
    /// representation in minor units. Trailing zeros are fine (`40.000`).
    pub fn from_decimal(value: Decimal) -> Option<Money> {
        if value.normalize().scale() > MINOR_UNIT_SCALE {
            return None;
        }
        let mut value = value;
        value.rescale(MINOR_UNIT_SCALE);
        Some(Money(value))
    }

    /// Round a computed value to the minor unit (half away from zero)
    pub fn round_from(value: Decimal) -> Money {
        let mut value =
            value.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        value.rescale(MINOR_UNIT_SCALE);
        Money(value)
    }

    /// Build from an integer count of minor units (cents)
    pub fn from_minor(minor: i64) -> Money {
        Money(Decimal::new(minor, MINOR_UNIT_SCALE))
    }

    /// The underlying decimal value
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Strictly less than zero
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    pub fn negate(self) -> Money {
        let mut value = -self.0;
        value.rescale(MINOR_UNIT_SCALE);
        Money(value)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Error returned when a string is not a valid two-decimal amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid money amount '{0}'")]
pub struct ParseMoneyError(pub String);

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value =
            Decimal::from_str(trimmed).map_err(|_| ParseMoneyError(trimmed.to_string()))?;
        Money::from_decimal(value).ok_or_else(|| ParseMoneyError(trimmed.to_string()))
    }
}

// Always a string on the wire to keep the two fractional digits
impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let s = String::deserialize(deserializer)?;
        if s.trim().is_empty() {
            return Err(D::Error::custom("amount cannot be empty"));
        }
        Money::from_str(&s).map_err(D::Error::custom)
    }
}

/// ISO-4217 style currency code (three ASCII letters, stored uppercase)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Validate and normalise a currency code
    pub fn new(code: &str) -> Option<Currency> {
        let code = code.trim();
        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Some(Currency(code.to_ascii_uppercase()))
        } else {
            None
        }
    }

    pub fn usd() -> Currency {
        Currency("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
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
        Currency::new(&value).ok_or_else(|| format!("invalid currency code '{}'", value))
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}
