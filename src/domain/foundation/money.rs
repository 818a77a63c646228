//! Monetary value objects: contract prices and platform fee percentages.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// A non-negative, finite price in major currency units (e.g. dollars).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Price(f64);

impl Price {
    /// Zero price.
    pub const ZERO: Self = Self(0.0);

    /// Creates a Price, returning error if negative or not finite.
    pub fn try_new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::invalid_format(
                "price_value",
                "must be a finite number",
            ));
        }
        if value < 0.0 {
            return Err(ValidationError::out_of_range(
                "price_value",
                0.0,
                f64::MAX,
                value,
            ));
        }
        Ok(Self(value))
    }

    /// Returns the value in major units.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Returns the larger of two prices.
    pub fn max(self, other: Price) -> Price {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }

    /// Converts to minor units (cents), rounding half away from zero.
    pub fn to_minor_units(&self) -> i64 {
        (self.0 * 100.0).round() as i64
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<f64> for Price {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<Price> for f64 {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A value between 0 and 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percentage(u8);

impl Percentage {
    /// Creates a Percentage, returning error if above 100.
    pub fn try_new(value: u8) -> Result<Self, ValidationError> {
        if value > 100 {
            return Err(ValidationError::out_of_range(
                "percentage",
                0.0,
                100.0,
                f64::from(value),
            ));
        }
        Ok(Self(value))
    }

    /// Returns the value as u8.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Applies this percentage to an amount in minor units, rounding to the nearest unit.
    pub fn of_minor_units(&self, amount: i64) -> i64 {
        (amount as f64 * f64::from(self.0) / 100.0).round() as i64
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
