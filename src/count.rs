//! Stock count codec
//!
//! The feed reports stock as a decimal number, `?` when the count is
//! temporarily not reported, or `∞` for items that never run out.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Feed and wire marker for an unreported count
pub const UNKNOWN_SIGN: &str = "?";
/// Feed and wire marker for an unlimited count
pub const UNLIMITED_SIGN: &str = "∞";

/// Largest integer an f64 holds exactly; integral counts up to here go out as JSON integers
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Stock count of a catalogue item
///
/// Equality is plain variant equality: `Unknown == Unknown`,
/// `Unlimited == Unlimited`, numbers compare numerically. There is no ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    Number(f64),
    Unknown,
    Unlimited,
}

impl Quantity {
    /// Parse a raw feed cell, degrading anything unreadable to zero
    pub fn parse(raw: &str) -> Self {
        Self::parse_strict(raw).unwrap_or(Quantity::Number(0.0))
    }

    /// Parse a raw feed cell, returning `None` when the cell is malformed
    ///
    /// Negative and non-finite numbers are malformed.
    pub fn parse_strict(raw: &str) -> Option<Self> {
        match raw {
            UNKNOWN_SIGN => Some(Quantity::Unknown),
            UNLIMITED_SIGN => Some(Quantity::Unlimited),
            other => match other.parse::<f64>() {
                Ok(n) if n.is_finite() && n >= 0.0 => Some(Quantity::Number(n)),
                _ => None,
            },
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Quantity::Unknown)
    }

    /// Whether two counts differ when both are actually reported
    ///
    /// An `Unknown` on either side never counts as a difference.
    pub fn differs_defined(&self, other: &Quantity) -> bool {
        if self.is_unknown() || other.is_unknown() {
            return false;
        }
        self != other
    }

    /// JSON form: a number, `"?"` or `"∞"`
    pub fn to_wire(&self) -> Value {
        match *self {
            Quantity::Unknown => Value::from(UNKNOWN_SIGN),
            Quantity::Unlimited => Value::from(UNLIMITED_SIGN),
            Quantity::Number(n) if n.fract() == 0.0 && (0.0..=MAX_EXACT_INTEGER).contains(&n) => {
                Value::from(n as u64)
            }
            // Non-finite numbers have no JSON form
            Quantity::Number(n) => {
                serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
            }
        }
    }

    /// Inverse of [`Quantity::to_wire`]; anything unrecognised becomes zero
    ///
    /// Negative numbers are unrecognised, as in [`Quantity::parse_strict`].
    pub fn from_wire(value: &Value) -> Self {
        match value {
            Value::String(s) if s == UNKNOWN_SIGN => Quantity::Unknown,
            Value::String(s) if s == UNLIMITED_SIGN => Quantity::Unlimited,
            Value::Number(n) => match n.as_f64() {
                Some(n) if n.is_finite() && n >= 0.0 => Quantity::Number(n),
                _ => Quantity::Number(0.0),
            },
            _ => Quantity::Number(0.0),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Number(n) => write!(f, "{}", n),
            Quantity::Unknown => f.write_str(UNKNOWN_SIGN),
            Quantity::Unlimited => f.write_str(UNLIMITED_SIGN),
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| Quantity::from_wire(&value))
    }
}

#[cfg(test)]
#[path = "count_tests.rs"]
mod tests;
