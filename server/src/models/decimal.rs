//! Two-decimal fixed-point values (percentages and money)
//!
//! Stored as integer hundredths so that share comparisons are exact:
//! `60.00 + 40.00 == 100.00` with no floating point involved.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A non-negative decimal with exactly two fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decimal2(i64);

impl Decimal2 {
    pub const ZERO: Decimal2 = Decimal2(0);
    pub const HUNDRED: Decimal2 = Decimal2(10_000);

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Decimal2(hundredths)
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Decimal2) -> Option<Decimal2> {
        self.0.checked_add(other.0).map(Decimal2)
    }

    /// Number of integer digits, used for max-digit checks
    pub fn integer_digits(self) -> usize {
        (self.0 / 100).to_string().len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decimal '{input}': {reason}")]
pub struct ParseDecimalError {
    input: String,
    reason: &'static str,
}

impl ParseDecimalError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

impl FromStr for Decimal2 {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseDecimalError::new(s, "empty"));
        }
        if trimmed.starts_with('-') {
            return Err(ParseDecimalError::new(s, "must not be negative"));
        }
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseDecimalError::new(s, "no digits"));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ParseDecimalError::new(s, "not a number"));
        }
        if frac_part.len() > 2 {
            return Err(ParseDecimalError::new(s, "more than 2 decimal places"));
        }

        let int_value: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| ParseDecimalError::new(s, "out of range"))?
        };
        let frac_value: i64 = match frac_part.len() {
            0 => 0,
            1 => frac_part.parse::<i64>().unwrap_or(0) * 10,
            _ => frac_part.parse::<i64>().unwrap_or(0),
        };

        int_value
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac_value))
            .map(Decimal2)
            .ok_or_else(|| ParseDecimalError::new(s, "out of range"))
    }
}

impl fmt::Display for Decimal2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Decimal2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct Decimal2Visitor;

impl<'de> Visitor<'de> for Decimal2Visitor {
    type Value = Decimal2;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal number with at most 2 decimal places")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal2, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal2, E> {
        i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(100))
            .map(Decimal2)
            .ok_or_else(|| E::custom("decimal out of range"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal2, E> {
        if v < 0 {
            return Err(E::custom("decimal must not be negative"));
        }
        self.visit_u64(v as u64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal2, E> {
        if !v.is_finite() {
            return Err(E::custom("decimal must be finite"));
        }
        // Shortest round-trip repr, so 99.99 parses as "99.99"
        self.visit_str(&v.to_string())
    }
}

impl<'de> Deserialize<'de> for Decimal2 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(Decimal2Visitor)
    }
}
