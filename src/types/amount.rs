//! Wire encoding for 128-bit amounts
//!
//! Amounts cross the call boundary as base-10 strings (`"100"`) so that
//! clients without native 128-bit integers never lose precision.

use super::account::Balance;
use super::error::LedgerError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A `u128` that serializes as a decimal string
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct U128(pub Balance);

impl From<Balance> for U128 {
    fn from(value: Balance) -> Self {
        U128(value)
    }
}

impl From<U128> for Balance {
    fn from(value: U128) -> Self {
        value.0
    }
}

impl FromStr for U128 {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LedgerError::parse_error(
                None,
                format!("'{s}' is not a base-10 amount"),
            ));
        }
        digits
            .parse::<Balance>()
            .map(U128)
            .map_err(|e| LedgerError::parse_error(None, format!("'{s}': {e}")))
    }
}

impl fmt::Display for U128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for U128 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for U128 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
