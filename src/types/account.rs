//! Account-related types for the token ledger
//!
//! This module defines the account identifier together with the storage
//! bookkeeping records attached to every registered account.

use super::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Token amount held by an account
///
/// Balances are plain unsigned 128-bit integers. All arithmetic on them is
/// checked; the ledger never wraps or saturates silently.
pub type Balance = u128;

/// Opaque account identifier
///
/// Account ids are compared and ordered as strings. Beyond rejecting empty
/// ids the ledger performs no validation of their shape.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::invalid_account_id(s));
        }
        Ok(AccountId(trimmed.to_string()))
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        AccountId(value.to_string())
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        AccountId(value)
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage deposit held for a registered account
///
/// `total` is what the account paid to register, `available` is the part of
/// it that may be withdrawn without unregistering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBalance {
    pub total: Balance,
    pub available: Balance,
}

/// Bounds on the storage deposit an account must hold
///
/// The ledger stores a fixed amount of data per account, so `min` and `max`
/// are the same value in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBalanceBounds {
    pub min: Balance,
    pub max: Option<Balance>,
}

impl StorageBalanceBounds {
    /// Bounds for a fixed per-account deposit
    pub fn fixed(deposit: Balance) -> Self {
        Self {
            min: deposit,
            max: Some(deposit),
        }
    }

    /// The largest deposit an account may keep, `min` when unbounded
    pub fn max_or_min(&self) -> Balance {
        self.max.unwrap_or(self.min).max(self.min)
    }
}

/// Result of a storage registration
///
/// A repeat registration leaves the stored deposit untouched and refunds
/// everything that was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageRegistration {
    pub balance: StorageBalance,
    pub refund: Balance,
    pub newly_registered: bool,
}
