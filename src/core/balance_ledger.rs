//! Balance ledger module
//!
//! This module provides the `BalanceLedger` struct which holds the token
//! balance of every account and the current total supply.
//!
//! The BalanceLedger is responsible for:
//! - Crediting and debiting balances with checked arithmetic
//! - Refusing credits to accounts that are not registered
//! - Tracking total supply, which only ever shrinks after the initial mint
//!
//! Registration itself lives in the [`StorageRegistry`]; it is passed in by
//! reference wherever a credit has to be gated on it.

use crate::core::storage_registry::StorageRegistry;
use crate::types::{AccountId, Balance, LedgerError};
use std::collections::HashMap;
use tracing::debug;

/// Per-account balances plus the total supply
///
/// Invariant: the sum of all balances plus the amounts held by in-flight
/// transfer calls equals `total_supply`.
#[derive(Debug, Default)]
pub struct BalanceLedger {
    /// Map of account ids to balances; only registered accounts have entries
    balances: HashMap<AccountId, Balance>,

    total_supply: Balance,
}

impl BalanceLedger {
    /// Create an empty ledger with zero supply
    pub fn new() -> Self {
        BalanceLedger {
            balances: HashMap::new(),
            total_supply: 0,
        }
    }

    pub fn total_supply(&self) -> Balance {
        self.total_supply
    }

    /// Balance of an account, zero when it holds nothing or is unknown
    ///
    /// This is the registration-gated view: unregistered and never-seen
    /// accounts uniformly read as zero.
    pub fn balance_of(&self, account: &AccountId) -> Balance {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Balance of an account that must be registered
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccount` if the account is not registered.
    pub fn try_balance_of(
        &self,
        registry: &StorageRegistry,
        account: &AccountId,
    ) -> Result<Balance, LedgerError> {
        if !registry.is_registered(account) {
            return Err(LedgerError::unknown_account(account));
        }
        Ok(self.balance_of(account))
    }

    /// Credit funds to a registered account
    ///
    /// # Arguments
    ///
    /// * `registry` - Registration state used to gate the credit
    /// * `account` - The account to credit
    /// * `amount` - The amount to add
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The account is not registered (`NotRegistered`); the caller decides
    ///   whether the amount is burned instead
    /// - Adding the amount would overflow the balance
    pub fn credit(
        &mut self,
        registry: &StorageRegistry,
        account: &AccountId,
        amount: Balance,
    ) -> Result<(), LedgerError> {
        if !registry.is_registered(account) {
            return Err(LedgerError::not_registered(account));
        }

        let current = self.balance_of(account);
        let new_balance = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("credit", account))?;

        self.balances.insert(account.clone(), new_balance);
        debug!(account = %account, amount, balance = new_balance, "credited");

        Ok(())
    }

    /// Debit funds from an account
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if `amount` exceeds the current balance;
    /// the balance is left untouched in that case.
    pub fn debit(&mut self, account: &AccountId, amount: Balance) -> Result<(), LedgerError> {
        let current = self.balance_of(account);
        let new_balance = current
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::insufficient_balance(account, current, amount))?;

        if let Some(balance) = self.balances.get_mut(account) {
            *balance = new_balance;
        }
        debug!(account = %account, amount, balance = new_balance, "debited");

        Ok(())
    }

    /// Move funds between two accounts as one all-or-nothing step
    ///
    /// Every precondition is checked before either balance changes, so a
    /// failure leaves both accounts exactly as they were.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The receiver is not registered
    /// - The sender's balance is below `amount`
    /// - The receiver's balance would overflow
    pub fn transfer(
        &mut self,
        registry: &StorageRegistry,
        sender: &AccountId,
        receiver: &AccountId,
        amount: Balance,
    ) -> Result<(), LedgerError> {
        if !registry.is_registered(receiver) {
            return Err(LedgerError::not_registered(receiver));
        }

        let sender_balance = self.balance_of(sender);
        if sender_balance < amount {
            return Err(LedgerError::insufficient_balance(
                sender,
                sender_balance,
                amount,
            ));
        }

        self.balance_of(receiver)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("transfer", receiver))?;

        self.debit(sender, amount)?;
        self.credit(registry, receiver, amount)
    }

    /// Create `amount` new tokens on a registered account
    ///
    /// Only used by the one-time initialization.
    pub fn mint(
        &mut self,
        registry: &StorageRegistry,
        account: &AccountId,
        amount: Balance,
    ) -> Result<(), LedgerError> {
        let new_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("mint", account))?;

        self.credit(registry, account, amount)?;
        self.total_supply = new_supply;

        Ok(())
    }

    /// Destroy `amount` tokens that were attributed to `account`
    ///
    /// The tokens must already be gone from every balance (debited, closed
    /// or never credited); this only lowers the total supply.
    pub fn burn(&mut self, account: &AccountId, amount: Balance) -> Result<(), LedgerError> {
        self.total_supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("burn", account))?;
        debug!(account = %account, amount, total_supply = self.total_supply, "burned");

        Ok(())
    }

    /// Remove an account's balance entry, returning what it held
    pub fn close(&mut self, account: &AccountId) -> Balance {
        self.balances.remove(account).unwrap_or(0)
    }

    /// Sum of every balance, `None` if it does not fit in 128 bits
    pub fn sum_of_balances(&self) -> Option<Balance> {
        self.balances
            .values()
            .try_fold(0u128, |sum, balance| sum.checked_add(*balance))
    }
}
