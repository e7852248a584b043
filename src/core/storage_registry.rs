//! Storage registry module
//!
//! Tracks which accounts are registered and the storage deposit each of them
//! paid. Only registered accounts may hold or receive balance.

use crate::core::balance_ledger::BalanceLedger;
use crate::types::{
    AccountId, Balance, LedgerError, StorageBalance, StorageBalanceBounds, StorageRegistration,
};
use std::collections::HashMap;
use tracing::{debug, info};

/// Deposit required to register one account
///
/// 125 bytes of account storage at 10^19 units per byte.
pub const DEFAULT_STORAGE_DEPOSIT: Balance = 1_250_000_000_000_000_000_000;

/// Record of an account that was unregistered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountClosure {
    pub account: AccountId,
    /// Balance destroyed by the closure, zero unless it was forced
    pub burned: Balance,
    /// Storage deposit released back to the account
    pub storage_refund: Balance,
}

/// Registration flags plus the storage deposit held for each account
#[derive(Debug)]
pub struct StorageRegistry {
    accounts: HashMap<AccountId, StorageBalance>,
    bounds: StorageBalanceBounds,
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new(StorageBalanceBounds::fixed(DEFAULT_STORAGE_DEPOSIT))
    }
}

impl StorageRegistry {
    pub fn new(bounds: StorageBalanceBounds) -> Self {
        StorageRegistry {
            accounts: HashMap::new(),
            bounds,
        }
    }

    pub fn bounds(&self) -> StorageBalanceBounds {
        self.bounds
    }

    pub fn is_registered(&self, account: &AccountId) -> bool {
        self.accounts.contains_key(account)
    }

    pub fn storage_balance_of(&self, account: &AccountId) -> Option<StorageBalance> {
        self.accounts.get(account).copied()
    }

    /// Register `account` against an attached `deposit`
    ///
    /// The registry keeps at most the upper bound and refunds the rest. A
    /// repeat registration changes nothing and refunds the whole deposit.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientDeposit` if a new account attaches less than the
    /// minimum storage balance.
    pub fn register(
        &mut self,
        account: &AccountId,
        deposit: Balance,
    ) -> Result<StorageRegistration, LedgerError> {
        if let Some(existing) = self.accounts.get(account) {
            debug!(account = %account, refund = deposit, "account already registered");
            return Ok(StorageRegistration {
                balance: *existing,
                refund: deposit,
                newly_registered: false,
            });
        }

        if deposit < self.bounds.min {
            return Err(LedgerError::InsufficientDeposit {
                required: self.bounds.min,
                attached: deposit,
            });
        }

        let kept = deposit.min(self.bounds.max_or_min());
        let balance = StorageBalance {
            total: kept,
            available: kept - self.bounds.min,
        };
        self.accounts.insert(account.clone(), balance);
        debug!(account = %account, deposit = kept, "account registered");

        Ok(StorageRegistration {
            balance,
            refund: deposit - kept,
            newly_registered: true,
        })
    }

    /// Register an account without charging a deposit
    ///
    /// Used for the owner at initialization. Returns `false` if the account
    /// was already registered.
    pub fn register_without_deposit(&mut self, account: &AccountId) -> bool {
        if self.is_registered(account) {
            return false;
        }
        self.accounts.insert(
            account.clone(),
            StorageBalance {
                total: 0,
                available: 0,
            },
        );
        true
    }

    /// Withdraw unused storage deposit
    ///
    /// `None` withdraws everything available. With fixed bounds nothing is
    /// ever available, so only zero or `None` succeed.
    ///
    /// # Errors
    ///
    /// - `NotRegistered` if the account is not registered
    /// - `InsufficientStorageBalance` if `amount` exceeds the available part
    pub fn withdraw(
        &mut self,
        account: &AccountId,
        amount: Option<Balance>,
    ) -> Result<StorageBalance, LedgerError> {
        let storage = self
            .accounts
            .get_mut(account)
            .ok_or_else(|| LedgerError::not_registered(account))?;

        let requested = amount.unwrap_or(storage.available);
        if requested > storage.available {
            return Err(LedgerError::InsufficientStorageBalance {
                account: account.clone(),
                available: storage.available,
                requested,
            });
        }

        storage.available -= requested;
        storage.total -= requested;
        debug!(account = %account, withdrawn = requested, "storage withdrawn");

        Ok(*storage)
    }

    /// Unregister an account, burning its balance when `force` is set
    ///
    /// # Arguments
    ///
    /// * `balances` - The balance ledger holding the account's tokens
    /// * `account` - The account to close
    /// * `force` - Whether a positive balance may be burned
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the account was never registered, otherwise the closure
    /// record.
    ///
    /// # Errors
    ///
    /// Returns `PositiveBalanceRequiresForce` if the account holds tokens and
    /// `force` is false. Nothing changes in that case.
    pub fn unregister(
        &mut self,
        balances: &mut BalanceLedger,
        account: &AccountId,
        force: bool,
    ) -> Result<Option<AccountClosure>, LedgerError> {
        let Some(storage) = self.accounts.get(account).copied() else {
            return Ok(None);
        };

        let balance = balances.balance_of(account);
        if balance > 0 && !force {
            return Err(LedgerError::positive_balance_requires_force(
                account, balance,
            ));
        }

        balances.burn(account, balance)?;
        balances.close(account);
        self.accounts.remove(account);
        info!(account = %account, burned = balance, "account closed");

        Ok(Some(AccountClosure {
            account: account.clone(),
            burned: balance,
            storage_refund: storage.total,
        }))
    }

    /// Every registered account, sorted by id
    pub fn registered_accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self.accounts.keys().cloned().collect();
        accounts.sort();
        accounts
    }
}
