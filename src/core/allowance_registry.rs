//! Allowance registry module
//!
//! Stores the escrow allowances owners grant to spenders. An allowance is
//! keyed by the ordered `(owner, spender)` pair and is overwritten, never
//! accumulated, when set again.

use crate::types::{AccountId, Balance, LedgerError};
use std::collections::HashMap;
use tracing::debug;

/// Allowances keyed by `(owner, spender)`
///
/// A pair that was granted once keeps its entry even after the allowance is
/// spent down to zero, so "never granted" and "used up" stay distinguishable.
#[derive(Debug, Default)]
pub struct AllowanceRegistry {
    allowances: HashMap<(AccountId, AccountId), Balance>,
}

impl AllowanceRegistry {
    pub fn new() -> Self {
        AllowanceRegistry {
            allowances: HashMap::new(),
        }
    }

    /// Overwrite the allowance `owner` grants to `spender`
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for a zero allowance.
    pub fn set_allowance(
        &mut self,
        owner: &AccountId,
        spender: &AccountId,
        amount: Balance,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::invalid_amount("set_allowance"));
        }

        self.allowances
            .insert((owner.clone(), spender.clone()), amount);
        debug!(owner = %owner, spender = %spender, amount, "allowance set");

        Ok(())
    }

    /// Current allowance, zero for a pair that was never granted
    pub fn allowance_of(&self, owner: &AccountId, spender: &AccountId) -> Balance {
        self.allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Check that `spender` may move `amount` of `owner`'s funds
    ///
    /// Does not change any state; pair this with [`Self::consume`] once the
    /// remaining preconditions of the transfer have passed.
    ///
    /// # Errors
    ///
    /// - `InvalidEscrowAccount` if the pair was never granted an allowance
    /// - `InsufficientAllowance` if the allowance is below `amount`
    pub fn check(
        &self,
        owner: &AccountId,
        spender: &AccountId,
        amount: Balance,
    ) -> Result<Balance, LedgerError> {
        let allowance = self
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .ok_or_else(|| LedgerError::invalid_escrow_account(owner, spender))?;

        allowance
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::insufficient_allowance(owner, spender, allowance, amount))
    }

    /// Spend `amount` of the allowance, returning what is left
    pub fn consume(
        &mut self,
        owner: &AccountId,
        spender: &AccountId,
        amount: Balance,
    ) -> Result<Balance, LedgerError> {
        let remaining = self.check(owner, spender, amount)?;
        self.allowances
            .insert((owner.clone(), spender.clone()), remaining);
        debug!(owner = %owner, spender = %spender, amount, remaining, "allowance consumed");

        Ok(remaining)
    }

    /// Drop every allowance in which `account` is owner or spender
    ///
    /// Returns the number of entries removed.
    pub fn revoke_all(&mut self, account: &AccountId) -> usize {
        let before = self.allowances.len();
        self.allowances
            .retain(|(owner, spender), _| owner != account && spender != account);
        before - self.allowances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn registry_with_grant(amount: Balance) -> AllowanceRegistry {
        let mut registry = AllowanceRegistry::new();
        registry
            .set_allowance(&"alice".into(), &"bob".into(), amount)
            .unwrap();
        registry
    }

    #[test]
    fn test_allowance_of_missing_pair_is_zero() {
        let registry = AllowanceRegistry::new();
        assert_eq!(registry.allowance_of(&"alice".into(), &"bob".into()), 0);
    }

    #[test]
    fn test_set_allowance_overwrites() {
        let mut registry = registry_with_grant(100);
        registry
            .set_allowance(&"alice".into(), &"bob".into(), 30)
            .unwrap();

        assert_eq!(registry.allowance_of(&"alice".into(), &"bob".into()), 30);
        assert_eq!(registry.revoke_all(&"bob".into()), 1);
    }

    #[test]
    fn test_allowances_are_directional() {
        let registry = registry_with_grant(100);
        assert_eq!(registry.allowance_of(&"bob".into(), &"alice".into()), 0);
    }

    #[test]
    fn test_set_zero_allowance_is_rejected() {
        let mut registry = AllowanceRegistry::new();
        let result = registry.set_allowance(&"alice".into(), &"bob".into(), 0);
        assert!(matches!(
            result.unwrap_err(),
            LedgerError::InvalidAmount { .. }
        ));
        assert!(registry.is_empty());
    }

    #[rstest]
    #[case::partial(100, 40, 60)]
    #[case::exact(100, 100, 0)]
    fn test_consume_reduces_allowance(
        #[case] granted: Balance,
        #[case] spent: Balance,
        #[case] remaining: Balance,
    ) {
        let mut registry = registry_with_grant(granted);

        let left = registry
            .consume(&"alice".into(), &"bob".into(), spent)
            .unwrap();

        assert_eq!(left, remaining);
        assert_eq!(
            registry.allowance_of(&"alice".into(), &"bob".into()),
            remaining
        );
    }

    #[test]
    fn test_check_never_granted_pair() {
        let registry = AllowanceRegistry::new();
        let result = registry.check(&"alice".into(), &"mallory".into(), 1);
        assert_eq!(
            result.unwrap_err(),
            LedgerError::invalid_escrow_account(&"alice".into(), &"mallory".into())
        );
    }

    #[test]
    fn test_consume_beyond_allowance_leaves_it_unchanged() {
        let mut registry = registry_with_grant(30);

        let result = registry.consume(&"alice".into(), &"bob".into(), 40);

        assert_eq!(
            result.unwrap_err(),
            LedgerError::insufficient_allowance(&"alice".into(), &"bob".into(), 30, 40)
        );
        assert_eq!(registry.allowance_of(&"alice".into(), &"bob".into()), 30);
    }

    #[test]
    fn test_used_up_allowance_reports_insufficient() {
        let mut registry = registry_with_grant(10);
        registry
            .consume(&"alice".into(), &"bob".into(), 10)
            .unwrap();

        let result = registry.check(&"alice".into(), &"bob".into(), 1);

        assert!(matches!(
            result.unwrap_err(),
            LedgerError::InsufficientAllowance { allowance: 0, .. }
        ));
    }

    #[test]
    fn test_revoke_all_drops_both_directions() {
        let mut registry = AllowanceRegistry::new();
        registry
            .set_allowance(&"alice".into(), &"bob".into(), 10)
            .unwrap();
        registry
            .set_allowance(&"carol".into(), &"alice".into(), 20)
            .unwrap();
        registry
            .set_allowance(&"carol".into(), &"bob".into(), 30)
            .unwrap();

        assert_eq!(registry.revoke_all(&"alice".into()), 2);
        assert_eq!(registry.allowance_of(&"alice".into(), &"bob".into()), 0);
        assert_eq!(registry.allowance_of(&"carol".into(), &"alice".into()), 0);
        assert_eq!(registry.allowance_of(&"carol".into(), &"bob".into()), 30);
    }
}
