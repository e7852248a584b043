//! Token ledger facade
//!
//! This module provides the `TokenLedger`, the externally callable surface of
//! the fungible token. It composes the balance ledger, the allowance registry,
//! the storage registry and the transfer-call coordinator, and enforces the
//! rules that span more than one of them:
//! - Nothing mutates before the one-time initialization
//! - Synchronous calls are all-or-nothing
//! - Closing an account revokes its allowances
//! - Side-effect log lines and token events are recorded in call order

use crate::core::allowance_registry::AllowanceRegistry;
use crate::core::balance_ledger::BalanceLedger;
use crate::core::storage_registry::{StorageRegistry, DEFAULT_STORAGE_DEPOSIT};
use crate::core::transfer_call::{validate_transfer, TransferCallCoordinator, TransferCallRequest};
use crate::types::{
    AccountId, Balance, CallOutcome, HookOutcome, HookRequest, LedgerCall, LedgerError,
    PendingTransfer, Settlement, StorageBalance, StorageBalanceBounds, StorageRegistration,
    TokenEvent, TransferId, U128,
};
use tracing::{debug, info};

/// Memo of the mint event recorded at initialization
pub const MINT_MEMO: &str = "new tokens are minted";

/// Ledger-wide configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Deposit an account must attach to register
    pub storage_deposit: Balance,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            storage_deposit: DEFAULT_STORAGE_DEPOSIT,
        }
    }
}

/// Fungible token ledger
///
/// Owns all token state. Views never fail; every mutating call returns a
/// `Result` and leaves state untouched on error, with the single exception of
/// transfer calls, whose debit stays in flight until
/// [`TokenLedger::resolve_transfer`] settles it.
#[derive(Debug)]
pub struct TokenLedger {
    balances: BalanceLedger,
    allowances: AllowanceRegistry,
    registry: StorageRegistry,
    coordinator: TransferCallCoordinator,
    initialized: bool,
    logs: Vec<String>,
}

impl Default for TokenLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl TokenLedger {
    /// Create an uninitialized ledger
    ///
    /// # Arguments
    ///
    /// * `config` - Ledger configuration (storage deposit)
    ///
    /// # Returns
    ///
    /// A ledger with no accounts and zero supply. Every mutating call fails
    /// with `NotInitialized` until [`TokenLedger::initialize`] runs.
    pub fn new(config: LedgerConfig) -> Self {
        TokenLedger {
            balances: BalanceLedger::new(),
            allowances: AllowanceRegistry::new(),
            registry: StorageRegistry::new(StorageBalanceBounds::fixed(config.storage_deposit)),
            coordinator: TransferCallCoordinator::new(),
            initialized: false,
            logs: Vec::new(),
        }
    }

    /// Mint the whole supply to `owner`
    ///
    /// The owner is registered without a deposit. The guard is a plain flag:
    /// whoever calls first becomes the owner.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInitialized` on every call after the first.
    pub fn initialize(&mut self, owner: &AccountId, total_supply: U128) -> Result<(), LedgerError> {
        if self.initialized {
            return Err(LedgerError::AlreadyInitialized);
        }

        self.registry.register_without_deposit(owner);
        self.balances.mint(&self.registry, owner, total_supply.0)?;
        self.initialized = true;
        self.logs
            .push(TokenEvent::mint(owner, total_supply.0, Some(MINT_MEMO)).to_string());
        info!(owner = %owner, total_supply = total_supply.0, "ledger initialized");

        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> Result<(), LedgerError> {
        if self.initialized {
            Ok(())
        } else {
            Err(LedgerError::NotInitialized)
        }
    }

    pub fn total_supply(&self) -> U128 {
        U128(self.balances.total_supply())
    }

    /// Balance of an account; zero for unknown and unregistered accounts
    pub fn balance_of(&self, account: &AccountId) -> U128 {
        U128(self.balances.balance_of(account))
    }

    /// Balance of an account that must be registered
    pub fn try_balance_of(&self, account: &AccountId) -> Result<U128, LedgerError> {
        self.balances
            .try_balance_of(&self.registry, account)
            .map(U128)
    }

    pub fn allowance_of(&self, owner: &AccountId, spender: &AccountId) -> U128 {
        U128(self.allowances.allowance_of(owner, spender))
    }

    /// Overwrite the allowance the caller grants to `spender`
    ///
    /// # Errors
    ///
    /// - `NotInitialized` before initialization
    /// - `NotRegistered` if the caller is not registered
    /// - `InvalidAmount` for a zero amount
    pub fn set_allowance(
        &mut self,
        caller: &AccountId,
        spender: &AccountId,
        amount: U128,
    ) -> Result<(), LedgerError> {
        self.ensure_initialized()?;
        if !self.registry.is_registered(caller) {
            return Err(LedgerError::not_registered(caller));
        }
        self.allowances.set_allowance(caller, spender, amount.0)
    }

    /// Move `amount` from the caller to `receiver`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ledger is not initialized
    /// - The amount is zero or the caller pays itself
    /// - Either account is not registered
    /// - The caller's balance is below `amount`
    pub fn transfer(
        &mut self,
        caller: &AccountId,
        receiver: &AccountId,
        amount: U128,
        memo: Option<String>,
    ) -> Result<(), LedgerError> {
        self.ensure_initialized()?;
        validate_transfer(
            &self.balances,
            &self.allowances,
            &self.registry,
            caller,
            None,
            receiver,
            amount.0,
            "transfer",
        )?;
        self.balances
            .transfer(&self.registry, caller, receiver, amount.0)?;
        self.logs.push(
            TokenEvent::transfer(caller, receiver, amount.0, memo.as_deref()).to_string(),
        );

        Ok(())
    }

    /// Move `amount` from `owner` to `receiver` on the caller's allowance
    ///
    /// When the caller is the owner this is a plain transfer and no allowance
    /// is touched.
    ///
    /// # Errors
    ///
    /// Same as [`TokenLedger::transfer`], plus `UnknownAccount` for an owner
    /// that is not registered and `InvalidEscrowAccount` or
    /// `InsufficientAllowance` when the allowance does not cover `amount`.
    pub fn transfer_from(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        receiver: &AccountId,
        amount: U128,
        memo: Option<String>,
    ) -> Result<(), LedgerError> {
        if caller == owner {
            return self.transfer(caller, receiver, amount, memo);
        }

        self.ensure_initialized()?;
        validate_transfer(
            &self.balances,
            &self.allowances,
            &self.registry,
            owner,
            Some(caller),
            receiver,
            amount.0,
            "transfer_from",
        )?;
        self.balances
            .transfer(&self.registry, owner, receiver, amount.0)?;
        self.allowances.consume(owner, caller, amount.0)?;
        self.logs.push(
            TokenEvent::transfer(owner, receiver, amount.0, memo.as_deref()).to_string(),
        );

        Ok(())
    }

    /// Debit the caller and start a transfer call to `receiver`
    ///
    /// # Returns
    ///
    /// The request the receiver's hook must be invoked with. The transfer
    /// stays in flight until [`TokenLedger::resolve_transfer`] is called with
    /// the hook's outcome.
    pub fn transfer_and_notify(
        &mut self,
        caller: &AccountId,
        receiver: &AccountId,
        amount: U128,
        memo: Option<String>,
        payload: impl Into<String>,
    ) -> Result<HookRequest, LedgerError> {
        self.ensure_initialized()?;
        let request = self.coordinator.initiate(
            &mut self.balances,
            &mut self.allowances,
            &self.registry,
            TransferCallRequest {
                sender: caller.clone(),
                spender: None,
                receiver: receiver.clone(),
                amount: amount.0,
                payload: payload.into(),
            },
        )?;
        self.log_transfer_started(&request, memo);

        Ok(request)
    }

    /// Escrow variant of [`TokenLedger::transfer_and_notify`]
    ///
    /// The allowance is consumed at initiation and is not restored by a
    /// refund.
    pub fn transfer_from_and_notify(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        receiver: &AccountId,
        amount: U128,
        memo: Option<String>,
        payload: impl Into<String>,
    ) -> Result<HookRequest, LedgerError> {
        self.ensure_initialized()?;
        let spender = (caller != owner).then(|| caller.clone());
        let request = self.coordinator.initiate(
            &mut self.balances,
            &mut self.allowances,
            &self.registry,
            TransferCallRequest {
                sender: owner.clone(),
                spender,
                receiver: receiver.clone(),
                amount: amount.0,
                payload: payload.into(),
            },
        )?;
        self.log_transfer_started(&request, memo);

        Ok(request)
    }

    /// The sender's debit is recorded as a transfer to the receiver; a later
    /// refund is recorded as a transfer back
    fn log_transfer_started(&mut self, request: &HookRequest, memo: Option<String>) {
        self.logs.push(
            TokenEvent::transfer(
                &request.sender,
                &request.receiver,
                request.amount,
                memo.as_deref(),
            )
            .to_string(),
        );
    }

    /// Settle a transfer call, returning the full accounting
    pub fn settle(
        &mut self,
        transfer_id: TransferId,
        outcome: HookOutcome,
    ) -> Result<Settlement, LedgerError> {
        self.coordinator.settle(
            &mut self.balances,
            &self.registry,
            transfer_id,
            outcome,
            &mut self.logs,
        )
    }

    /// Settle a transfer call, returning the consumed amount
    ///
    /// That is the full amount minus what actually went back to the sender.
    /// A refund burned because the sender closed its account is consumed.
    pub fn resolve_transfer(
        &mut self,
        transfer_id: TransferId,
        outcome: HookOutcome,
    ) -> Result<U128, LedgerError> {
        self.settle(transfer_id, outcome)
            .map(|settlement| U128(settlement.consumed()))
    }

    pub fn transfer_status(&self, transfer_id: TransferId) -> Option<&PendingTransfer> {
        self.coordinator.status(transfer_id)
    }

    /// Register `account` against an attached deposit
    ///
    /// # Errors
    ///
    /// `NotInitialized` before initialization, `InsufficientDeposit` when the
    /// deposit is below the bound.
    pub fn storage_register(
        &mut self,
        account: &AccountId,
        deposit: U128,
    ) -> Result<StorageRegistration, LedgerError> {
        self.ensure_initialized()?;
        self.registry.register(account, deposit.0)
    }

    /// Close the caller's account
    ///
    /// # Returns
    ///
    /// `true` if an account was closed, `false` if the caller was never
    /// registered. A forced close burns the remaining balance and logs
    /// `Closed @<account> with <amount>`.
    pub fn storage_unregister(&mut self, caller: &AccountId, force: bool) -> Result<bool, LedgerError> {
        self.ensure_initialized()?;
        let Some(closure) = self
            .registry
            .unregister(&mut self.balances, caller, force)?
        else {
            debug!(account = %caller, "unregister of unknown account");
            return Ok(false);
        };

        let revoked = self.allowances.revoke_all(caller);
        self.logs
            .push(format!("Closed @{} with {}", closure.account, closure.burned));
        if closure.burned > 0 {
            self.logs
                .push(TokenEvent::burn(&closure.account, closure.burned, None).to_string());
        }
        info!(
            account = %closure.account,
            burned = closure.burned,
            storage_refund = closure.storage_refund,
            revoked,
            "closed account"
        );

        Ok(true)
    }

    /// Withdraw unused storage deposit; `None` withdraws all of it
    pub fn storage_withdraw(
        &mut self,
        caller: &AccountId,
        amount: Option<U128>,
    ) -> Result<StorageBalance, LedgerError> {
        self.ensure_initialized()?;
        self.registry.withdraw(caller, amount.map(|a| a.0))
    }

    pub fn storage_balance_of(&self, account: &AccountId) -> Option<StorageBalance> {
        self.registry.storage_balance_of(account)
    }

    pub fn storage_balance_bounds(&self) -> StorageBalanceBounds {
        self.registry.bounds()
    }

    pub fn is_registered(&self, account: &AccountId) -> bool {
        self.registry.is_registered(account)
    }

    /// Every registered account with its balance, sorted by account id
    pub fn accounts(&self) -> Vec<(AccountId, U128)> {
        self.registry
            .registered_accounts()
            .into_iter()
            .map(|account| {
                let balance = self.balance_of(&account);
                (account, balance)
            })
            .collect()
    }

    /// Log lines in the order they were emitted
    ///
    /// Plain lines (`Closed @..`, `Account @.. burned ..`) are interleaved
    /// with `EVENT_JSON:` lines for every mint, transfer and burn.
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn drain_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.logs)
    }

    /// Total amount debited by transfer calls that are not settled yet
    pub fn in_flight_total(&self) -> U128 {
        U128(self.coordinator.in_flight_total())
    }

    /// Verify that balances plus in-flight amounts add up to the supply
    pub fn check_conservation(&self) -> Result<(), LedgerError> {
        let total_supply = self.balances.total_supply();
        let in_flight = self.coordinator.in_flight_total();
        let balances = self.balances.sum_of_balances().unwrap_or(Balance::MAX);

        if balances.checked_add(in_flight) == Some(total_supply) {
            Ok(())
        } else {
            Err(LedgerError::ConservationViolated {
                balances,
                in_flight,
                total_supply,
            })
        }
    }

    /// Execute one call
    ///
    /// Registration without an explicit deposit attaches exactly the
    /// required minimum.
    pub fn apply(&mut self, call: LedgerCall) -> Result<CallOutcome, LedgerError> {
        match call {
            LedgerCall::Initialize {
                owner,
                total_supply,
            } => self
                .initialize(&owner, U128(total_supply))
                .map(|_| CallOutcome::Done),
            LedgerCall::StorageRegister {
                caller,
                account,
                deposit,
            } => {
                let account = account.unwrap_or(caller);
                let deposit = deposit.unwrap_or(self.registry.bounds().min);
                self.storage_register(&account, U128(deposit))
                    .map(CallOutcome::Registered)
            }
            LedgerCall::StorageUnregister { caller, force } => self
                .storage_unregister(&caller, force)
                .map(CallOutcome::Unregistered),
            LedgerCall::StorageWithdraw { caller, amount } => self
                .storage_withdraw(&caller, amount.map(U128))
                .map(CallOutcome::StorageWithdrawn),
            LedgerCall::SetAllowance {
                caller,
                spender,
                amount,
            } => self
                .set_allowance(&caller, &spender, U128(amount))
                .map(|_| CallOutcome::Done),
            LedgerCall::Transfer {
                caller,
                receiver,
                amount,
                memo,
            } => self
                .transfer(&caller, &receiver, U128(amount), memo)
                .map(|_| CallOutcome::Done),
            LedgerCall::TransferFrom {
                caller,
                owner,
                receiver,
                amount,
                memo,
            } => self
                .transfer_from(&caller, &owner, &receiver, U128(amount), memo)
                .map(|_| CallOutcome::Done),
            LedgerCall::TransferAndNotify {
                caller,
                receiver,
                amount,
                memo,
                payload,
            } => self
                .transfer_and_notify(&caller, &receiver, U128(amount), memo, payload)
                .map(CallOutcome::TransferStarted),
            LedgerCall::TransferFromAndNotify {
                caller,
                owner,
                receiver,
                amount,
                memo,
                payload,
            } => self
                .transfer_from_and_notify(&caller, &owner, &receiver, U128(amount), memo, payload)
                .map(CallOutcome::TransferStarted),
        }
    }
}
