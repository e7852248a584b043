//! Call and transfer-call types for the token ledger
//!
//! This module defines the externally callable operations, their outcomes,
//! and the records that travel across the asynchronous boundary of a
//! transfer-and-notify call.

use super::account::{AccountId, Balance, StorageBalance, StorageRegistration};
use thiserror::Error;

/// Identifier of an in-flight transfer-and-notify call
pub type TransferId = u64;

/// One externally callable ledger operation
///
/// `caller` is always the account on whose behalf the call executes
/// (the owner for self transfers, the spender for escrow transfers). The
/// optional `memo` of the transfer variants is carried into the transfer
/// event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCall {
    /// One-time mint of the whole supply to `owner`
    Initialize {
        owner: AccountId,
        total_supply: Balance,
    },

    /// Register `account` (the caller when omitted) to hold a balance
    StorageRegister {
        caller: AccountId,
        account: Option<AccountId>,
        deposit: Option<Balance>,
    },

    /// Close the caller's account, burning its balance when `force` is set
    StorageUnregister { caller: AccountId, force: bool },

    /// Withdraw unused storage deposit
    StorageWithdraw {
        caller: AccountId,
        amount: Option<Balance>,
    },

    /// Overwrite the allowance `caller` grants to `spender`
    SetAllowance {
        caller: AccountId,
        spender: AccountId,
        amount: Balance,
    },

    /// Move balance from the caller to `receiver`
    Transfer {
        caller: AccountId,
        receiver: AccountId,
        amount: Balance,
        memo: Option<String>,
    },

    /// Move balance from `owner` to `receiver`, spending the caller's allowance
    TransferFrom {
        caller: AccountId,
        owner: AccountId,
        receiver: AccountId,
        amount: Balance,
        memo: Option<String>,
    },

    /// Transfer and notify the receiver's hook with `payload`
    TransferAndNotify {
        caller: AccountId,
        receiver: AccountId,
        amount: Balance,
        memo: Option<String>,
        payload: String,
    },

    /// Escrow variant of [`LedgerCall::TransferAndNotify`]
    TransferFromAndNotify {
        caller: AccountId,
        owner: AccountId,
        receiver: AccountId,
        amount: Balance,
        memo: Option<String>,
        payload: String,
    },
}

impl LedgerCall {
    /// Name of the call as it appears in call scripts
    pub fn name(&self) -> &'static str {
        match self {
            LedgerCall::Initialize { .. } => "initialize",
            LedgerCall::StorageRegister { .. } => "register",
            LedgerCall::StorageUnregister { .. } => "unregister",
            LedgerCall::StorageWithdraw { .. } => "withdraw_storage",
            LedgerCall::SetAllowance { .. } => "set_allowance",
            LedgerCall::Transfer { .. } => "transfer",
            LedgerCall::TransferFrom { .. } => "transfer_from",
            LedgerCall::TransferAndNotify { .. } => "transfer_call",
            LedgerCall::TransferFromAndNotify { .. } => "transfer_from_call",
        }
    }
}

/// Synchronous result of a ledger call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call completed and returns nothing
    Done,
    Registered(StorageRegistration),
    /// `true` when an account was closed, `false` when it was never registered
    Unregistered(bool),
    StorageWithdrawn(StorageBalance),
    /// The sender was debited and the receiver hook must now be invoked
    TransferStarted(HookRequest),
}

/// Lifecycle of a transfer-and-notify call
///
/// `Initiated` and `Rejected` only exist while the initiating call runs;
/// a stored pending transfer is always `AwaitingReceiverAck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Initiated,
    AwaitingReceiverAck,
    Settled,
    Rejected,
}

/// Continuation context of one in-flight transfer-and-notify call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    pub transfer_id: TransferId,
    pub sender: AccountId,
    pub receiver: AccountId,
    /// Gross amount already debited from the sender
    pub amount: Balance,
    pub state: TransferState,
}

/// Message handed to the receiver's notification hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRequest {
    pub transfer_id: TransferId,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: Balance,
    pub payload: String,
}

/// What came back from the receiver's notification hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Raw result text, expected to encode the unused amount
    Returned(String),
    /// The hook trapped, panicked or could not be routed
    Failed(String),
}

/// Error raised by a receiver hook
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct HookFailure {
    pub reason: String,
}

impl HookFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<Result<String, HookFailure>> for HookOutcome {
    fn from(result: Result<String, HookFailure>) -> Self {
        match result {
            Ok(raw) => HookOutcome::Returned(raw),
            Err(failure) => HookOutcome::Failed(failure.reason),
        }
    }
}

/// Final accounting of a settled transfer-and-notify call
///
/// `used + refunded + burned == amount` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub transfer_id: TransferId,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: Balance,
    /// Amount the receiver kept
    pub used: Balance,
    /// Amount returned to the sender
    pub refunded: Balance,
    /// Amount destroyed because its destination was unregistered
    pub burned: Balance,
    pub state: TransferState,
}

impl Settlement {
    /// Amount that did not make it back to the sender
    ///
    /// This is what a resolved transfer call reports: the part the receiver
    /// kept plus whatever was burned. A refund burned because the sender
    /// closed its account counts as consumed.
    pub fn consumed(&self) -> Balance {
        self.amount - self.refunded
    }
}
