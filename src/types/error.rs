//! Error types for the token ledger
//!
//! This module defines every error a ledger call can produce. Errors carry
//! enough context (accounts, balances, requested amounts) to explain the
//! rejection without consulting ledger state.
//!
//! # Error Categories
//!
//! - **Validation Errors**: zero amounts, self transfers, unknown or unregistered accounts
//! - **Balance Errors**: insufficient balance, allowance or storage deposit
//! - **Lifecycle Errors**: double initialization, use before initialization, closing a funded account
//! - **Transfer-call Errors**: malformed hook results, failed hooks, unknown transfer ids
//! - **I/O Errors**: call-script reading and parsing

use super::account::{AccountId, Balance};
use super::call::TransferId;
use thiserror::Error;

/// Main error type for the ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Zero amount supplied where a positive amount is required
    #[error("Invalid amount for {operation}: the amount should be a positive number")]
    InvalidAmount { operation: String },

    /// The account has never been registered with the ledger
    #[error("Unknown account @{account}")]
    UnknownAccount { account: AccountId },

    /// The account is not registered, so it cannot hold a balance
    #[error("The account @{account} is not registered")]
    NotRegistered { account: AccountId },

    #[error("Insufficient balance for @{account}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        balance: Balance,
        requested: Balance,
    },

    /// No allowance has ever been granted for this (owner, spender) pair
    #[error("@{spender} holds no allowance from @{owner}")]
    InvalidEscrowAccount { owner: AccountId, spender: AccountId },

    #[error(
        "Insufficient allowance from @{owner} to @{spender}: allowance {allowance}, requested {requested}"
    )]
    InsufficientAllowance {
        owner: AccountId,
        spender: AccountId,
        allowance: Balance,
        requested: Balance,
    },

    #[error("The ledger is already initialized")]
    AlreadyInitialized,

    #[error("The ledger is not initialized")]
    NotInitialized,

    #[error("Can't unregister the account with the positive balance without force (@{account} holds {balance})")]
    PositiveBalanceRequiresForce { account: AccountId, balance: Balance },

    /// The receiver hook answered with something that is not an amount
    ///
    /// Never fails a transfer call: the coordinator settles it as a full refund.
    #[error("Malformed receiver result: {message}")]
    MalformedPayload { message: String },

    /// The receiver hook trapped, panicked or could not be routed
    ///
    /// Never fails a transfer call: the coordinator settles it as a full refund.
    #[error("Receiver hook of @{receiver} failed: {reason}")]
    HookFailed { receiver: AccountId, reason: String },

    #[error("The payer and the receiver should be different (@{account})")]
    SelfTransfer { account: AccountId },

    #[error("The attached deposit {attached} is less than the minimum storage balance {required}")]
    InsufficientDeposit { required: Balance, attached: Balance },

    #[error("Insufficient storage balance for @{account}: available {available}, requested {requested}")]
    InsufficientStorageBalance {
        account: AccountId,
        available: Balance,
        requested: Balance,
    },

    #[error("Transfer {transfer_id} is not awaiting settlement")]
    UnknownTransfer { transfer_id: TransferId },

    #[error("Arithmetic overflow in {operation} for @{account}")]
    ArithmeticOverflow { operation: String, account: AccountId },

    #[error("Conservation violated: balances {balances} + in flight {in_flight} != total supply {total_supply}")]
    ConservationViolated {
        balances: Balance,
        in_flight: Balance,
        total_supply: Balance,
    },

    #[error("Invalid account id '{value}'")]
    InvalidAccountId { value: String },

    #[error("Invalid call '{call}'")]
    InvalidCall { call: String },

    #[error("{call} requires the '{field}' field")]
    MissingField { call: String, field: String },

    /// The ledger service task is gone
    #[error("Ledger service stopped")]
    ServiceStopped,

    #[error("I/O error: {message}")]
    IoError { message: String },

    #[error("Parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl LedgerError {
    pub fn invalid_amount(operation: &str) -> Self {
        LedgerError::InvalidAmount {
            operation: operation.to_string(),
        }
    }

    pub fn unknown_account(account: &AccountId) -> Self {
        LedgerError::UnknownAccount {
            account: account.clone(),
        }
    }

    pub fn not_registered(account: &AccountId) -> Self {
        LedgerError::NotRegistered {
            account: account.clone(),
        }
    }

    pub fn insufficient_balance(account: &AccountId, balance: Balance, requested: Balance) -> Self {
        LedgerError::InsufficientBalance {
            account: account.clone(),
            balance,
            requested,
        }
    }

    pub fn invalid_escrow_account(owner: &AccountId, spender: &AccountId) -> Self {
        LedgerError::InvalidEscrowAccount {
            owner: owner.clone(),
            spender: spender.clone(),
        }
    }

    pub fn insufficient_allowance(
        owner: &AccountId,
        spender: &AccountId,
        allowance: Balance,
        requested: Balance,
    ) -> Self {
        LedgerError::InsufficientAllowance {
            owner: owner.clone(),
            spender: spender.clone(),
            allowance,
            requested,
        }
    }

    pub fn positive_balance_requires_force(account: &AccountId, balance: Balance) -> Self {
        LedgerError::PositiveBalanceRequiresForce {
            account: account.clone(),
            balance,
        }
    }

    pub fn malformed_payload(message: impl Into<String>) -> Self {
        LedgerError::MalformedPayload {
            message: message.into(),
        }
    }

    pub fn hook_failed(receiver: &AccountId, reason: impl Into<String>) -> Self {
        LedgerError::HookFailed {
            receiver: receiver.clone(),
            reason: reason.into(),
        }
    }

    pub fn self_transfer(account: &AccountId) -> Self {
        LedgerError::SelfTransfer {
            account: account.clone(),
        }
    }

    pub fn arithmetic_overflow(operation: &str, account: &AccountId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            account: account.clone(),
        }
    }

    pub fn invalid_account_id(value: &str) -> Self {
        LedgerError::InvalidAccountId {
            value: value.to_string(),
        }
    }

    pub fn invalid_call(call: &str) -> Self {
        LedgerError::InvalidCall {
            call: call.to_string(),
        }
    }

    pub fn missing_field(call: &str, field: &str) -> Self {
        LedgerError::MissingField {
            call: call.to_string(),
            field: field.to_string(),
        }
    }

    pub fn parse_error(line: Option<u64>, message: impl Into<String>) -> Self {
        LedgerError::ParseError {
            line,
            message: message.into(),
        }
    }
}
