//! Types module
//!
//! Contains core data structures used throughout the ledger.
//! This module organizes types into logical submodules:
//! - `account`: account ids, balances and storage bookkeeping
//! - `amount`: the base-10 string wire encoding of amounts
//! - `call`: ledger calls, outcomes and transfer-call records
//! - `error`: error types for the ledger
//! - `event`: mint, transfer and burn events recorded in the ledger log

pub mod account;
pub mod amount;
pub mod call;
pub mod error;
pub mod event;

pub use account::{AccountId, Balance, StorageBalance, StorageBalanceBounds, StorageRegistration};
pub use amount::U128;
pub use call::{
    CallOutcome, HookFailure, HookOutcome, HookRequest, LedgerCall, PendingTransfer, Settlement,
    TransferId, TransferState,
};
pub use error::LedgerError;
pub use event::{TokenEvent, EVENT_JSON_PREFIX};
