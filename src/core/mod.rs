//! Core business logic module
//!
//! This module contains the token ledger components:
//! - `balance_ledger` - Balances and total supply
//! - `allowance_registry` - Escrow allowances per (owner, spender)
//! - `storage_registry` - Account registration and storage deposits
//! - `transfer_call` - The transfer-and-notify state machine
//! - `ledger` - The `TokenLedger` facade composing the above
//! - `traits` - The receiver hook seam
//! - `async` - Ledger service and concurrent hook dispatch

pub mod allowance_registry;
pub mod r#async;
pub mod balance_ledger;
pub mod ledger;
pub mod storage_registry;
pub mod traits;
pub mod transfer_call;

pub use allowance_registry::AllowanceRegistry;
pub use balance_ledger::BalanceLedger;
pub use ledger::{LedgerConfig, TokenLedger};
pub use r#async::{
    CallReply, LedgerHandle, LedgerService, LedgerSnapshot, PayloadRefundReceiver,
    PendingSettlement, ReceiverDirectory,
};
pub use storage_registry::{AccountClosure, StorageRegistry, DEFAULT_STORAGE_DEPOSIT};
pub use traits::TransferReceiver;
pub use transfer_call::{parse_unused, TransferCallCoordinator, TransferCallRequest};
