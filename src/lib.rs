//! Fungible Token Ledger Library
//! # Overview
//!
//! This library implements a fungible-token ledger with balances, allowances,
//! storage registration and two-phase transfer-and-notify calls, plus a
//! CSV call-script runner with a sync and an async strategy.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (AccountId, U128, LedgerCall, LedgerError, etc.)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::balance_ledger`] - Balances and total supply
//!   - [`core::allowance_registry`] - Delegated spending limits
//!   - [`core::storage_registry`] - Account registration and storage deposits
//!   - [`core::transfer_call`] - Transfer-and-notify initiation and settlement
//!   - [`core::ledger`] - The `TokenLedger` facade
//!   - `core::async` - Ledger service task and concurrent receiver hooks
//! - [`io`] - CSV call-script reading and balance output
//! - [`strategy`] - Complete processing pipelines
//!
//! # Transfer calls
//!
//! A transfer call moves tokens out of the sender immediately, asks the
//! receiver's hook how much it did not use, then settles:
//!
//! - The used part is credited to the receiver
//! - The unused part is refunded to the sender
//! - Whatever cannot be delivered because an account closed meanwhile is
//!   burned from the total supply
//!
//! # Invariant
//!
//! The sum of all balances plus the amounts of in-flight transfer calls always
//! equals the total supply.

pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{LedgerConfig, TokenLedger, TransferReceiver};
pub use io::write_balances_csv;
pub use types::{
    AccountId, Balance, HookOutcome, HookRequest, LedgerCall, LedgerError, Settlement, TokenEvent,
    U128,
};
