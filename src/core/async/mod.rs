//! Asynchronous side of the ledger
//!
//! This module runs the ledger as a service and delivers transfer calls to
//! their receiver hooks concurrently:
//!
//! - **LedgerService**: owns the `TokenLedger` on one task, fed by a mailbox
//! - **HookDispatcher**: runs receiver hooks as tasks, bounded by a semaphore
//! - **ReceiverDirectory**: thread-safe routing of receiver ids to hooks (DashMap)
//!
//! # Ordering
//!
//! Commands are processed one at a time, in mailbox order. A transfer call's
//! settlement is always processed after its initiating call and may be
//! interleaved with any number of unrelated calls.

pub mod hook_dispatcher;
pub mod receivers;
pub mod service;

pub use hook_dispatcher::HookDispatcher;
pub use receivers::{PayloadRefundReceiver, ReceiverDirectory, TAKE_MY_MONEY};
pub use service::{
    CallReply, LedgerCommand, LedgerHandle, LedgerService, LedgerSnapshot, PendingSettlement,
};
