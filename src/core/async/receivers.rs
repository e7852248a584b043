//! Receiver hook routing
//!
//! The `ReceiverDirectory` maps receiver accounts to their notification
//! hooks and turns every way a hook invocation can go wrong into a
//! [`HookOutcome::Failed`]: no hook attached, an error returned, or a panic
//! while the hook runs.
//!
//! # Thread Safety
//!
//! Hooks are looked up from many tasks at once, so the directory is backed by
//! a `DashMap`. Lookups clone the `Arc` out of the map so no shard lock is
//! held across the hook's `.await`.

use crate::core::traits::TransferReceiver;
use crate::types::{AccountId, HookFailure, HookOutcome, HookRequest, U128};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes receiver accounts to their notification hooks
#[derive(Default)]
pub struct ReceiverDirectory {
    receivers: DashMap<AccountId, Arc<dyn TransferReceiver>>,
}

impl std::fmt::Debug for ReceiverDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiverDirectory")
            .field("receivers", &self.len())
            .finish()
    }
}

impl ReceiverDirectory {
    pub fn new() -> Self {
        Self {
            receivers: DashMap::new(),
        }
    }

    /// Attach a hook to `account`, replacing any previous one
    pub fn register(
        &self,
        account: AccountId,
        receiver: Arc<dyn TransferReceiver>,
    ) -> Option<Arc<dyn TransferReceiver>> {
        debug!(account = %account, "receiver hook attached");
        self.receivers.insert(account, receiver)
    }

    pub fn get(&self, account: &AccountId) -> Option<Arc<dyn TransferReceiver>> {
        self.receivers
            .get(account)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Run the receiver's hook for one transfer call
    ///
    /// Never fails: an unroutable receiver, a hook error and a hook panic
    /// all come back as [`HookOutcome::Failed`].
    pub async fn invoke(&self, request: &HookRequest) -> HookOutcome {
        let Some(receiver) = self.get(&request.receiver) else {
            warn!(transfer_id = request.transfer_id, receiver = %request.receiver, "no receiver hook attached");
            return HookOutcome::Failed(format!(
                "@{} has no receiver hook",
                request.receiver
            ));
        };

        let call = receiver.on_transfer(&request.sender, U128(request.amount), &request.payload);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => {
                let outcome = HookOutcome::from(result);
                debug!(transfer_id = request.transfer_id, ?outcome, "receiver hook returned");
                outcome
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(transfer_id = request.transfer_id, %reason, "receiver hook panicked");
                HookOutcome::Failed(reason)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "receiver hook panicked".to_string()
    }
}

/// Receiver that decides what to keep from the payload text
///
/// - `take-my-money` keeps the whole amount
/// - an integer payload is handed back as the unused amount
/// - anything else fails the hook, so the sender is refunded in full
#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadRefundReceiver;

/// Payload that makes [`PayloadRefundReceiver`] keep everything
pub const TAKE_MY_MONEY: &str = "take-my-money";

#[async_trait]
impl TransferReceiver for PayloadRefundReceiver {
    async fn on_transfer(
        &self,
        sender: &AccountId,
        amount: U128,
        payload: &str,
    ) -> Result<String, HookFailure> {
        debug!(sender = %sender, amount = amount.0, payload, "payload receiver notified");
        if payload == TAKE_MY_MONEY {
            return Ok("\"0\"".to_string());
        }

        payload
            .trim()
            .parse::<u128>()
            .map(|unused| format!("\"{}\"", unused))
            .map_err(|e| HookFailure::new(format!("ParseIntError: {}", e)))
    }
}
