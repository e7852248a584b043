//! Core traits for receiver notification hooks
//!
//! A transfer-and-notify call hands the transferred amount to the receiver's
//! hook and waits for it to report how much it did not use. Hooks are
//! external, untrusted logic: they may answer late, answer garbage, fail or
//! panic, and the ledger must settle correctly in every case.

use crate::types::{AccountId, HookFailure, U128};
use async_trait::async_trait;

/// Notification hook of an account that accepts transfer calls
///
/// Implementations can be plain in-process logic or adapters to an external
/// system; the ledger only ever sees the returned text.
#[async_trait]
pub trait TransferReceiver: Send + Sync {
    /// Called once the sender has been debited
    ///
    /// # Arguments
    ///
    /// * `sender` - The account whose balance was debited
    /// * `amount` - The gross amount sent
    /// * `payload` - Opaque message attached by the sender
    ///
    /// # Returns
    ///
    /// Raw text encoding the unused amount (`"10"` or `10`), or a failure.
    /// Both a failure and an unparsable answer lead to a full refund.
    async fn on_transfer(
        &self,
        sender: &AccountId,
        amount: U128,
        payload: &str,
    ) -> Result<String, HookFailure>;
}
