//! Hook dispatch for the ledger service
//!
//! Each transfer call's receiver hook runs in its own tokio task. When the
//! hook resolves, the task posts a `Settle` command back into the ledger
//! service's mailbox, so settlement runs on the ledger task like any other
//! call. A semaphore bounds how many hooks run at once.
//!
//! # Architecture
//!
//! ```text
//! LedgerService ──dispatch(HookRequest)──▶ tokio task
//!       ▲                                     │ ReceiverDirectory::invoke
//!       └────────── Settle { outcome } ───────┘
//! ```

use super::receivers::ReceiverDirectory;
use super::service::LedgerCommand;
use crate::types::HookRequest;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs receiver hooks off the ledger task
#[derive(Debug, Clone)]
pub struct HookDispatcher {
    directory: Arc<ReceiverDirectory>,
    permits: Arc<Semaphore>,
    /// Weak so that the mailbox closes once every handle is gone and every
    /// spawned hook has reported back
    mailbox: mpsc::WeakSender<LedgerCommand>,
}

impl HookDispatcher {
    /// Create a dispatcher
    ///
    /// # Arguments
    ///
    /// * `directory` - Routing table of receiver hooks
    /// * `max_in_flight` - Maximum number of hooks running at once (at least 1)
    /// * `mailbox` - The ledger service's mailbox
    pub fn new(
        directory: Arc<ReceiverDirectory>,
        max_in_flight: usize,
        mailbox: mpsc::WeakSender<LedgerCommand>,
    ) -> Self {
        Self {
            directory,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            mailbox,
        }
    }

    /// Spawn the hook for `request`
    ///
    /// Returns `Err(request)` if the mailbox is already closed; the caller
    /// must then settle the transfer itself.
    pub fn dispatch(&self, request: HookRequest) -> Result<JoinHandle<()>, HookRequest> {
        let Some(mailbox) = self.mailbox.upgrade() else {
            return Err(request);
        };
        let directory = Arc::clone(&self.directory);
        let permits = Arc::clone(&self.permits);

        Ok(tokio::spawn(async move {
            // The semaphore is never closed
            let _permit = permits.acquire_owned().await.ok();
            debug!(transfer_id = request.transfer_id, receiver = %request.receiver, "invoking receiver hook");

            let outcome = directory.invoke(&request).await;
            let command = LedgerCommand::Settle {
                transfer_id: request.transfer_id,
                outcome,
            };
            if mailbox.send(command).await.is_err() {
                warn!(
                    transfer_id = request.transfer_id,
                    "ledger service stopped before settlement"
                );
            }
        }))
    }
}
