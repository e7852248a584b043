//! Ledger service: a single-owner ledger task with a mailbox
//!
//! The `TokenLedger` is moved into one tokio task that processes commands
//! one at a time, to completion. Callers talk to it through a cloneable
//! [`LedgerHandle`]. A transfer call returns as soon as the sender is
//! debited; its hook runs on the [`HookDispatcher`] and the settlement comes
//! back through the same mailbox, so unrelated calls interleave with
//! in-flight transfers and observe the debited balance.

use super::hook_dispatcher::HookDispatcher;
use super::receivers::ReceiverDirectory;
use crate::core::ledger::TokenLedger;
use crate::types::{
    AccountId, CallOutcome, HookOutcome, LedgerCall, LedgerError, Settlement, TransferId, U128,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Capacity of the service mailbox
pub const MAILBOX_CAPACITY: usize = 1024;

/// Message processed by the ledger task
#[derive(Debug)]
pub enum LedgerCommand {
    /// Run one call and reply with its outcome
    Apply {
        call: LedgerCall,
        reply: oneshot::Sender<Result<CallReply, LedgerError>>,
    },
    /// Settle a transfer call with its hook outcome
    Settle {
        transfer_id: TransferId,
        outcome: HookOutcome,
    },
    Snapshot {
        reply: oneshot::Sender<LedgerSnapshot>,
    },
}

/// Reply to a submitted call
#[derive(Debug)]
pub struct CallReply {
    pub outcome: CallOutcome,
    /// Present when the call started a transfer call
    pub settlement: Option<PendingSettlement>,
}

/// Settlement of a transfer call that has not resolved yet
#[derive(Debug)]
pub struct PendingSettlement {
    transfer_id: TransferId,
    receiver: oneshot::Receiver<Settlement>,
}

impl PendingSettlement {
    pub fn transfer_id(&self) -> TransferId {
        self.transfer_id
    }

    /// Wait for the transfer call to settle
    ///
    /// # Errors
    ///
    /// Returns `ServiceStopped` if the ledger task went away first.
    pub async fn settled(self) -> Result<Settlement, LedgerError> {
        self.receiver.await.map_err(|_| LedgerError::ServiceStopped)
    }
}

/// Point-in-time view of the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSnapshot {
    /// Registered accounts and balances, sorted by account id
    pub accounts: Vec<(AccountId, U128)>,
    pub total_supply: U128,
    pub logs: Vec<String>,
    pub in_flight: U128,
}

/// Cloneable handle to a running ledger service
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    mailbox: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    /// Submit one call and wait for its synchronous outcome
    ///
    /// For transfer calls the reply carries a [`PendingSettlement`]; the call
    /// itself is already applied (sender debited) when this returns.
    pub async fn submit(&self, call: LedgerCall) -> Result<CallReply, LedgerError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(LedgerCommand::Apply { call, reply })
            .await
            .map_err(|_| LedgerError::ServiceStopped)?;
        response.await.map_err(|_| LedgerError::ServiceStopped)?
    }

    pub async fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(LedgerCommand::Snapshot { reply })
            .await
            .map_err(|_| LedgerError::ServiceStopped)?;
        response.await.map_err(|_| LedgerError::ServiceStopped)
    }
}

/// The ledger task
pub struct LedgerService {
    ledger: TokenLedger,
    dispatcher: HookDispatcher,
    mailbox: mpsc::Receiver<LedgerCommand>,
    /// Callers waiting on a transfer call's settlement
    waiting: HashMap<TransferId, oneshot::Sender<Settlement>>,
}

impl LedgerService {
    /// Move `ledger` into a new task and return a handle to it
    ///
    /// # Arguments
    ///
    /// * `ledger` - The ledger to serve
    /// * `directory` - Receiver hooks for transfer calls
    /// * `max_in_flight_hooks` - Maximum number of hooks running at once
    ///
    /// # Returns
    ///
    /// The handle plus the task's join handle. The task ends once every
    /// handle is dropped and every in-flight hook has reported back, and
    /// yields the ledger.
    pub fn spawn(
        ledger: TokenLedger,
        directory: Arc<ReceiverDirectory>,
        max_in_flight_hooks: usize,
    ) -> (LedgerHandle, JoinHandle<TokenLedger>) {
        let (sender, receiver) = mpsc::channel(MAILBOX_CAPACITY);
        let dispatcher = HookDispatcher::new(directory, max_in_flight_hooks, sender.downgrade());
        let service = LedgerService {
            ledger,
            dispatcher,
            mailbox: receiver,
            waiting: HashMap::new(),
        };

        let task = tokio::spawn(service.run());
        (LedgerHandle { mailbox: sender }, task)
    }

    async fn run(mut self) -> TokenLedger {
        while let Some(command) = self.mailbox.recv().await {
            match command {
                LedgerCommand::Apply { call, reply } => {
                    let result = self.apply(call);
                    if reply.send(result).is_err() {
                        debug!("caller went away before the reply");
                    }
                }
                LedgerCommand::Settle {
                    transfer_id,
                    outcome,
                } => self.settle(transfer_id, outcome),
                LedgerCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
            }
        }

        debug!("ledger service stopped");
        self.ledger
    }

    fn apply(&mut self, call: LedgerCall) -> Result<CallReply, LedgerError> {
        let outcome = self.ledger.apply(call)?;

        let settlement = match &outcome {
            CallOutcome::TransferStarted(request) => {
                let transfer_id = request.transfer_id;
                let (sender, receiver) = oneshot::channel();
                self.waiting.insert(transfer_id, sender);

                if let Err(request) = self.dispatcher.dispatch(request.clone()) {
                    self.settle(
                        request.transfer_id,
                        HookOutcome::Failed("ledger service is shutting down".to_string()),
                    );
                }
                Some(PendingSettlement {
                    transfer_id,
                    receiver,
                })
            }
            _ => None,
        };

        Ok(CallReply {
            outcome,
            settlement,
        })
    }

    fn settle(&mut self, transfer_id: TransferId, outcome: HookOutcome) {
        match self.ledger.settle(transfer_id, outcome) {
            Ok(settlement) => {
                if let Some(waiter) = self.waiting.remove(&transfer_id) {
                    let _ = waiter.send(settlement);
                }
            }
            Err(error) => warn!(transfer_id, %error, "settlement rejected"),
        }
    }

    fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            accounts: self.ledger.accounts(),
            total_supply: self.ledger.total_supply(),
            logs: self.ledger.logs().to_vec(),
            in_flight: self.ledger.in_flight_total(),
        }
    }
}
