//! Synchronous processing strategy
//!
//! This module provides a synchronous, single-threaded implementation of the
//! ProcessingStrategy trait. It orchestrates processing by coordinating
//! between the SyncReader (for CSV input), the TokenLedger (for business
//! logic) and the ReceiverDirectory (for transfer-call hooks).
//!
//! # Hook resolution
//!
//! Every transfer call is settled right after it is initiated: the receiver
//! hook is driven to completion on the current thread before the next call
//! is read. No call ever observes an in-flight transfer.

use crate::core::{ReceiverDirectory, TokenLedger};
use crate::io::csv_format::write_balances_csv;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{LedgerSetup, ProcessingStrategy};
use crate::types::{CallOutcome, LedgerCall};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use ft_ledger::strategy::{LedgerSetup, ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::io;
///
/// let strategy = SyncProcessingStrategy::new(LedgerSetup::default());
/// let mut output = io::stdout();
///
/// strategy.process(Path::new("calls.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    setup: LedgerSetup,
}

impl SyncProcessingStrategy {
    pub fn new(setup: LedgerSetup) -> Self {
        Self { setup }
    }
}

/// Apply one call and settle it at once if it started a transfer call
fn apply_and_settle(ledger: &mut TokenLedger, directory: &ReceiverDirectory, call: LedgerCall) {
    let name = call.name();
    match ledger.apply(call) {
        Ok(CallOutcome::TransferStarted(request)) => {
            let outcome = futures::executor::block_on(directory.invoke(&request));
            if let Err(e) = ledger.settle(request.transfer_id, outcome) {
                warn!(call = name, error = %e, "settlement rejected");
            }
        }
        Ok(_) => {}
        Err(e) => warn!(call = name, error = %e, "call rejected"),
    }

    for line in ledger.drain_logs() {
        info!("{}", line);
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Process calls from input file and write balances to output
    ///
    /// 1. Creates a SyncReader to stream calls from the CSV file
    /// 2. Applies each call to a fresh TokenLedger, settling transfer calls
    ///    immediately
    /// 3. Verifies conservation of value
    /// 4. Writes balances using csv_format::write_balances_csv
    ///
    /// # Error Handling
    ///
    /// Fatal errors (file not found, I/O errors) are returned immediately.
    /// Individual call errors are logged and processing continues.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let mut ledger = self.setup.ledger();
        let directory = self.setup.directory();

        let reader = SyncReader::new(input_path)?;

        for result in reader {
            match result {
                Ok(call) => apply_and_settle(&mut ledger, &directory, call),
                Err(e) => warn!(error = %e, "CSV parsing error"),
            }
        }

        ledger.check_conservation().map_err(|e| e.to_string())?;
        write_balances_csv(&ledger.accounts(), output)?;

        Ok(())
    }
}
