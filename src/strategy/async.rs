//! Asynchronous processing strategy
//!
//! This module provides an asynchronous, multi-threaded implementation of the
//! ProcessingStrategy trait. Calls are read in batches and submitted to a
//! ledger service task; receiver hooks of transfer calls run concurrently on
//! the runtime's worker threads and settle through the service mailbox.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_in_flight_hooks)
//!     ├── AsyncReader (batch CSV reading)
//!     └── LedgerService (single-owner TokenLedger task)
//!         └── HookDispatcher (receiver hooks as tasks)
//!             └── ReceiverDirectory (DashMap of hooks)
//! ```
//!
//! # Ordering
//!
//! Calls are submitted one at a time in file order. The settlements of a
//! batch are awaited before the next batch is read, so a transfer call's
//! hook may race later calls of its own batch but never those of the next.

use crate::core::LedgerService;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_balances_csv;
use crate::strategy::{LedgerSetup, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration for batch processing
///
/// Controls how many calls are read per batch and how many receiver hooks
/// may run at the same time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of calls per batch
    pub batch_size: usize,
    /// Maximum number of receiver hooks running concurrently
    pub max_in_flight_hooks: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_in_flight_hooks: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn new(batch_size: usize, max_in_flight_hooks: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                "Invalid batch_size ({}), using default ({})",
                batch_size, default.batch_size
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_in_flight_hooks = if max_in_flight_hooks == 0 {
            warn!(
                "Invalid max_in_flight_hooks ({}), using default ({})",
                max_in_flight_hooks, default.max_in_flight_hooks
            );
            default.max_in_flight_hooks
        } else {
            max_in_flight_hooks
        };

        Self {
            batch_size,
            max_in_flight_hooks,
        }
    }
}

/// Asynchronous processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    setup: LedgerSetup,
}

impl AsyncProcessingStrategy {
    /// Create a new AsyncProcessingStrategy
    ///
    /// # Arguments
    ///
    /// * `config` - BatchConfig with batch_size and max_in_flight_hooks
    /// * `setup` - Ledger configuration and receiver hooks
    pub fn new(config: BatchConfig, setup: LedgerSetup) -> Self {
        Self { config, setup }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Process calls from input file and write balances to output
    ///
    /// 1. Creates a tokio multi-threaded runtime
    /// 2. Spawns the LedgerService with a fresh ledger and the receiver hooks
    /// 3. Reads calls in batches using AsyncReader and submits them in order
    /// 4. Awaits the settlements of each batch before reading the next
    /// 5. Takes a snapshot, shuts the service down and verifies conservation
    /// 6. Writes balances using csv_format::write_balances_csv
    ///
    /// # Error Handling
    ///
    /// Fatal errors (file not found, runtime errors, a stopped service) are
    /// returned immediately. Individual call errors are logged and processing
    /// continues.
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_in_flight_hooks)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let (handle, service) = LedgerService::spawn(
                self.setup.ledger(),
                Arc::new(self.setup.directory()),
                self.config.max_in_flight_hooks,
            );

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // Wrap tokio file in a compatibility layer for csv-async
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut pending = Vec::new();
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                for call in batch {
                    let name = call.name();
                    match handle.submit(call).await {
                        Ok(reply) => pending.extend(reply.settlement),
                        Err(e) => warn!(call = name, error = %e, "call rejected"),
                    }
                }

                for settlement in pending.drain(..) {
                    if let Err(e) = settlement.settled().await {
                        return Err(e.to_string());
                    }
                }
            }

            let snapshot = handle.snapshot().await.map_err(|e| e.to_string())?;
            drop(handle);
            let ledger = service
                .await
                .map_err(|e| format!("Ledger service failed: {}", e))?;

            for line in &snapshot.logs {
                info!("{}", line);
            }
            ledger.check_conservation().map_err(|e| e.to_string())?;
            write_balances_csv(&snapshot.accounts, output)?;

            Ok(())
        })
    }
}
