use crate::core::LedgerConfig;
use crate::strategy::{BatchConfig, LedgerSetup};
use crate::types::{AccountId, U128};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay a fungible-token call script and print the final balances
#[derive(Parser, Debug)]
#[command(name = "ft-ledger")]
#[command(about = "Replay a fungible-token call script and print the final balances", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing ledger calls
    #[arg(value_name = "INPUT", help = "Path to the input CSV call script")]
    pub input_file: PathBuf,

    /// Processing strategy to use for the call script
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' settles each transfer call at once, 'async' runs hooks concurrently"
    )]
    pub strategy: StrategyType,

    /// Number of calls per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of calls per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of concurrently running receiver hooks (async mode only)
    #[arg(
        long = "max-in-flight",
        value_name = "COUNT",
        help = "Maximum number of receiver hooks running concurrently (default: CPU cores)"
    )]
    pub max_in_flight_hooks: Option<usize>,

    /// Storage deposit required to register an account
    #[arg(
        long = "storage-deposit",
        value_name = "AMOUNT",
        help = "Storage deposit required to register an account (default: 1.25e21)"
    )]
    pub storage_deposit: Option<U128>,

    /// Accounts that run the payload-refund receiver hook
    #[arg(
        long = "receiver",
        value_name = "ACCOUNT",
        help = "Attach the payload-refund receiver hook to ACCOUNT (repeatable)"
    )]
    pub receivers: Vec<AccountId>,
}

/// Available processing strategies for call scripts
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Values not given on the command line fall back to the defaults. Zero
    /// values are rejected by `BatchConfig::new` with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_in_flight_hooks.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_in_flight_hooks
                    .unwrap_or(default.max_in_flight_hooks),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create the ledger setup from CLI arguments
    pub fn to_ledger_setup(&self) -> LedgerSetup {
        let config = match self.storage_deposit {
            Some(deposit) => LedgerConfig {
                storage_deposit: deposit.into(),
            },
            None => LedgerConfig::default(),
        };
        LedgerSetup::new(config, self.receivers.clone())
    }
}
