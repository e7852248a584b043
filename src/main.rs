//! Fungible token ledger CLI
//!
//! Replays a CSV call script against a fresh token ledger and prints the
//! final balances.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- calls.csv > balances.csv
//! cargo run -- --strategy sync --receiver defi calls.csv > balances.csv
//! cargo run -- --strategy async --batch-size 2000 --max-in-flight 8 calls.csv > balances.csv
//! RUST_LOG=info cargo run -- --storage-deposit 1 calls.csv
//! ```
//!
//! Balances are written to stdout. Ledger log lines and rejected calls go to
//! stderr through `tracing`; the level is taken from `RUST_LOG` and defaults
//! to `warn`.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, file not readable, conservation violated, etc.)

use ft_ledger::cli;
use ft_ledger::strategy;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = cli::parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), config, args.to_ledger_setup())
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.input_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
