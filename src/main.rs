//! Wallet Transfer Engine CLI
//!
//! Opens the wallets listed in one CSV file, runs the transfer requests of a
//! second CSV file through the engine, and prints the final wallet states to
//! stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- wallets.csv transfers.csv > balances.csv
//! cargo run -- --strategy sync wallets.csv transfers.csv > balances.csv
//! cargo run -- --fee-schedule fees.yaml --journal journal.jsonl wallets.csv transfers.csv
//! RUST_LOG=debug cargo run -- --log-json wallets.csv transfers.csv
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, unreadable file, invalid fee schedule, etc.)

use std::process;
use std::sync::Arc;
use wallet_transfer_engine::cli;
use wallet_transfer_engine::logging::init_logging;
use wallet_transfer_engine::strategy::{self, PipelineSettings};

fn main() {
    let args = cli::parse_args();

    if let Err(e) = init_logging(&args.to_log_config()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let fees = match cli::load_fee_schedule(&args) {
        Ok(fees) => fees,
        Err(e) => {
            tracing::error!(error = %e, "fee schedule rejected");
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let settings = PipelineSettings {
        engine: args.to_engine_config(),
        fees: Arc::new(fees),
        journal: args.journal.clone(),
    };

    let config = if matches!(args.strategy, cli::StrategyType::Async) {
        Some(args.to_batch_config())
    } else {
        None
    };
    let strategy = strategy::create_strategy(args.strategy.clone(), settings, config);

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.wallets_file, &args.transfers_file, &mut output) {
        tracing::error!(error = %e, "processing failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
