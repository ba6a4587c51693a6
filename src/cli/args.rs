use crate::config::{EngineConfig, LogConfig};
use crate::strategy::BatchConfig;
use crate::types::Region;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Move money between wallets and report the resulting balances
#[derive(Parser, Debug)]
#[command(name = "wallet-transfer-engine")]
#[command(about = "Move money between wallets and report the resulting balances", long_about = None)]
pub struct CliArgs {
    /// Wallets to open before processing
    #[arg(value_name = "WALLETS", help = "Path to the wallet seed CSV file")]
    pub wallets_file: PathBuf,

    /// Transfer requests, processed in file order
    #[arg(value_name = "TRANSFERS", help = "Path to the transfer request CSV file")]
    pub transfers_file: PathBuf,

    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for one transfer at a time or 'async' for concurrent batches"
    )]
    pub strategy: StrategyType,

    /// Number of transfers per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of transfers per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Worker threads for batch processing (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    #[arg(
        long = "fee-schedule",
        value_name = "PATH",
        help = "YAML fee schedule (default: built-in tier schedule)"
    )]
    pub fee_schedule: Option<PathBuf>,

    #[arg(
        long = "region",
        value_name = "CODE",
        help = "Region used for fee resolution when a transfer names none"
    )]
    pub region: Option<String>,

    #[arg(
        long = "journal",
        value_name = "PATH",
        help = "Write committed transaction and revenue records as JSON lines"
    )]
    pub journal: Option<PathBuf>,

    #[arg(long = "no-notify", help = "Do not announce committed transfers")]
    pub no_notify: bool,

    #[arg(
        long = "log-level",
        value_name = "FILTER",
        default_value = "warn",
        help = "Log filter directive; RUST_LOG takes precedence"
    )]
    pub log_level: String,

    #[arg(long = "log-json", help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

/// Available processing strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments, defaulting what is absent
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default().with_notifications(!self.no_notify);
        if let Some(region) = &self.region {
            config = config.with_region(Region::new(region));
        }
        config
    }

    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            json: self.log_json,
        }
    }
}
