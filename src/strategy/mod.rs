//! Processing strategy module for transfer pipelines
//!
//! A strategy covers the whole pipeline: seed wallets from a CSV file, run
//! every transfer request of a second CSV file through the
//! [`TransferEngine`], then write the final wallet states (and optionally a
//! JSON-lines journal). Strategies differ only in how transfers are driven:
//! one at a time, or in concurrent batches.

use crate::cli::StrategyType;
use crate::config::EngineConfig;
use crate::core::{FeeSchedule, InMemoryDirectory, Ledger, TransferEngine};
use crate::io::csv_format::{write_wallets_csv, WalletSeed};
use crate::io::journal::write_journal;
use crate::io::sync_reader::SyncReader;
use crate::types::{InputError, TransferError, TransferReceipt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete transfer pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Process transfers and write the final wallet states to `output`
    ///
    /// # Arguments
    ///
    /// * `wallets_path` - CSV file of wallets to open before any transfer
    /// * `transfers_path` - CSV file of transfer requests, processed in order
    /// * `output` - Writer receiving the wallet CSV
    ///
    /// # Errors
    ///
    /// Returns an error for fatal problems only: an unreadable input file,
    /// a failed output or journal write. Rejected transfers and bad rows are
    /// logged and processing continues.
    fn process(
        &self,
        wallets_path: &Path,
        transfers_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), InputError>;
}

/// Settings shared by every strategy
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub engine: EngineConfig,
    pub fees: Arc<FeeSchedule>,
    /// Where to write the JSON-lines journal, if anywhere
    pub journal: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            fees: Arc::new(FeeSchedule::standard()),
            journal: None,
        }
    }
}

/// Open every wallet listed in the seed file
///
/// Bad rows and wallets the ledger refuses (duplicate owner or address) are
/// logged and skipped.
pub(crate) fn seed_ledger(
    wallets_path: &Path,
) -> Result<(Arc<Ledger>, Arc<InMemoryDirectory>), InputError> {
    let ledger = Arc::new(Ledger::new());
    let directory = Arc::new(InMemoryDirectory::new());

    for seed in SyncReader::<WalletSeed>::new(wallets_path)? {
        let seed = match seed {
            Ok(seed) => seed,
            Err(e) => {
                warn!(error = %e, "skipping wallet row");
                continue;
            }
        };
        let owner = seed.wallet.owner.clone();
        match ledger.open_wallet(seed.wallet) {
            Ok(wallet) => {
                debug!(wallet = %wallet.id, owner = %owner, "wallet opened");
                directory.insert(owner, seed.profile);
            }
            Err(e) => warn!(owner = %owner, error = %e, "wallet not opened"),
        }
    }

    info!(wallets = ledger.wallet_count(), "ledger seeded");
    Ok((ledger, directory))
}

pub(crate) fn build_engine(
    settings: &PipelineSettings,
    ledger: Arc<Ledger>,
    directory: Arc<InMemoryDirectory>,
) -> TransferEngine<Ledger, Ledger> {
    TransferEngine::with_ledger(ledger, settings.fees.clone())
        .with_directory(directory)
        .with_config(settings.engine.clone())
}

/// Tally of transfer outcomes for the end-of-run summary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunTally {
    pub committed: usize,
    pub rejected: usize,
}

impl RunTally {
    pub fn record(&mut self, result: &Result<TransferReceipt, TransferError>) {
        match result {
            Ok(_) => self.committed += 1,
            Err(_) => self.rejected += 1,
        }
    }
}

/// Write wallet output and the optional journal, then log the run summary
pub(crate) fn finish(
    settings: &PipelineSettings,
    ledger: &Ledger,
    tally: RunTally,
    output: &mut dyn Write,
) -> Result<(), InputError> {
    write_wallets_csv(&ledger.wallets(), output)?;

    if let Some(path) = &settings.journal {
        let file = File::create(path).map_err(|e| InputError::Io {
            message: format!("Failed to create journal '{}': {}", path.display(), e),
        })?;
        let mut writer = BufWriter::new(file);
        write_journal(&ledger.transactions(), &ledger.revenue_records(), &mut writer)?;
    }

    let revenue = ledger
        .platform_revenue()
        .map_or_else(|| "overflow".to_string(), |total| total.to_string());
    info!(
        committed = tally.committed,
        rejected = tally.rejected,
        platform_revenue = %revenue,
        "run complete"
    );
    Ok(())
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - Sync or Async
/// * `settings` - Engine configuration, fee schedule and journal path
/// * `config` - Batch configuration for async processing (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    settings: PipelineSettings,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(settings)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(settings, config))
        }
    }
}
