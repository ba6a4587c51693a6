//! Synchronous processing strategy
//!
//! Single-threaded pipeline: transfer rows are streamed one at a time through
//! the [`SyncReader`] and handed straight to the engine, so memory use is
//! O(wallets + records) and never depends on the size of the transfer file.

use crate::core::TransferRequest;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{build_engine, finish, seed_ledger, PipelineSettings, ProcessingStrategy, RunTally};
use crate::types::InputError;
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use wallet_transfer_engine::strategy::{PipelineSettings, ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
///
/// let strategy = SyncProcessingStrategy::new(PipelineSettings::default());
/// let mut output = std::io::stdout();
///
/// strategy
///     .process(Path::new("wallets.csv"), Path::new("transfers.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    settings: PipelineSettings,
}

impl SyncProcessingStrategy {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(
        &self,
        wallets_path: &Path,
        transfers_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), InputError> {
        let (ledger, directory) = seed_ledger(wallets_path)?;
        let engine = build_engine(&self.settings, ledger.clone(), directory);
        let reader = SyncReader::<TransferRequest>::new(transfers_path)?;

        let mut tally = RunTally::default();
        for row in reader {
            match row {
                // The engine logs its own rejections
                Ok(request) => tally.record(&engine.transfer(request)),
                Err(e) => warn!(error = %e, "skipping transfer row"),
            }
        }

        finish(&self.settings, &ledger, tally, output)
    }
}
