//! Asynchronous batch processing strategy
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (wallet partitioning + tokio tasks)
//!         └── TransferEngine over a shared Ledger
//! ```
//!
//! Batches run one after another so that a wallet whose transfers span
//! several batches still sees them in file order. Inside a batch, groups of
//! transfers that share no wallet run in parallel on the worker threads.

use crate::core::{BatchProcessor, TransferRequest};
use crate::io::async_reader::AsyncReader;
use crate::strategy::{build_engine, finish, seed_ledger, PipelineSettings, ProcessingStrategy, RunTally};
use crate::types::InputError;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for batch processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of transfers per batch
    pub batch_size: usize,
    /// Worker threads of the tokio runtime
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                requested = batch_size,
                fallback = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                requested = max_concurrent_batches,
                fallback = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
///
/// Produces the same wallet output as
/// [`SyncProcessingStrategy`](crate::strategy::SyncProcessingStrategy) for
/// the same input.
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    settings: PipelineSettings,
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(settings: PipelineSettings, config: BatchConfig) -> Self {
        Self { settings, config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(
        &self,
        wallets_path: &Path,
        transfers_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), InputError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| InputError::Io {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let (ledger, directory) = seed_ledger(wallets_path)?;
            let engine = Arc::new(build_engine(&self.settings, Arc::clone(&ledger), directory));
            let processor = BatchProcessor::new(engine);

            let file = tokio::fs::File::open(transfers_path)
                .await
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => InputError::FileNotFound {
                        path: transfers_path.display().to_string(),
                    },
                    _ => InputError::Io {
                        message: format!(
                            "Failed to open file '{}': {}",
                            transfers_path.display(),
                            e
                        ),
                    },
                })?;

            // csv-async reads futures::io, tokio files speak tokio::io
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader: AsyncReader<_, TransferRequest> = AsyncReader::new(compat_file);

            let mut tally = RunTally::default();
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let results = processor.process_batch(batch).await;
                debug!(transfers = results.len(), "batch complete");
                for result in &results {
                    tally.record(&result.result);
                }
            }

            finish(&self.settings, &ledger, tally, output)
        })
    }
}
