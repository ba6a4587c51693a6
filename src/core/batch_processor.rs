//! Batch processing with wallet-based partitioning
//!
//! This module provides the [`BatchProcessor`], which runs a batch of
//! transfer requests concurrently while keeping every wallet's transfers in
//! input order.
//!
//! # Design
//!
//! Transfers are grouped into connected components: two transfers land in
//! the same component when they touch a common wallet, directly or through a
//! chain of other transfers. Components share no wallet, so they run as
//! independent tokio tasks without ever conflicting at commit. Inside a
//! component transfers run sequentially in input order, which makes the
//! outcome identical to processing the whole batch one transfer at a time.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── Arc<TransferEngine>  (shared orchestrator)
//! ```

use crate::core::engine::{TransferEngine, TransferRequest};
use crate::core::traits::{RecordWriter, WalletStore};
use crate::types::{TransferError, TransferReceipt, WalletId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Result of processing a single transfer request
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// Position of the request in its batch
    pub index: usize,
    /// The request that was processed
    pub request: TransferRequest,
    /// The result of processing (receipt or error)
    pub result: Result<TransferReceipt, TransferError>,
}

/// Disjoint-set forest over batch positions
struct Components {
    parent: Vec<usize>,
}

impl Components {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    /// Merge two sets, keeping the smaller root so roots follow input order
    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a != root_b {
            let (low, high) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[high] = low;
        }
    }
}

/// Batch processor with wallet-based partitioning
pub struct BatchProcessor<W, R>
where
    W: WalletStore,
    R: RecordWriter<W::Session>,
{
    engine: Arc<TransferEngine<W, R>>,
}

impl<W, R> Clone for BatchProcessor<W, R>
where
    W: WalletStore,
    R: RecordWriter<W::Session>,
{
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<W, R> BatchProcessor<W, R>
where
    W: WalletStore + 'static,
    R: RecordWriter<W::Session> + 'static,
{
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `engine` - Arc-wrapped TransferEngine shared by all tasks
    pub fn new(engine: Arc<TransferEngine<W, R>>) -> Self {
        Self { engine }
    }

    /// Partition a batch into groups of transfers sharing wallets
    ///
    /// # Arguments
    ///
    /// * `batch` - Transfer requests in input order
    ///
    /// # Returns
    ///
    /// One vector per connected component, each holding `(index, request)`
    /// pairs in input order. Components are ordered by their first request.
    ///
    /// # Guarantees
    ///
    /// - Each request appears in exactly one component
    /// - No two components touch the same wallet
    /// - Requests inside a component keep their original order
    pub fn partition_by_wallet(
        &self,
        batch: Vec<TransferRequest>,
    ) -> Vec<Vec<(usize, TransferRequest)>> {
        let mut components = Components::new(batch.len());
        let mut first_seen: HashMap<WalletId, usize> = HashMap::new();

        for (index, request) in batch.iter().enumerate() {
            for wallet in self.engine.touched_wallets(request) {
                match first_seen.get(&wallet) {
                    Some(&earlier) => components.union(earlier, index),
                    None => {
                        first_seen.insert(wallet, index);
                    }
                }
            }
        }

        let mut groups: Vec<Vec<(usize, TransferRequest)>> = Vec::new();
        let mut group_of_root: HashMap<usize, usize> = HashMap::new();
        for (index, request) in batch.into_iter().enumerate() {
            let root = components.find(index);
            let group = *group_of_root.entry(root).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[group].push((index, request));
        }

        groups
    }

    /// Process one component sequentially
    ///
    /// All requests are processed even if some fail; results keep the input
    /// order.
    pub fn process_component(
        &self,
        transfers: Vec<(usize, TransferRequest)>,
    ) -> Vec<ProcessingResult> {
        transfers
            .into_iter()
            .map(|(index, request)| {
                let result = self.engine.transfer(request.clone());
                ProcessingResult {
                    index,
                    request,
                    result,
                }
            })
            .collect()
    }

    /// Process a batch with one tokio task per component
    ///
    /// # Returns
    ///
    /// A `ProcessingResult` per request, sorted back into input order.
    pub async fn process_batch(&self, batch: Vec<TransferRequest>) -> Vec<ProcessingResult> {
        let size = batch.len();
        let components = self.partition_by_wallet(batch);
        debug!(transfers = size, components = components.len(), "batch partitioned");

        let mut tasks = Vec::with_capacity(components.len());
        for transfers in components {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                processor.process_component(transfers)
            }));
        }

        let mut results = Vec::with_capacity(size);
        for task in tasks {
            match task.await {
                Ok(component_results) => results.extend(component_results),
                Err(e) => error!(error = %e, "transfer task failed"),
            }
        }

        results.sort_by_key(|result| result.index);
        results
    }
}
