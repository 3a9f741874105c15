//! # Submission Pipeline
//!
//! Forwards blocks and transactions to the block-sync and transaction-sync
//! method slots. Memory exhaustion is never reported as an ordinary failure:
//! it requests an emergency shutdown instead.

use std::sync::Arc;

use shared_bus::interfaces::{BlockSync, TransactionSync};
use shared_bus::NodeBus;
use shared_types::{LedgerError, PackedTransaction, SignedBlock, TransactionTrace};
use tracing::{debug, warn};

use crate::errors::SubmitError;
use crate::submission::EmergencyShutdown;

/// Largest accepted transaction batch.
pub const MAX_BATCH_SIZE: usize = 1000;

/// One batch entry: a decoded transaction or the reason it could not be
/// decoded.
pub type BatchItem = Result<Arc<PackedTransaction>, String>;

/// Outcome of one batch entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchItemResult {
    Applied(Arc<TransactionTrace>),
    Failed { detail: String },
}

impl BatchItemResult {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, BatchItemResult::Applied(_))
    }
}

/// Block and transaction submission over the bus.
#[derive(Clone)]
pub struct SubmissionPipeline {
    bus: Arc<NodeBus>,
    shutdown: EmergencyShutdown,
}

impl SubmissionPipeline {
    #[must_use]
    pub fn new(bus: Arc<NodeBus>, shutdown: EmergencyShutdown) -> Self {
        Self { bus, shutdown }
    }

    #[must_use]
    pub fn shutdown(&self) -> &EmergencyShutdown {
        &self.shutdown
    }

    /// Apply a block through the block-sync slot.
    pub fn submit_block(&self, block: Arc<SignedBlock>) -> Result<(), SubmitError> {
        let block_num = block.block_num();
        let result = self.bus.method::<BlockSync>().call(block)?;
        result.map_err(|e| self.escalate(e))?;
        debug!(block_num, "Block submitted");
        Ok(())
    }

    /// Apply an externally submitted transaction.
    pub fn submit_transaction(
        &self,
        trx: Arc<PackedTransaction>,
    ) -> Result<Arc<TransactionTrace>, SubmitError> {
        let result = self.bus.method::<TransactionSync>().call((trx, false))?;
        result.map_err(|e| self.escalate(e))
    }

    /// Apply each entry in order, isolating per-entry failures.
    ///
    /// # Errors
    ///
    /// - `BatchTooLarge` before any entry is processed
    /// - `ShutdownRequested` as soon as an entry exhausts memory
    pub fn submit_transaction_batch(
        &self,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchItemResult>, SubmitError> {
        check_batch_size(items.len())?;

        let mut results = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            let outcome = match item {
                Ok(trx) => self.submit_transaction(trx),
                Err(detail) => {
                    results.push(BatchItemResult::Failed { detail });
                    continue;
                }
            };
            match outcome {
                Ok(trace) => results.push(BatchItemResult::Applied(trace)),
                Err(e @ SubmitError::ShutdownRequested { .. }) => return Err(e),
                Err(e) => {
                    debug!(position, error = %e, "Batch entry failed");
                    results.push(BatchItemResult::Failed {
                        detail: e.to_string(),
                    });
                }
            }
        }
        Ok(results)
    }

    fn escalate(&self, err: LedgerError) -> SubmitError {
        if err.is_out_of_memory() {
            let detail = err.to_string();
            self.shutdown.request(detail.clone());
            SubmitError::ShutdownRequested { detail }
        } else {
            SubmitError::Ledger(err)
        }
    }
}

/// Reject batches over [`MAX_BATCH_SIZE`].
pub fn check_batch_size(size: usize) -> Result<(), SubmitError> {
    if size > MAX_BATCH_SIZE {
        warn!(size, max = MAX_BATCH_SIZE, "Transaction batch rejected");
        return Err(SubmitError::BatchTooLarge {
            size,
            max: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

impl std::fmt::Debug for SubmissionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionPipeline")
            .field("shutdown", &self.shutdown)
            .finish_non_exhaustive()
    }
}
