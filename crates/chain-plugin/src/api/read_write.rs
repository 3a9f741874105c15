//! # Read-Write API
//!
//! Block injection and transaction submission. Every mutation goes through
//! the [`SubmissionPipeline`], so memory exhaustion escalates the same way
//! regardless of the entry point.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared_types::{PackedTransaction, SignedBlock, TransactionId, TransactionTrace};

use crate::errors::{AbiError, ApiError};
use crate::ports::AbiSerializer;
use crate::submission::{check_batch_size, BatchItem, BatchItemResult, SubmissionPipeline};

/// Result of one pushed transaction.
///
/// A failed batch entry carries the zero id and `{"error": detail}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushTransactionResult {
    pub transaction_id: TransactionId,
    pub processed: Value,
}

impl PushTransactionResult {
    fn failed(detail: impl Into<String>) -> Self {
        Self {
            transaction_id: TransactionId::default(),
            processed: json!({ "error": detail.into() }),
        }
    }

    /// True if this entry carries an error instead of a trace.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.processed.get("error").is_some()
    }
}

/// Mutation surface.
#[derive(Clone)]
pub struct ReadWriteApi {
    pipeline: SubmissionPipeline,
    abi: Arc<dyn AbiSerializer>,
}

impl ReadWriteApi {
    #[must_use]
    pub fn new(pipeline: SubmissionPipeline, abi: Arc<dyn AbiSerializer>) -> Self {
        Self { pipeline, abi }
    }

    pub fn push_block(&self, block: SignedBlock) -> Result<(), ApiError> {
        self.pipeline.submit_block(Arc::new(block))?;
        Ok(())
    }

    /// Submit one transaction given in JSON form.
    pub fn push_transaction(&self, params: &Value) -> Result<PushTransactionResult, ApiError> {
        let trx = self.parse_packed(params)?;
        let trace = self.pipeline.submit_transaction(trx)?;
        self.render(&trace)
    }

    /// Submit up to 1000 transactions; a bad entry does not stop the rest.
    pub fn push_transactions(&self, params: &[Value]) -> Result<Vec<PushTransactionResult>, ApiError> {
        check_batch_size(params.len())?;

        let items: Vec<BatchItem> = params
            .iter()
            .map(|p| self.parse_packed(p).map_err(|e| e.to_string()))
            .collect();

        let results = self.pipeline.submit_transaction_batch(items)?;
        Ok(results
            .into_iter()
            .map(|result| match result {
                BatchItemResult::Applied(trace) => self
                    .render(&trace)
                    .unwrap_or_else(|e| PushTransactionResult::failed(e.to_string())),
                BatchItemResult::Failed { detail } => PushTransactionResult::failed(detail),
            })
            .collect())
    }

    fn parse_packed(&self, params: &Value) -> Result<Arc<PackedTransaction>, ApiError> {
        self.abi
            .packed_transaction_from_variant(params)
            .map(Arc::new)
            .map_err(|e| match e {
                AbiError::Deserialize(reason) => ApiError::InvalidPackedTransaction(reason),
                other => ApiError::Abi(other),
            })
    }

    fn render(&self, trace: &TransactionTrace) -> Result<PushTransactionResult, ApiError> {
        Ok(PushTransactionResult {
            transaction_id: trace.id,
            processed: self.abi.trace_to_variant(trace)?,
        })
    }
}

impl std::fmt::Debug for ReadWriteApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadWriteApi")
            .field("pipeline", &self.pipeline)
            .field("abi_version", &self.abi.version())
            .finish()
    }
}
