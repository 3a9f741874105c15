//! # Error Types
//!
//! Errors shared across components: the ledger-core failure taxonomy carried
//! through method slots, and encoding/parsing failures of chain entities.

use thiserror::Error;

use crate::entities::{BlockId, PublicKey, TransactionId};

/// Failures reported by the ledger core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Memory (or reversible cache) exhausted while applying a block or
    /// transaction. Never retried.
    #[error("Out of memory: {detail}")]
    OutOfMemory { detail: String },

    /// Block lookup found nothing.
    #[error("Could not find block: {block}")]
    UnknownBlock { block: String },

    /// Block does not link to the current head.
    #[error("Unlinkable block #{block_num}: previous {previous} is not the head")]
    UnlinkableBlock { block_num: u32, previous: BlockId },

    /// Block failed validation.
    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    /// Transaction could not be decoded or failed validation.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Transaction was already applied.
    #[error("Duplicate transaction {id}")]
    DuplicateTransaction { id: TransactionId },

    /// A required authorizer key is not among the available keys.
    #[error("Unsatisfied authorization: missing key {key}")]
    UnsatisfiedAuthorization { key: PublicKey },

    /// Block contradicts a pinned checkpoint.
    #[error("Checkpoint mismatch at block #{block_num}: expected {expected}, got {actual}")]
    CheckpointMismatch {
        block_num: u32,
        expected: BlockId,
        actual: BlockId,
    },

    /// A database was not closed cleanly.
    #[error("Database dirty flag set: {0}")]
    DatabaseDirty(String),

    /// Mutation attempted on a read-only ledger.
    #[error("Ledger is read-only")]
    ReadOnly,

    /// Ledger used before `startup`.
    #[error("Ledger not started")]
    NotStarted,

    /// Underlying storage failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    /// True for the memory-exhaustion class that escalates to shutdown.
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, LedgerError::OutOfMemory { .. })
    }
}

/// Binary encoding/decoding failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Encoding failed: {0}")]
    Encode(String),
    #[error("Decoding failed: {0}")]
    Decode(String),
}

/// A textual id that is not 64 hex characters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid id '{input}': {reason}")]
pub struct IdParseError {
    pub input: String,
    pub reason: String,
}

impl IdParseError {
    pub fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
