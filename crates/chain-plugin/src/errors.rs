//! # Chain Plugin Errors
//!
//! - [`ChainError`]: configuration, lifecycle and maintenance failures.
//! - [`SubmitError`]: submission pipeline outcomes.
//! - [`ApiError`]: per-request failures with a stable numeric code.
//! - [`AbiError`]: action argument translation failures.

use std::io;
use std::path::PathBuf;

use block_storage::{BlockLogError, RecoveryError};
use serde_json::{json, Value};
use shared_bus::MethodError;
use shared_types::LedgerError;
use thiserror::Error;

use crate::genesis::GenesisError;
use crate::lifecycle::LifecycleState;

/// Process exit code for a run that only fixed the reversible database.
pub const EXIT_FIXED_REVERSIBLE: i32 = 3;

/// Process exit code after an emergency shutdown on memory exhaustion.
pub const EXIT_BAD_ALLOC: i32 = 1;

/// Process exit code for any other initialization failure.
pub const EXIT_INIT_FAILURE: i32 = -1;

/// Errors from configuring, starting and maintaining the chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid checkpoint '{entry}': {reason}")]
    InvalidCheckpoint { entry: String, reason: String },

    #[error(transparent)]
    Genesis(#[from] GenesisError),

    /// Lifecycle operation called out of order.
    #[error("Cannot {operation} while the chain plugin is {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error("Maintenance failed on {path}: {source}")]
    Maintenance {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    BlockLog(#[from] BlockLogError),

    /// Standalone fix-reversible-blocks finished; the process should exit.
    #[error("fixed corrupted reversible blocks database")]
    FixedReversibleDb,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ChainError {
    pub(crate) fn maintenance(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Maintenance {
            path: path.into(),
            source,
        }
    }

    /// Exit code the node process should terminate with.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            ChainError::FixedReversibleDb => EXIT_FIXED_REVERSIBLE,
            ChainError::Ledger(e) if e.is_out_of_memory() => EXIT_BAD_ALLOC,
            _ => EXIT_INIT_FAILURE,
        }
    }
}

/// Errors from the submission pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Attempt to push too many transactions at once: {size} exceeds {max}")]
    BatchTooLarge { size: usize, max: usize },

    /// Memory ran out; emergency shutdown was requested instead of
    /// reporting the ledger error.
    #[error("Emergency shutdown requested: {detail}")]
    ShutdownRequested { detail: String },

    #[error(transparent)]
    Ledger(LedgerError),

    #[error(transparent)]
    Method(#[from] MethodError),
}

/// ABI translation failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AbiError {
    #[error("Unknown action {action}")]
    UnknownAction { action: String },

    /// Arguments do not match the action's struct.
    #[error("'{args}' is invalid args for action '{action}'. expected '{proto}'")]
    InvalidArgs {
        action: String,
        args: Value,
        proto: Value,
    },

    #[error("Invalid binary arguments for action '{action}': {reason}")]
    InvalidBinary { action: String, reason: String },

    #[error("Serialization failed: {0}")]
    Serialize(String),

    #[error("Deserialization failed: {0}")]
    Deserialize(String),
}

/// Per-request API failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("Invalid block ID: {input}")]
    InvalidBlockId { input: String },

    #[error("Could not find block: {block}")]
    UnknownBlock { block: String },

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Invalid packed transaction: {0}")]
    InvalidPackedTransaction(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ApiError {
    /// Stable numeric code reported to RPC clients.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            ApiError::InvalidBlockId { .. } => 3_010_008,
            ApiError::UnknownBlock { .. } => 3_100_002,
            ApiError::Abi(AbiError::UnknownAction { .. }) => 3_015_014,
            ApiError::Abi(AbiError::InvalidArgs { .. } | AbiError::InvalidBinary { .. }) => {
                3_015_015
            }
            ApiError::Abi(AbiError::Serialize(_) | AbiError::Deserialize(_)) => 3_015_000,
            ApiError::InvalidBlock(_) => 3_030_000,
            ApiError::InvalidPackedTransaction(_) => 3_010_003,
            ApiError::InvalidTransaction(_) => 3_010_002,
            ApiError::Submit(SubmitError::BatchTooLarge { .. }) => 3_040_006,
            ApiError::Submit(SubmitError::ShutdownRequested { .. }) => 3_060_001,
            ApiError::Submit(SubmitError::Method(_)) => 3_000_000,
            ApiError::Submit(SubmitError::Ledger(e)) | ApiError::Ledger(e) => ledger_code(e),
        }
    }

    /// JSON error body.
    #[must_use]
    pub fn to_response(&self) -> Value {
        json!({
            "code": self.code(),
            "error": self.to_string(),
        })
    }
}

fn ledger_code(err: &LedgerError) -> u32 {
    match err {
        LedgerError::OutOfMemory { .. } => 3_060_001,
        LedgerError::UnknownBlock { .. } => 3_100_002,
        LedgerError::UnlinkableBlock { .. } => 3_030_001,
        LedgerError::InvalidBlock(_) => 3_030_000,
        LedgerError::InvalidTransaction(_) => 3_040_000,
        LedgerError::DuplicateTransaction { .. } => 3_040_008,
        LedgerError::UnsatisfiedAuthorization { .. } => 3_090_003,
        LedgerError::CheckpointMismatch { .. } => 3_030_002,
        LedgerError::DatabaseDirty(_) | LedgerError::Storage(_) => 3_060_000,
        LedgerError::ReadOnly => 3_080_000,
        LedgerError::NotStarted => 3_000_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ChainError::FixedReversibleDb.exit_code(), 3);
        assert_eq!(
            ChainError::Ledger(LedgerError::OutOfMemory {
                detail: "cache".into()
            })
            .exit_code(),
            1
        );
        assert_eq!(ChainError::Config("bad".into()).exit_code(), -1);
    }

    #[test]
    fn test_invalid_id_and_unknown_block_are_distinct() {
        let invalid = ApiError::InvalidBlockId {
            input: "zz".into(),
        };
        let unknown = ApiError::UnknownBlock {
            block: "99".into(),
        };
        assert_ne!(invalid.code(), unknown.code());
        assert_eq!(invalid.to_response()["error"], "Invalid block ID: zz");
    }

    #[test]
    fn test_invalid_args_message_carries_prototype() {
        let err = AbiError::InvalidArgs {
            action: "transfer".into(),
            args: json!({"to": 1}),
            proto: json!([{"name": "to", "type": "public_key"}]),
        };
        assert_eq!(
            err.to_string(),
            r#"'{"to":1}' is invalid args for action 'transfer'. expected '[{"name":"to","type":"public_key"}]'"#
        );
    }
}
