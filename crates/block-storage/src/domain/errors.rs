//! # Block Storage Errors
//!
//! Error types for the reversible store, its recovery protocol and the
//! block-log repair step.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures opening or mutating the reversible store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The dirty flag is set: the last read-write session never closed.
    #[error("Reversible store at {path} was not closed cleanly (dirty flag set)")]
    Dirty { path: PathBuf },

    /// The meta file or a complete record frame failed validation.
    #[error("Reversible store at {path} is corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// No store exists at the given location.
    #[error("Reversible store not found at {path}")]
    Missing { path: PathBuf },

    /// The meta file names a format this build does not read.
    #[error("Reversible store at {path} has unsupported version {found}")]
    UnsupportedVersion { path: PathBuf, found: u32 },

    /// Another process holds the store open read-write.
    #[error("Reversible store at {path} is locked by another process")]
    Locked { path: PathBuf },

    /// Inserting would exceed the configured cache budget.
    #[error("Reversible cache exhausted: {used} of {capacity} bytes in use, {requested} more requested")]
    CacheExhausted {
        used: u64,
        requested: u64,
        capacity: u64,
    },

    /// Mutation attempted on a store opened read-only.
    #[error("Reversible store opened read-only")]
    ReadOnly,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the dirty/corrupted class that recovery can repair.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::Dirty { .. } | StoreError::Corrupted { .. })
    }

    /// True when the failure is the cache budget running out.
    #[must_use]
    pub fn is_cache_exhausted(&self) -> bool {
        matches!(self, StoreError::CacheExhausted { .. })
    }
}

/// Failures of the reversible store recovery protocol.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// Backed-up records are not contiguous.
    #[error("Gap in the reversible block database: expected block {expected}, found block {found}")]
    Gap { expected: u32, found: u32 },

    /// A backed-up record does not decode as a block.
    #[error("Malformed block #{block_num} in the reversible block database: {reason}")]
    MalformedRecord { block_num: u32, reason: String },

    /// The timestamped backup name is taken.
    #[error("Cannot move reversible database to {path}: a backup with that name already exists")]
    BackupExists { path: PathBuf },

    /// The store location has no usable final path component.
    #[error("Invalid reversible database path: {path}")]
    InvalidPath { path: PathBuf },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RecoveryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures backing up and recreating the block-log directory.
#[derive(Debug, Error)]
pub enum BlockLogError {
    #[error("Block log directory not found: {path}")]
    Missing { path: PathBuf },

    #[error("Cannot move blocks directory to {path}: a backup with that name already exists")]
    BackupExists { path: PathBuf },

    #[error("Invalid blocks directory path: {path}")]
    InvalidPath { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BlockLogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let dirty = StoreError::Dirty {
            path: PathBuf::from("/tmp/r"),
        };
        let corrupted = StoreError::Corrupted {
            path: PathBuf::from("/tmp/r"),
            reason: "bad frame".into(),
        };
        let missing = StoreError::Missing {
            path: PathBuf::from("/tmp/r"),
        };
        let io = StoreError::io("/tmp/r", io::Error::other("disk"));

        assert!(dirty.is_recoverable());
        assert!(corrupted.is_recoverable());
        assert!(!missing.is_recoverable());
        assert!(!io.is_recoverable());
        assert!(!StoreError::ReadOnly.is_recoverable());
    }

    #[test]
    fn test_gap_display() {
        let err = RecoveryError::Gap {
            expected: 6,
            found: 7,
        };
        assert_eq!(
            err.to_string(),
            "Gap in the reversible block database: expected block 6, found block 7"
        );
    }
}
