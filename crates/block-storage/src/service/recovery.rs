//! # Reversible Store Recovery
//!
//! Rebuilds a reversible store that failed validation.
//!
//! ## Protocol
//!
//! 1. Open the store read-only. If that succeeds nothing was wrong: report
//!    "not recovered" and leave the directory untouched.
//! 2. Move the damaged directory to `<name>-<timestamp>` (or, with an
//!    explicit destination, treat the current location as the backup).
//! 3. Read every complete record from the backup, requiring consecutive
//!    heights and decoding and re-encoding each block.
//! 4. Only when every record passed, write them to a fresh store.
//!
//! Any failure in step 3 leaves the fresh store empty.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shared_types::SignedBlock;
use tracing::{info, warn};

use crate::adapters::store::ReversibleStore;
use crate::domain::errors::{RecoveryError, StoreError};
use crate::ports::outbound::{SystemTimeSource, TimeSource};
use crate::service::timestamped_sibling;
use crate::DEFAULT_REVERSIBLE_CACHE_SIZE;

/// Outcome of a recovery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// False when the store validated and was left alone.
    pub recovered: bool,
    /// Number of blocks written to the fresh store.
    pub count: u32,
    /// First recovered height.
    pub start: Option<u32>,
    /// Last recovered height.
    pub end: Option<u32>,
    /// Location of the fresh store.
    pub store_dir: PathBuf,
    /// Where the damaged store was left.
    pub backup_dir: Option<PathBuf>,
}

impl RecoveryReport {
    fn untouched(store_dir: &Path) -> Self {
        Self {
            recovered: false,
            count: 0,
            start: None,
            end: None,
            store_dir: store_dir.to_path_buf(),
            backup_dir: None,
        }
    }

    /// One-line description for the operator log.
    #[must_use]
    pub fn summary(&self) -> String {
        if !self.recovered {
            return "Reversible block database was not corrupted".to_string();
        }
        match (self.count, self.start, self.end) {
            (0, _, _) => {
                "There were no recoverable blocks in the reversible block database".to_string()
            }
            (1, Some(start), _) => {
                format!("Recovered 1 block from reversible block database: block {start}")
            }
            (n, Some(start), Some(end)) => format!(
                "Recovered {n} blocks from reversible block database: blocks {start} to {end}"
            ),
            (n, _, _) => format!("Recovered {n} blocks from reversible block database"),
        }
    }
}

/// Reversible store recovery service.
pub struct ReversibleRecovery {
    clock: Arc<dyn TimeSource>,
    cache_size: u64,
}

impl Default for ReversibleRecovery {
    fn default() -> Self {
        Self::new(Arc::new(SystemTimeSource), DEFAULT_REVERSIBLE_CACHE_SIZE)
    }
}

impl ReversibleRecovery {
    pub fn new(clock: Arc<dyn TimeSource>, cache_size: u64) -> Self {
        Self { clock, cache_size }
    }

    /// Validate the store at `db_dir` and rebuild it if it is dirty or
    /// corrupted.
    ///
    /// With `new_db_dir`, the store at `db_dir` is left in place as the
    /// backup and the fresh store is created at `new_db_dir`.
    ///
    /// # Errors
    ///
    /// - fatal store errors (missing directory, I/O, unsupported version)
    /// - `BackupExists` before anything is moved
    /// - `Gap` / `MalformedRecord` after the move, with the fresh store empty
    pub fn recover(
        &self,
        db_dir: &Path,
        new_db_dir: Option<&Path>,
    ) -> Result<RecoveryReport, RecoveryError> {
        match ReversibleStore::open_read_only(db_dir) {
            Ok(_) => {
                info!(path = %db_dir.display(), "Reversible block database validated");
                return Ok(RecoveryReport::untouched(new_db_dir.unwrap_or(db_dir)));
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Reversible block database needs recovery");
            }
            Err(e) => return Err(e.into()),
        }

        let current =
            fs::canonicalize(db_dir).map_err(|e| RecoveryError::io(db_dir, e))?;

        let (store_dir, backup_dir) = match new_db_dir {
            Some(new_dir) => (new_dir.to_path_buf(), current),
            None => {
                let backup = timestamped_sibling(&current, self.clock.now())
                    .ok_or_else(|| RecoveryError::InvalidPath {
                        path: current.clone(),
                    })?;
                if backup.exists() {
                    return Err(RecoveryError::BackupExists { path: backup });
                }
                fs::rename(&current, &backup).map_err(|e| RecoveryError::io(&current, e))?;
                info!(
                    backup = %backup.display(),
                    "Moved existing reversible directory to backup location"
                );
                (current, backup)
            }
        };

        fs::create_dir_all(&store_dir).map_err(|e| RecoveryError::io(&store_dir, e))?;
        info!(
            backup = %backup_dir.display(),
            "Reconstructing reversible block database from backup"
        );

        let backup = ReversibleStore::open_unchecked(&backup_dir)?;
        let mut fresh = ReversibleStore::open_read_write(&store_dir, self.cache_size)?;

        let blocks = collect_contiguous(&backup)?;
        let total: u64 = blocks.iter().map(|(_, b)| b.len() as u64).sum();
        if total > fresh.remaining_capacity() {
            return Err(StoreError::CacheExhausted {
                used: fresh.used_bytes(),
                requested: total,
                capacity: fresh.cache_size(),
            }
            .into());
        }

        let count = blocks.len() as u32;
        let start = blocks.first().map(|(n, _)| *n);
        let end = blocks.last().map(|(n, _)| *n);
        for (block_num, packed) in blocks {
            fresh.insert(block_num, packed)?;
        }
        fresh.close()?;

        let report = RecoveryReport {
            recovered: true,
            count,
            start,
            end,
            store_dir,
            backup_dir: Some(backup_dir),
        };
        info!("{}", report.summary());
        Ok(report)
    }
}

/// Validate every backed-up record and re-encode it.
fn collect_contiguous(backup: &ReversibleStore) -> Result<Vec<(u32, Vec<u8>)>, RecoveryError> {
    let mut blocks: Vec<(u32, Vec<u8>)> = Vec::with_capacity(backup.len());

    for (block_num, bytes) in backup.records() {
        if let Some((last, _)) = blocks.last() {
            let expected = last.saturating_add(1);
            if block_num != expected {
                return Err(RecoveryError::Gap {
                    expected,
                    found: block_num,
                });
            }
        }

        let block = SignedBlock::decode(bytes).map_err(|e| RecoveryError::MalformedRecord {
            block_num,
            reason: e.to_string(),
        })?;
        if block.block_num() != block_num {
            return Err(RecoveryError::MalformedRecord {
                block_num,
                reason: format!("record holds block #{}", block.block_num()),
            });
        }
        let packed = block.encode().map_err(|e| RecoveryError::MalformedRecord {
            block_num,
            reason: e.to_string(),
        })?;
        blocks.push((block_num, packed));
    }

    Ok(blocks)
}
