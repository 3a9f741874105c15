//! # Block Log Repair
//!
//! Hard replay moves the whole blocks directory aside and starts over with a
//! copy of the block log. The reversible store stays behind in the backup,
//! where recovery picks it up.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::block_log::BLOCK_LOG_FILE;
use crate::domain::errors::BlockLogError;
use crate::ports::outbound::{BlockLogRepair, SystemTimeSource, TimeSource};
use crate::service::timestamped_sibling;

/// Files carried over from the backup into the recreated blocks directory.
pub const BLOCK_LOG_FILES: [&str; 2] = [BLOCK_LOG_FILE, "blocks.index"];

/// Filesystem implementation of [`BlockLogRepair`].
pub struct DirectoryBlockLog {
    clock: Arc<dyn TimeSource>,
}

impl Default for DirectoryBlockLog {
    fn default() -> Self {
        Self::new(Arc::new(SystemTimeSource))
    }
}

impl DirectoryBlockLog {
    pub fn new(clock: Arc<dyn TimeSource>) -> Self {
        Self { clock }
    }
}

impl BlockLogRepair for DirectoryBlockLog {
    fn repair_log(&self, blocks_dir: &Path) -> Result<PathBuf, BlockLogError> {
        if !blocks_dir.is_dir() {
            return Err(BlockLogError::Missing {
                path: blocks_dir.to_path_buf(),
            });
        }
        let current =
            fs::canonicalize(blocks_dir).map_err(|e| BlockLogError::io(blocks_dir, e))?;
        let backup = timestamped_sibling(&current, self.clock.now()).ok_or_else(|| {
            BlockLogError::InvalidPath {
                path: current.clone(),
            }
        })?;
        if backup.exists() {
            return Err(BlockLogError::BackupExists { path: backup });
        }

        fs::rename(&current, &backup).map_err(|e| BlockLogError::io(&current, e))?;
        fs::create_dir_all(&current).map_err(|e| BlockLogError::io(&current, e))?;
        info!(backup = %backup.display(), "Moved blocks directory to backup location");

        for name in BLOCK_LOG_FILES {
            let source = backup.join(name);
            if !source.exists() {
                debug!(file = name, "Block log file missing from backup, skipped");
                continue;
            }
            let target = current.join(name);
            fs::copy(&source, &target).map_err(|e| BlockLogError::io(&target, e))?;
        }

        info!(blocks_dir = %current.display(), "Block log restored from backup");
        Ok(backup)
    }
}
