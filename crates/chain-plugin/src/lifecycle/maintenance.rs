//! # Pre-Start Maintenance
//!
//! Operator-requested actions run once during configure, before the ledger
//! core is created. At most one action runs; precedence is decided by
//! [`ChainOptions::maintenance`](crate::container::ChainOptions::maintenance).
//!
//! | action | effect |
//! |---|---|
//! | `DeleteAll` | remove the state and blocks directories |
//! | `HardReplay` | remove state, repair the block log, recover or restore the reversible store from the backup |
//! | `Replay` | remove state, optionally recover the reversible store in place |
//! | `FixReversible` | recover the reversible store in place, then stop the process |

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use block_storage::{
    BlockLogRepair, ReversibleRecovery, TimeSource, DATA_FILE, META_FILE,
    REVERSIBLE_BLOCKS_DIR_NAME,
};
use tracing::{info, warn};

use crate::container::ChainConfig;
use crate::errors::ChainError;

/// A pre-start maintenance action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceAction {
    DeleteAll,
    HardReplay { fix_reversible: bool },
    Replay { fix_reversible: bool },
    /// Recover and exit with the "fixed" status.
    FixReversible,
}

impl fmt::Display for MaintenanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MaintenanceAction::DeleteAll => "delete-all-blocks",
            MaintenanceAction::HardReplay { .. } => "hard-replay-blockchain",
            MaintenanceAction::Replay { .. } => "replay-blockchain",
            MaintenanceAction::FixReversible => "fix-reversible-blocks",
        };
        f.write_str(name)
    }
}

/// Runs maintenance actions against a resolved configuration.
pub struct Maintenance<'a> {
    config: &'a ChainConfig,
    block_log: &'a dyn BlockLogRepair,
    recovery: ReversibleRecovery,
}

impl<'a> Maintenance<'a> {
    pub fn new(
        config: &'a ChainConfig,
        block_log: &'a dyn BlockLogRepair,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            block_log,
            recovery: ReversibleRecovery::new(clock, config.reversible_cache_size),
        }
    }

    /// Run `action`.
    ///
    /// # Errors
    ///
    /// `ChainError::FixedReversibleDb` after a standalone fix, whether or not
    /// anything was repaired; any filesystem, repair or recovery failure
    /// otherwise.
    pub fn run(&self, action: MaintenanceAction) -> Result<(), ChainError> {
        info!(%action, "Running maintenance action");
        match action {
            MaintenanceAction::DeleteAll => self.delete_all(),
            MaintenanceAction::HardReplay { fix_reversible } => self.hard_replay(fix_reversible),
            MaintenanceAction::Replay { fix_reversible } => self.replay(fix_reversible),
            MaintenanceAction::FixReversible => self.fix_reversible(),
        }
    }

    fn delete_all(&self) -> Result<(), ChainError> {
        info!("Deleting state database and blocks");
        remove_dir_all_if_exists(&self.config.state_dir)?;
        remove_dir_all_if_exists(&self.config.blocks_dir)
    }

    fn hard_replay(&self, fix_reversible: bool) -> Result<(), ChainError> {
        info!("Hard replay requested: deleting state database");
        remove_dir_all_if_exists(&self.config.state_dir)?;

        let backup_dir = self.block_log.repair_log(&self.config.blocks_dir)?;
        let backup_reversible = backup_dir.join(REVERSIBLE_BLOCKS_DIR_NAME);
        if !backup_reversible.exists() && !fix_reversible {
            info!("No reversible block database in the backup; skipping recovery");
            return Ok(());
        }

        let report = self
            .recovery
            .recover(&backup_reversible, Some(&self.config.reversible_dir))?;
        if !report.recovered {
            info!("Reversible blocks database was not corrupted. Copying from backup to blocks directory.");
            let target = &self.config.reversible_dir;
            fs::create_dir_all(target).map_err(|e| ChainError::maintenance(target, e))?;
            for name in [DATA_FILE, META_FILE] {
                let from = backup_reversible.join(name);
                let to = target.join(name);
                match fs::copy(&from, &to) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        warn!(file = %from.display(), "Backup file missing; not copied");
                    }
                    Err(e) => return Err(ChainError::maintenance(from, e)),
                }
            }
        }
        Ok(())
    }

    fn replay(&self, fix_reversible: bool) -> Result<(), ChainError> {
        info!("Replay requested: deleting state database");
        remove_dir_all_if_exists(&self.config.state_dir)?;
        if fix_reversible {
            let report = self.recovery.recover(&self.config.reversible_dir, None)?;
            if !report.recovered {
                info!("Reversible blocks database was not corrupted.");
            }
        }
        Ok(())
    }

    fn fix_reversible(&self) -> Result<(), ChainError> {
        let report = self.recovery.recover(&self.config.reversible_dir, None)?;
        if report.recovered {
            info!("Exiting after fixing reversible blocks database...");
        } else {
            info!("Reversible blocks database verified to not be corrupted. Now exiting...");
        }
        Err(ChainError::FixedReversibleDb)
    }
}

fn remove_dir_all_if_exists(path: &Path) -> Result<(), ChainError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ChainError::maintenance(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ChainOptions, NodeDirs};
    use block_storage::{
        encode_frame, DirectoryBlockLog, FixedTimeSource, ReversibleBlockRecord, ReversibleStore,
        StoreMeta, BLOCK_LOG_FILE,
    };
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use crate::test_utils::{make_chain, make_genesis_block};

    fn clock() -> Arc<dyn TimeSource> {
        Arc::new(FixedTimeSource(
            Utc.with_ymd_and_hms(2026, 10, 18, 12, 30, 0).unwrap(),
        ))
    }

    fn config(dir: &TempDir) -> ChainConfig {
        let dirs = NodeDirs::new(dir.path().join("data"), dir.path().join("config"));
        ChainConfig::resolve(&ChainOptions::default(), &dirs).unwrap()
    }

    /// A reversible store whose last session never closed.
    fn write_dirty_store(dir: &Path, heights: &[u32]) {
        fs::create_dir_all(dir).unwrap();
        let meta = StoreMeta::new(1024 * 1024, true);
        fs::write(dir.join(META_FILE), meta.encode().unwrap()).unwrap();

        let blocks = make_chain(&make_genesis_block(), 8);
        let mut data = Vec::new();
        for height in heights {
            let block = &blocks[*height as usize - 2];
            data.extend(
                encode_frame(&ReversibleBlockRecord {
                    block_num: *height,
                    packed_block: block.encode().unwrap(),
                })
                .unwrap(),
            );
        }
        fs::write(dir.join(DATA_FILE), data).unwrap();
    }

    #[test]
    fn test_delete_all_removes_state_and_blocks() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        fs::create_dir_all(&cfg.state_dir).unwrap();
        fs::create_dir_all(&cfg.reversible_dir).unwrap();
        let block_log = DirectoryBlockLog::new(clock());

        Maintenance::new(&cfg, &block_log, clock())
            .run(MaintenanceAction::DeleteAll)
            .unwrap();

        assert!(!cfg.state_dir.exists());
        assert!(!cfg.blocks_dir.exists());
    }

    #[test]
    fn test_replay_keeps_blocks() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        fs::create_dir_all(&cfg.state_dir).unwrap();
        write_dirty_store(&cfg.reversible_dir, &[2, 3]);
        let block_log = DirectoryBlockLog::new(clock());

        Maintenance::new(&cfg, &block_log, clock())
            .run(MaintenanceAction::Replay {
                fix_reversible: false,
            })
            .unwrap();

        assert!(!cfg.state_dir.exists());
        assert!(cfg.reversible_dir.join(DATA_FILE).exists());
    }

    #[test]
    fn test_fix_reversible_always_reports_fixed() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        write_dirty_store(&cfg.reversible_dir, &[2, 3, 4]);
        let block_log = DirectoryBlockLog::new(clock());
        let maintenance = Maintenance::new(&cfg, &block_log, clock());

        let err = maintenance.run(MaintenanceAction::FixReversible).unwrap_err();
        assert!(matches!(err, ChainError::FixedReversibleDb));
        let store = ReversibleStore::open_read_only(&cfg.reversible_dir).unwrap();
        assert_eq!(store.records().map(|(n, _)| n).collect::<Vec<_>>(), vec![2, 3, 4]);
        drop(store);

        // Clean now, but the outcome is the same.
        let err = maintenance.run(MaintenanceAction::FixReversible).unwrap_err();
        assert_eq!(err.exit_code(), crate::errors::EXIT_FIXED_REVERSIBLE);
    }

    #[test]
    fn test_hard_replay_recovers_from_backup() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        fs::create_dir_all(&cfg.state_dir).unwrap();
        write_dirty_store(&cfg.reversible_dir, &[5, 6, 7]);
        fs::write(cfg.blocks_dir.join(BLOCK_LOG_FILE), b"").unwrap();
        let block_log = DirectoryBlockLog::new(clock());

        Maintenance::new(&cfg, &block_log, clock())
            .run(MaintenanceAction::HardReplay {
                fix_reversible: false,
            })
            .unwrap();

        assert!(!cfg.state_dir.exists());
        assert!(cfg.blocks_dir.join(BLOCK_LOG_FILE).exists());
        let store = ReversibleStore::open_read_only(&cfg.reversible_dir).unwrap();
        assert_eq!(store.records().map(|(n, _)| n).collect::<Vec<_>>(), vec![5, 6, 7]);
    }

    #[test]
    fn test_hard_replay_copies_clean_store() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        {
            let mut store = ReversibleStore::open_read_write(&cfg.reversible_dir, 1024 * 1024).unwrap();
            let block = make_chain(&make_genesis_block(), 1).remove(0);
            store.insert(2, block.encode().unwrap()).unwrap();
        }
        let before = fs::read(cfg.reversible_dir.join(DATA_FILE)).unwrap();
        let block_log = DirectoryBlockLog::new(clock());

        Maintenance::new(&cfg, &block_log, clock())
            .run(MaintenanceAction::HardReplay {
                fix_reversible: false,
            })
            .unwrap();

        assert_eq!(fs::read(cfg.reversible_dir.join(DATA_FILE)).unwrap(), before);
        assert!(ReversibleStore::open_read_only(&cfg.reversible_dir).is_ok());
    }

    #[test]
    fn test_hard_replay_without_reversible_backup() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        fs::create_dir_all(&cfg.blocks_dir).unwrap();
        let block_log = DirectoryBlockLog::new(clock());

        Maintenance::new(&cfg, &block_log, clock())
            .run(MaintenanceAction::HardReplay {
                fix_reversible: false,
            })
            .unwrap();

        assert!(cfg.blocks_dir.is_dir());
        assert!(!cfg.reversible_dir.exists());
    }
}
