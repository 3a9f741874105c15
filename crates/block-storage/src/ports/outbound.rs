//! # Outbound Ports
//!
//! Dependencies the storage services call out to: a clock for backup names
//! and the block-log repair step used by hard replay.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::errors::BlockLogError;

/// Abstract interface for wall-clock time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Default time source using system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant, for deterministic backup names.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub DateTime<Utc>);

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Backs up a blocks directory and rebuilds a usable block log in place.
pub trait BlockLogRepair: Send + Sync {
    /// Move `blocks_dir` aside, recreate it with a repaired log, and return
    /// the backup location.
    fn repair_log(&self, blocks_dir: &Path) -> Result<PathBuf, BlockLogError>;
}
