//! # Block Log
//!
//! Append-only file of irreversible blocks, one frame per block in height
//! order. Uses the same frame format as the reversible store.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::domain::errors::StoreError;
use crate::domain::record::{encode_frame, scan_frames, ReversibleBlockRecord};

/// Block log file name inside the blocks directory.
pub const BLOCK_LOG_FILE: &str = "blocks.log";

/// Append handle on `blocks.log`.
#[derive(Debug)]
pub struct BlockLog {
    path: PathBuf,
    file: File,
    last: Option<u32>,
}

impl BlockLog {
    /// Open (creating if needed) the log in `blocks_dir` and return every
    /// block it holds.
    ///
    /// An incomplete trailing frame is cut off. Non-contiguous heights or a
    /// bad complete frame are corruption.
    pub fn open(blocks_dir: &Path) -> Result<(Self, Vec<ReversibleBlockRecord>), StoreError> {
        fs::create_dir_all(blocks_dir).map_err(|e| StoreError::io(blocks_dir, e))?;
        let path = blocks_dir.join(BLOCK_LOG_FILE);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let scan = scan_frames(&bytes).map_err(|e| StoreError::Corrupted {
            path: path.clone(),
            reason: format!("bad frame at offset {}: {}", e.offset, e.reason),
        })?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;

        if let Some(offset) = scan.torn_tail {
            warn!(path = %path.display(), offset, "Truncating incomplete block log entry");
            file.set_len(offset as u64)
                .map_err(|e| StoreError::io(&path, e))?;
        }

        for pair in scan.records.windows(2) {
            if pair[0].block_num.checked_add(1) != Some(pair[1].block_num) {
                return Err(StoreError::Corrupted {
                    path,
                    reason: format!(
                        "block {} follows block {}",
                        pair[1].block_num, pair[0].block_num
                    ),
                });
            }
        }

        let last = scan.records.last().map(|r| r.block_num);
        if let Some(last) = last {
            info!(path = %path.display(), last, "Block log opened");
        }
        Ok((Self { path, file, last }, scan.records))
    }

    /// Append the next block.
    pub fn append(&mut self, block_num: u32, packed_block: Vec<u8>) -> Result<(), StoreError> {
        if let Some(last) = self.last {
            if last.checked_add(1) != Some(block_num) {
                return Err(StoreError::Corrupted {
                    path: self.path.clone(),
                    reason: format!("append of block {block_num} after block {last}"),
                });
            }
        }

        let frame = encode_frame(&ReversibleBlockRecord {
            block_num,
            packed_block,
        })
        .map_err(|e| StoreError::Corrupted {
            path: self.path.clone(),
            reason: e,
        })?;
        self.file
            .write_all(&frame)
            .and_then(|()| self.file.flush())
            .map_err(|e| StoreError::io(&self.path, e))?;

        self.last = Some(block_num);
        Ok(())
    }

    #[must_use]
    pub fn last_block_num(&self) -> Option<u32> {
        self.last
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let (mut log, existing) = BlockLog::open(dir.path()).unwrap();
            assert!(existing.is_empty());
            log.append(1, vec![1]).unwrap();
            log.append(2, vec![2]).unwrap();
        }

        let (log, records) = BlockLog::open(dir.path()).unwrap();
        assert_eq!(log.last_block_num(), Some(2));
        let heights: Vec<u32> = records.iter().map(|r| r.block_num).collect();
        assert_eq!(heights, vec![1, 2]);
    }

    #[test]
    fn test_append_rejects_gap() {
        let dir = TempDir::new().unwrap();
        let (mut log, _) = BlockLog::open(dir.path()).unwrap();
        log.append(1, vec![1]).unwrap();
        assert!(matches!(
            log.append(3, vec![3]),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = TempDir::new().unwrap();
        {
            let (mut log, _) = BlockLog::open(dir.path()).unwrap();
            log.append(1, vec![1; 4]).unwrap();
        }
        let path = dir.path().join(BLOCK_LOG_FILE);
        let clean_len = fs::metadata(&path).unwrap().len();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[7, 0]).unwrap();

        let (_log, records) = BlockLog::open(dir.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), clean_len);
    }

    #[test]
    fn test_height_overflow_is_corruption() {
        let dir = TempDir::new().unwrap();
        let mut bytes = Vec::new();
        for block_num in [u32::MAX, 0] {
            bytes.extend(
                encode_frame(&ReversibleBlockRecord {
                    block_num,
                    packed_block: vec![1],
                })
                .unwrap(),
            );
        }
        fs::write(dir.path().join(BLOCK_LOG_FILE), bytes).unwrap();

        assert!(matches!(
            BlockLog::open(dir.path()),
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_append_after_max_height_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut log, _) = BlockLog::open(dir.path()).unwrap();
        log.append(u32::MAX, vec![1]).unwrap();
        assert!(matches!(
            log.append(0, vec![2]),
            Err(StoreError::Corrupted { .. })
        ));
    }
}
