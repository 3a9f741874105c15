//! # Reversible Store
//!
//! Directory-backed map from block height to encoded block bytes.
//!
//! ## Sessions
//!
//! - **Read-write**: takes the directory lock, persists the dirty flag before
//!   anything else, appends one frame per insert, and clears the flag on a
//!   clean close (explicit or on drop).
//! - **Read-only**: validates the store and never writes to it.
//! - **Unchecked**: reads whatever complete frames a backup holds, ignoring
//!   the dirty flag. Used only by recovery.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::adapters::lock::DirectoryLock;
use crate::domain::errors::StoreError;
use crate::domain::record::{encode_frame, scan_frames, ReversibleBlockRecord, StoreMeta};
use crate::STORE_VERSION;

/// Meta file name (version, dirty flag, cache budget).
pub const META_FILE: &str = "shared_memory.meta";

/// Data file name (framed records).
pub const DATA_FILE: &str = "shared_memory.bin";

/// Side store of reversible blocks.
#[derive(Debug)]
pub struct ReversibleStore {
    dir: PathBuf,
    writable: bool,
    cache_size: u64,
    used: u64,
    records: BTreeMap<u32, Vec<u8>>,
    data: Option<File>,
    lock: Option<DirectoryLock>,
    closed: bool,
}

impl ReversibleStore {
    /// Open an existing store for reading, validating it.
    ///
    /// # Errors
    ///
    /// - `Missing` if there is no store at `dir`
    /// - `Dirty` if the last read-write session did not close
    /// - `Corrupted` if the meta file or any frame is bad
    pub fn open_read_only(dir: &Path) -> Result<Self, StoreError> {
        if !dir.is_dir() {
            return Err(StoreError::Missing {
                path: dir.to_path_buf(),
            });
        }
        let meta = read_meta(dir)?.ok_or_else(|| StoreError::Missing {
            path: dir.to_path_buf(),
        })?;
        check_version(dir, &meta)?;
        if meta.dirty {
            return Err(StoreError::Dirty {
                path: dir.to_path_buf(),
            });
        }

        let records = load_records(dir, false)?;
        Ok(Self::from_records(dir, false, meta.cache_size, records))
    }

    /// Open a backup for reading without validating the dirty flag.
    ///
    /// A truncated trailing frame ends the scan. Any complete frame that
    /// fails validation is still an error.
    pub fn open_unchecked(dir: &Path) -> Result<Self, StoreError> {
        if !dir.is_dir() {
            return Err(StoreError::Missing {
                path: dir.to_path_buf(),
            });
        }
        let cache_size = match read_meta(dir) {
            Ok(Some(meta)) => {
                check_version(dir, &meta)?;
                meta.cache_size
            }
            Ok(None) => 0,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Ignoring unreadable meta file");
                0
            }
        };

        let records = load_records(dir, true)?;
        Ok(Self::from_records(dir, false, cache_size, records))
    }

    /// Open (creating if needed) a store for reading and writing.
    ///
    /// The dirty flag is persisted before this returns.
    ///
    /// # Errors
    ///
    /// `Locked` if another session holds the directory, `Dirty` if the
    /// previous session did not close cleanly.
    pub fn open_read_write(dir: &Path, cache_size: u64) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        let lock = DirectoryLock::acquire(dir)?;

        if let Some(meta) = read_meta(dir)? {
            check_version(dir, &meta)?;
            if meta.dirty {
                return Err(StoreError::Dirty {
                    path: dir.to_path_buf(),
                });
            }
        }

        let records = load_records(dir, false)?;
        write_meta(dir, &StoreMeta::new(cache_size, true))?;

        let data_path = dir.join(DATA_FILE);
        let data = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&data_path)
            .map_err(|e| StoreError::io(&data_path, e))?;

        let mut store = Self::from_records(dir, true, cache_size, records);
        store.data = Some(data);
        store.lock = Some(lock);

        info!(
            path = %dir.display(),
            blocks = store.len(),
            cache_size,
            "Reversible store opened read-write"
        );
        Ok(store)
    }

    fn from_records(
        dir: &Path,
        writable: bool,
        cache_size: u64,
        records: BTreeMap<u32, Vec<u8>>,
    ) -> Self {
        let used = records.values().map(|b| b.len() as u64).sum();
        Self {
            dir: dir.to_path_buf(),
            writable,
            cache_size,
            used,
            records,
            data: None,
            lock: None,
            closed: false,
        }
    }

    /// Store `packed_block` at `block_num`, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// `CacheExhausted` if the budget would be exceeded; nothing is written.
    pub fn insert(&mut self, block_num: u32, packed_block: Vec<u8>) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::ReadOnly);
        }

        let requested = packed_block.len() as u64;
        let replaced = self.records.get(&block_num).map_or(0, |b| b.len() as u64);
        let new_used = self.used - replaced + requested;
        if new_used > self.cache_size {
            return Err(StoreError::CacheExhausted {
                used: self.used,
                requested,
                capacity: self.cache_size,
            });
        }

        let record = ReversibleBlockRecord {
            block_num,
            packed_block,
        };
        let data_path = self.dir.join(DATA_FILE);
        let frame = encode_frame(&record)
            .map_err(|e| StoreError::io(&data_path, io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let data = self.data.as_mut().ok_or(StoreError::ReadOnly)?;
        data.write_all(&frame)
            .and_then(|()| data.flush())
            .map_err(|e| StoreError::io(&data_path, e))?;

        self.records.insert(block_num, record.packed_block);
        self.used = new_used;
        Ok(())
    }

    /// Drop every record at or below `block_num` and compact the data file.
    ///
    /// # Returns
    ///
    /// The number of records removed.
    pub fn remove_through(&mut self, block_num: u32) -> Result<usize, StoreError> {
        if !self.writable {
            return Err(StoreError::ReadOnly);
        }

        let kept = match block_num.checked_add(1) {
            Some(first_kept) => self.records.split_off(&first_kept),
            None => BTreeMap::new(),
        };
        let removed = self.records.len();
        self.records = kept;
        if removed == 0 {
            return Ok(0);
        }

        self.used = self.records.values().map(|b| b.len() as u64).sum();
        self.rewrite()?;
        debug!(through = block_num, removed, "Pruned reversible records");
        Ok(removed)
    }

    /// Rewrite the data file with only the live records.
    fn rewrite(&mut self) -> Result<(), StoreError> {
        let data_path = self.dir.join(DATA_FILE);
        let temp_path = self.dir.join(format!("{DATA_FILE}.tmp"));

        let mut bytes = Vec::new();
        for (&block_num, packed_block) in &self.records {
            let frame = encode_frame(&ReversibleBlockRecord {
                block_num,
                packed_block: packed_block.clone(),
            })
            .map_err(|e| {
                StoreError::io(&data_path, io::Error::new(io::ErrorKind::InvalidData, e))
            })?;
            bytes.extend_from_slice(&frame);
        }

        write_atomic(&temp_path, &data_path, &bytes)?;

        self.data = Some(
            OpenOptions::new()
                .append(true)
                .open(&data_path)
                .map_err(|e| StoreError::io(&data_path, e))?,
        );
        Ok(())
    }

    /// Encoded block at `block_num`.
    #[must_use]
    pub fn get(&self, block_num: u32) -> Option<&[u8]> {
        self.records.get(&block_num).map(Vec::as_slice)
    }

    /// Records in ascending height order.
    pub fn records(&self) -> impl Iterator<Item = (u32, &[u8])> + '_ {
        self.records.iter().map(|(&n, b)| (n, b.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn first_block_num(&self) -> Option<u32> {
        self.records.keys().next().copied()
    }

    #[must_use]
    pub fn last_block_num(&self) -> Option<u32> {
        self.records.keys().next_back().copied()
    }

    /// Bytes of encoded blocks currently held.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.used
    }

    #[must_use]
    pub fn cache_size(&self) -> u64 {
        self.cache_size
    }

    #[must_use]
    pub fn remaining_capacity(&self) -> u64 {
        self.cache_size.saturating_sub(self.used)
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Flush, clear the dirty flag and release the lock.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), StoreError> {
        if self.closed || !self.writable {
            return Ok(());
        }
        self.closed = true;

        if let Some(data) = self.data.take() {
            data.sync_all()
                .map_err(|e| StoreError::io(self.dir.join(DATA_FILE), e))?;
        }
        write_meta(&self.dir, &StoreMeta::new(self.cache_size, false))?;
        self.lock = None;

        info!(path = %self.dir.display(), blocks = self.records.len(), "Reversible store closed cleanly");
        Ok(())
    }
}

impl Drop for ReversibleStore {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            error!(path = %self.dir.display(), error = %e, "Failed to close reversible store");
        }
    }
}

fn check_version(dir: &Path, meta: &StoreMeta) -> Result<(), StoreError> {
    if meta.version != STORE_VERSION {
        return Err(StoreError::UnsupportedVersion {
            path: dir.to_path_buf(),
            found: meta.version,
        });
    }
    Ok(())
}

fn read_meta(dir: &Path) -> Result<Option<StoreMeta>, StoreError> {
    let path = dir.join(META_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(&path, e)),
    };
    StoreMeta::decode(&bytes)
        .map(Some)
        .map_err(|reason| StoreError::Corrupted {
            path: dir.to_path_buf(),
            reason: format!("unreadable meta file: {reason}"),
        })
}

fn write_meta(dir: &Path, meta: &StoreMeta) -> Result<(), StoreError> {
    let path = dir.join(META_FILE);
    let bytes = meta
        .encode()
        .map_err(|e| StoreError::io(&path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
    write_atomic(&dir.join(format!("{META_FILE}.tmp")), &path, &bytes)
}

/// Write via temp file + fsync + rename.
fn write_atomic(temp_path: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut file = File::create(temp_path).map_err(|e| StoreError::io(temp_path, e))?;
    file.write_all(bytes)
        .and_then(|()| file.sync_all())
        .map_err(|e| StoreError::io(temp_path, e))?;
    fs::rename(temp_path, path).map_err(|e| StoreError::io(path, e))
}

fn load_records(dir: &Path, tolerate_torn_tail: bool) -> Result<BTreeMap<u32, Vec<u8>>, StoreError> {
    let path = dir.join(DATA_FILE);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(StoreError::io(&path, e)),
    };

    let scan = scan_frames(&bytes).map_err(|e| StoreError::Corrupted {
        path: dir.to_path_buf(),
        reason: format!("bad frame at offset {}: {}", e.offset, e.reason),
    })?;

    if let Some(offset) = scan.torn_tail {
        if !tolerate_torn_tail {
            return Err(StoreError::Corrupted {
                path: dir.to_path_buf(),
                reason: format!("incomplete trailing frame at offset {offset}"),
            });
        }
        warn!(path = %path.display(), offset, "Stopped at incomplete trailing frame");
    }

    Ok(scan
        .records
        .into_iter()
        .map(|r| (r.block_num, r.packed_block))
        .collect())
}
