//! # Record Format
//!
//! `shared_memory.bin` is a sequence of frames:
//!
//! ```text
//! [len: u32 LE][crc32: u32 LE][payload: bincode(ReversibleBlockRecord)]
//! ```
//!
//! A frame cut short by the end of the file is a torn tail from an
//! interrupted append. A complete frame whose checksum or payload is bad is
//! corruption.

use serde::{Deserialize, Serialize};

use crate::STORE_VERSION;

/// Bytes of the length and checksum prefix.
pub const FRAME_HEADER_LEN: usize = 8;

/// One reversible block keyed by height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversibleBlockRecord {
    pub block_num: u32,
    /// Encoded `SignedBlock` bytes.
    pub packed_block: Vec<u8>,
}

/// Contents of `shared_memory.meta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub version: u32,
    /// Set while a read-write session is open.
    pub dirty: bool,
    /// Cache budget in bytes.
    pub cache_size: u64,
}

impl StoreMeta {
    #[must_use]
    pub fn new(cache_size: u64, dirty: bool) -> Self {
        Self {
            version: STORE_VERSION,
            dirty,
            cache_size,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, String> {
        bincode::serialize(self).map_err(|e| e.to_string())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        bincode::deserialize(bytes).map_err(|e| e.to_string())
    }
}

/// Encode one record as a complete frame.
pub fn encode_frame(record: &ReversibleBlockRecord) -> Result<Vec<u8>, String> {
    let payload = bincode::serialize(record).map_err(|e| e.to_string())?;
    let len = u32::try_from(payload.len()).map_err(|_| "record too large".to_string())?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Outcome of scanning a data file.
#[derive(Debug, Default)]
pub struct FrameScan {
    /// Records in file order; a later frame for a height replaces earlier ones.
    pub records: Vec<ReversibleBlockRecord>,
    /// Offset of an incomplete trailing frame, if any.
    pub torn_tail: Option<usize>,
}

/// A complete frame failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameError {
    pub offset: usize,
    pub reason: String,
}

/// Scan every frame in `bytes`.
pub fn scan_frames(bytes: &[u8]) -> Result<FrameScan, FrameError> {
    let mut scan = FrameScan::default();
    let mut offset = 0;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < FRAME_HEADER_LEN {
            scan.torn_tail = Some(offset);
            break;
        }

        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let crc = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
        if rest.len() - FRAME_HEADER_LEN < len {
            scan.torn_tail = Some(offset);
            break;
        }

        let payload = &rest[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len];
        if crc32fast::hash(payload) != crc {
            return Err(FrameError {
                offset,
                reason: "checksum mismatch".to_string(),
            });
        }

        let record: ReversibleBlockRecord =
            bincode::deserialize(payload).map_err(|e| FrameError {
                offset,
                reason: e.to_string(),
            })?;
        scan.records.push(record);
        offset += FRAME_HEADER_LEN + len;
    }

    Ok(scan)
}
