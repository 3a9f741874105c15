//! # Block Storage - Reversible Block Store
//!
//! Directory-backed side store for blocks that were accepted but are not yet
//! irreversible, and the protocol that repairs it after an unclean shutdown.
//!
//! ## Layout
//!
//! ```text
//! blocks/
//! ├── blocks.log              append-only block log (external)
//! ├── blocks.index
//! └── reversible/
//!     ├── shared_memory.meta  version + dirty flag + cache budget
//!     ├── shared_memory.bin   framed records, ascending append
//!     └── LOCK                held while open read-write
//! blocks/reversible-2026-10-18T09:15:02.123/   backup left by recovery
//! ```
//!
//! ## Crash Semantics
//!
//! Opening read-write sets the dirty flag durably; only a clean close clears
//! it. A read-only open of a dirty store fails with a recoverable
//! [`StoreError`], which is the trigger for [`ReversibleRecovery`].

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::block_log::{BlockLog, BLOCK_LOG_FILE};
pub use adapters::store::{ReversibleStore, DATA_FILE, META_FILE};
pub use domain::errors::{BlockLogError, RecoveryError, StoreError};
pub use domain::record::{encode_frame, ReversibleBlockRecord, StoreMeta};
pub use ports::outbound::{BlockLogRepair, FixedTimeSource, SystemTimeSource, TimeSource};
pub use service::block_log::{DirectoryBlockLog, BLOCK_LOG_FILES};
pub use service::recovery::{RecoveryReport, ReversibleRecovery};

/// Name of the reversible store directory inside the blocks directory.
pub const REVERSIBLE_BLOCKS_DIR_NAME: &str = "reversible";

/// Default reversible cache budget (340 MiB).
pub const DEFAULT_REVERSIBLE_CACHE_SIZE: u64 = 340 * 1024 * 1024;

/// On-disk format version written to the meta file.
pub const STORE_VERSION: u32 = 1;
