//! Filesystem adapters.

pub mod block_log;
pub mod lock;
pub mod store;
