//! # Container Module
//!
//! Configuration surface of the chain plugin and its resolution into the
//! form the ledger core consumes.

pub mod config;

pub use config::{ChainConfig, ChainOptions, GenesisTimestamp, NodeDirs, DEFAULT_STATE_DIR_NAME};
