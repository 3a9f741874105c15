//! # Adapters
//!
//! Development implementations of the ledger-core and ABI ports.

pub mod memory_ledger;
pub mod simple_abi;

pub use memory_ledger::{MemoryLedger, MemoryLedgerFactory, DEFAULT_IRREVERSIBILITY_DISTANCE};
pub use simple_abi::SimpleAbi;
