//! # Ports
//!
//! Boundaries to the external collaborators: the ledger core and the ABI
//! serialization codec.

pub mod abi;
pub mod ledger;

pub use abi::{AbiSerializer, FieldDef};
pub use ledger::{LedgerCore, LedgerFactory, LedgerSignals};
