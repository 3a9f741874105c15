//! # Chain Plugin
//!
//! Coordination layer between the ledger core and the rest of the node.
//!
//! ## Responsibilities
//!
//! - **Lifecycle**: configure, start and stop one ledger core
//!   ([`ChainPlugin`]), including operator maintenance before start.
//! - **Relay**: re-publish the ledger's six signals onto the node bus.
//! - **Providers**: serve block lookup, head queries and block/transaction
//!   sync through the bus method slots.
//! - **Submission**: forward blocks and transactions, escalating memory
//!   exhaustion to an [`EmergencyShutdown`].
//! - **API**: read-only queries and read-write submission for RPC.
//!
//! ## Module Layout
//!
//! ```text
//! container/   options, directories, resolved ChainConfig
//! genesis/     genesis descriptor and chain id
//! lifecycle/   ChainPlugin state machine and maintenance actions
//! wiring/      signal relay and method providers
//! submission/  submission pipeline and emergency shutdown
//! api/         read-only and read-write request handlers
//! ports/       ledger core and ABI codec boundaries
//! adapters/    in-memory ledger and table-driven ABI codec
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod api;
pub mod checkpoints;
pub mod container;
pub mod errors;
pub mod genesis;
pub mod lifecycle;
pub mod ports;
pub mod submission;
pub mod wiring;

#[doc(hidden)]
pub mod test_utils;

pub use adapters::{MemoryLedger, MemoryLedgerFactory, SimpleAbi};
pub use api::{ReadOnlyApi, ReadWriteApi};
pub use checkpoints::CheckpointSet;
pub use container::{ChainConfig, ChainOptions, GenesisTimestamp, NodeDirs};
pub use errors::{AbiError, ApiError, ChainError, SubmitError};
pub use genesis::GenesisState;
pub use lifecycle::{ChainPlugin, LifecycleState, MaintenanceAction};
pub use ports::{AbiSerializer, LedgerCore, LedgerFactory, LedgerSignals};
pub use submission::{EmergencyShutdown, SubmissionPipeline};
pub use wiring::Wiring;
