//! # Genesis Module
//!
//! The genesis descriptor bootstraps chain state.
//!
//! ## Configure-time Sequence
//!
//! 1. If the genesis file is missing, write a default descriptor there.
//! 2. Load the descriptor from the file.
//! 3. Apply the timestamp override, snapping `now` to the block interval.
//! 4. Derive the chain id from the encoded descriptor.

pub mod state;

pub use state::{snap_to_block_interval, ChainParameters, GenesisError, GenesisState, BLOCK_INTERVAL_MS};
