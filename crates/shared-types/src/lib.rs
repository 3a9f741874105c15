//! # Shared Types Crate
//!
//! Chain entities exchanged between the ledger core, the event channels and
//! the method slots of the node.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a component
//!   boundary is defined here.
//! - **Immutable Payloads**: channel payloads are shared behind `Arc` and
//!   never mutated after publication.
//! - **Self-Describing Ids**: a block id carries its height in the leading
//!   four bytes.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
