//! Domain types: store records, frame codec and errors.

pub mod errors;
pub mod record;
