//! # Submission
//!
//! The block/transaction submission pipeline and the emergency shutdown
//! request it raises on memory exhaustion.

pub mod pipeline;
pub mod shutdown;

pub use pipeline::{check_batch_size, BatchItem, BatchItemResult, SubmissionPipeline, MAX_BATCH_SIZE};
pub use shutdown::EmergencyShutdown;
