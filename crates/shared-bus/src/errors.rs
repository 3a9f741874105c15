//! # Bus Errors

use thiserror::Error;

/// Error type subscriber callbacks may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by channel publication.
#[derive(Debug, Error)]
pub enum BusError {
    /// A subscriber callback failed; delivery to later subscribers was
    /// aborted for this publish call.
    #[error("Subscriber #{position} of channel '{channel}' failed: {source}")]
    SubscriberFailed {
        channel: &'static str,
        position: usize,
        #[source]
        source: BoxError,
    },
}

/// Errors from method slots.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MethodError {
    /// No provider is bound to the slot.
    #[error("No provider bound for method '{method}'")]
    NoProviderBound { method: &'static str },

    /// A provider is already bound to the slot.
    #[error("Method '{method}' already has a bound provider")]
    AlreadyBound { method: &'static str },
}
