//! # Shared Bus - Typed Channels and Method Slots
//!
//! Decouples the ledger core from every other node component.
//!
//! ## Two Primitives
//!
//! - **Channel**: a typed broadcast point. Many subscribers, synchronous
//!   fan-out on the publishing thread, in registration order.
//! - **Method slot**: a typed call point with at most one bound provider.
//!   Binding a second provider is a programming error and panics.
//!
//! Both hand out ownership tokens ([`Subscription`], [`ProviderHandle`]) that
//! deregister on release or drop, and stay safe to release after the channel
//! or slot itself is gone.
//!
//! ```text
//!   publisher ──publish(&v)──► Channel<T> ──► cb#1(&v) ──► cb#2(&v) ──► ...
//!
//!   caller ────call(args)────► Method<M> ──► provider(args) ──► output
//! ```
//!
//! ## Registry
//!
//! [`NodeBus`] holds one channel per [`ChannelKind`] and one slot per
//! [`MethodKind`]. It is created once and injected into each component at
//! construction time.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod channel;
pub mod errors;
pub mod events;
pub mod interfaces;
pub mod method;
pub mod registry;
pub mod subscriber;

// Re-export main types
pub use channel::Channel;
pub use errors::{BoxError, BusError, MethodError};
pub use events::ChannelKind;
pub use method::{Method, MethodKind};
pub use registry::{ChannelRegistry, MethodRegistry, NodeBus};
pub use subscriber::{ProviderHandle, Subscription};
