//! # Bus Registry
//!
//! One channel per [`ChannelKind`] and one slot per [`MethodKind`], created
//! on first use and kept for the lifetime of the registry.
//!
//! The registry is a plain value. The node creates one [`NodeBus`], wraps it
//! in an `Arc` and hands it to every component that publishes, subscribes,
//! binds or calls.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::channel::Channel;
use crate::events::ChannelKind;
use crate::method::{Method, MethodKind};

/// Table of typed channels keyed by channel kind.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel for `K`, created on first use.
    #[must_use]
    pub fn channel<K: ChannelKind>(&self) -> Channel<K::Payload> {
        let mut channels = self.channels.lock();
        let key = TypeId::of::<K>();

        if let Some(existing) = channels
            .get(&key)
            .and_then(|c| c.downcast_ref::<Channel<K::Payload>>())
        {
            return existing.clone();
        }

        debug!(channel = K::NAME, "Channel created");
        let channel = Channel::<K::Payload>::new(K::NAME);
        channels.insert(key, Box::new(channel.clone()));
        channel
    }

    /// Number of channels created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Table of single-provider slots keyed by method kind.
#[derive(Default)]
pub struct MethodRegistry {
    methods: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl MethodRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `M`, created on first use.
    #[must_use]
    pub fn method<M: MethodKind>(&self) -> Method<M> {
        let mut methods = self.methods.lock();
        let key = TypeId::of::<M>();

        if let Some(existing) = methods
            .get(&key)
            .and_then(|m| m.downcast_ref::<Method<M>>())
        {
            return existing.clone();
        }

        debug!(method = M::NAME, "Method slot created");
        let method = Method::<M>::new();
        methods.insert(key, Box::new(method.clone()));
        method
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The node-wide bus: every channel and every method slot.
#[derive(Default)]
pub struct NodeBus {
    channels: ChannelRegistry,
    methods: MethodRegistry,
}

impl NodeBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel for `K`.
    #[must_use]
    pub fn channel<K: ChannelKind>(&self) -> Channel<K::Payload> {
        self.channels.channel::<K>()
    }

    /// The method slot for `M`.
    #[must_use]
    pub fn method<M: MethodKind>(&self) -> Method<M> {
        self.methods.method::<M>()
    }

    #[must_use]
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    #[must_use]
    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AcceptedBlock, IrreversibleBlock};
    use crate::interfaces::{GetHeadBlockId, GetLastIrreversibleBlockNumber};
    use crate::MethodError;
    use shared_types::BlockId;

    #[test]
    fn test_channel_is_singleton_per_kind() {
        let bus = NodeBus::new();

        let first = bus.channel::<AcceptedBlock>();
        let _sub = first.subscribe(|_| Ok(()));

        let second = bus.channel::<AcceptedBlock>();
        assert_eq!(second.subscriber_count(), 1);
        assert_eq!(bus.channels().len(), 1);
    }

    #[test]
    fn test_distinct_kinds_have_distinct_channels() {
        let bus = NodeBus::new();
        let _sub = bus.channel::<AcceptedBlock>().subscribe(|_| Ok(()));

        assert_eq!(bus.channel::<IrreversibleBlock>().subscriber_count(), 0);
        assert_eq!(bus.channel::<IrreversibleBlock>().name(), "irreversible_block");
        assert_eq!(bus.channels().len(), 2);
    }

    #[test]
    fn test_method_is_singleton_per_kind() {
        let bus = NodeBus::new();
        let _handle = bus.method::<GetLastIrreversibleBlockNumber>().bind(|()| 7);

        assert_eq!(bus.method::<GetLastIrreversibleBlockNumber>().call(()), Ok(7));
        assert!(matches!(
            bus.method::<GetHeadBlockId>().call(()),
            Err(MethodError::NoProviderBound { method: "get_head_block_id" })
        ));
    }

    #[test]
    fn test_method_handle_unbinds_through_registry() {
        let bus = NodeBus::new();
        let handle = bus.method::<GetHeadBlockId>().bind(|()| BlockId::default());
        assert!(bus.method::<GetHeadBlockId>().is_bound());

        drop(handle);
        assert!(!bus.method::<GetHeadBlockId>().is_bound());
    }
}
