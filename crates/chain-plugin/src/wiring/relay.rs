//! # Signal Relay
//!
//! Re-publishes each ledger signal onto the node channel of the same kind.
//! The payload is forwarded untouched, so subscribers on the node channel
//! see the very value the ledger published.

use shared_bus::{Channel, ChannelKind, NodeBus, Subscription};

/// Subscribe to `source` and forward every value to the node channel `K`.
///
/// A failing node subscriber fails the ledger's publish call in turn.
pub fn relay<K: ChannelKind>(source: &Channel<K::Payload>, bus: &NodeBus) -> Subscription {
    let target = bus.channel::<K>();
    source.subscribe(move |value| {
        target.publish(value).map(|_| ()).map_err(Into::into)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use shared_bus::events::AcceptedBlock;
    use shared_types::BlockState;
    use std::sync::Arc;

    use crate::test_utils::make_genesis_block;

    #[test]
    fn test_relay_forwards_same_payload_once() {
        let bus = NodeBus::new();
        let source: Channel<Arc<BlockState>> = Channel::new("ledger.accepted_block");
        let _relay = relay::<AcceptedBlock>(&source, &bus);

        let seen: Arc<Mutex<Vec<Arc<BlockState>>>> = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let _sub = bus.channel::<AcceptedBlock>().subscribe(move |state| {
            log.lock().push(Arc::clone(state));
            Ok(())
        });

        let state = Arc::new(BlockState::new(Arc::new(make_genesis_block()), true));
        source.publish(&state).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(Arc::ptr_eq(&seen[0], &state));
    }

    #[test]
    fn test_dropping_relay_stops_forwarding() {
        let bus = NodeBus::new();
        let source: Channel<Arc<BlockState>> = Channel::new("ledger.accepted_block");
        let relay_token = relay::<AcceptedBlock>(&source, &bus);
        drop(relay_token);

        let state = Arc::new(BlockState::new(Arc::new(make_genesis_block()), true));
        assert_eq!(source.publish(&state).unwrap(), 0);
        assert_eq!(bus.channel::<AcceptedBlock>().events_published(), 0);
    }
}
