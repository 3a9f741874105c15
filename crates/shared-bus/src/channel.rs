//! # Event Channel
//!
//! A typed broadcast point with an ordered list of subscriber callbacks.
//!
//! ## Delivery Rules
//!
//! - `publish` runs every callback registered at the time of the call,
//!   synchronously, on the publishing thread, in registration order.
//! - Every callback sees the same `&T`; subscribers must treat it as
//!   immutable.
//! - A failing callback aborts delivery to the remaining subscribers and the
//!   error is returned to the publisher.
//! - No replay: a new subscriber only sees later publications.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::errors::{BoxError, BusError};
use crate::subscriber::{Deregister, Registration, Subscription};

type Callback<T> = Arc<dyn Fn(&T) -> Result<(), BoxError> + Send + Sync>;

struct Entry<T> {
    id: u64,
    callback: Callback<T>,
}

struct ChannelInner<T> {
    name: &'static str,
    next_id: AtomicU64,
    subscribers: RwLock<Vec<Entry<T>>>,
    published: AtomicU64,
}

impl<T: 'static> Deregister for ChannelInner<T> {
    fn deregister(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|entry| entry.id != id);
        subscribers.len() != before
    }
}

/// A typed broadcast point.
///
/// Cloning yields another handle to the same channel.
pub struct Channel<T> {
    inner: Arc<ChannelInner<T>>,
}

impl<T: 'static> Channel<T> {
    /// Create an empty channel.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                name,
                next_id: AtomicU64::new(1),
                subscribers: RwLock::new(Vec::new()),
                published: AtomicU64::new(0),
            }),
        }
    }

    /// Channel name, used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Register a callback.
    ///
    /// The returned token owns the registration; dropping it unsubscribes.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.write().push(Entry {
            id,
            callback: Arc::new(callback),
        });

        debug!(channel = self.inner.name, id, "New subscription created");

        let target = Arc::downgrade(&self.inner);
        let target: Weak<dyn Deregister> = target;
        Subscription::new(Registration::new(id, self.inner.name, target))
    }

    /// Deliver `value` to every current subscriber.
    ///
    /// # Returns
    ///
    /// The number of subscribers that received the value.
    ///
    /// # Errors
    ///
    /// `BusError::SubscriberFailed` from the first failing callback; later
    /// subscribers are not called.
    pub fn publish(&self, value: &T) -> Result<usize, BusError> {
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let callbacks: Vec<Callback<T>> = self
            .inner
            .subscribers
            .read()
            .iter()
            .map(|entry| Arc::clone(&entry.callback))
            .collect();

        for (position, callback) in callbacks.iter().enumerate() {
            if let Err(source) = callback(value) {
                warn!(
                    channel = self.inner.name,
                    position,
                    error = %source,
                    "Subscriber failed, delivery aborted"
                );
                return Err(BusError::SubscriberFailed {
                    channel: self.inner.name,
                    position,
                    source,
                });
            }
        }

        Ok(callbacks.len())
    }

    /// Number of currently registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    /// Total publish calls on this channel.
    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.inner.name)
            .field("subscribers", &self.inner.subscribers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;

    fn recorder(
        log: &Arc<Mutex<Vec<(u32, u64)>>>,
        tag: u32,
    ) -> impl Fn(&u64) -> Result<(), BoxError> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |v: &u64| {
            log.lock().push((tag, *v));
            Ok(())
        }
    }

    #[test]
    fn test_publish_no_subscribers() {
        let channel: Channel<u64> = Channel::new("test");
        assert_eq!(channel.publish(&1).unwrap(), 0);
        assert_eq!(channel.events_published(), 1);
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let channel: Channel<u64> = Channel::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        let _a = channel.subscribe(recorder(&log, 1));
        let _b = channel.subscribe(recorder(&log, 2));
        let _c = channel.subscribe(recorder(&log, 3));

        assert_eq!(channel.publish(&7).unwrap(), 3);
        assert_eq!(*log.lock(), vec![(1, 7), (2, 7), (3, 7)]);
    }

    #[test]
    fn test_released_token_receives_nothing_later() {
        let channel: Channel<u64> = Channel::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut a = channel.subscribe(recorder(&log, 1));
        let _b = channel.subscribe(recorder(&log, 2));
        channel.publish(&1).unwrap();

        a.release();
        assert!(!a.is_active());
        channel.publish(&2).unwrap();

        assert_eq!(*log.lock(), vec![(1, 1), (2, 1), (2, 2)]);
        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn test_release_is_idempotent_and_exact() {
        let channel: Channel<u64> = Channel::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut a = channel.subscribe(recorder(&log, 1));
        let _b = channel.subscribe(recorder(&log, 2));

        a.release();
        a.release();
        drop(a);

        assert_eq!(channel.subscriber_count(), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let channel: Channel<u64> = Channel::new("test");
        {
            let _sub = channel.subscribe(|_| Ok(()));
            assert_eq!(channel.subscriber_count(), 1);
        }
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_release_after_channel_dropped() {
        let channel: Channel<u64> = Channel::new("test");
        let mut sub = channel.subscribe(|_| Ok(()));
        assert!(sub.is_active());

        drop(channel);
        assert!(!sub.is_active());
        sub.release();
    }

    #[test]
    fn test_failing_subscriber_aborts_delivery() {
        let channel: Channel<u64> = Channel::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        let _a = channel.subscribe(recorder(&log, 1));
        let _b = channel.subscribe(|_| Err("boom".into()));
        let _c = channel.subscribe(recorder(&log, 3));

        let err = channel.publish(&9).unwrap_err();
        match err {
            BusError::SubscriberFailed { channel, position, .. } => {
                assert_eq!(channel, "test");
                assert_eq!(position, 1);
            }
        }
        assert_eq!(*log.lock(), vec![(1, 9)]);
    }

    #[test]
    fn test_no_replay_for_late_subscriber() {
        let channel: Channel<u64> = Channel::new("test");
        channel.publish(&1).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let _late = channel.subscribe(recorder(&log, 1));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let channel: Channel<u64> = Channel::new("test");
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let inner_slot = Arc::clone(&slot);
        let sub = channel.subscribe(move |_| {
            if let Some(mut own) = inner_slot.lock().take() {
                own.release();
            }
            Ok(())
        });
        *slot.lock() = Some(sub);

        assert_eq!(channel.publish(&1).unwrap(), 1);
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(channel.publish(&2).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_subscribe_and_publish() {
        let channel: Channel<u64> = Channel::new("test");
        let counter = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let channel = channel.clone();
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for i in 0..50 {
                        let c = Arc::clone(&counter);
                        let sub = channel.subscribe(move |_| {
                            c.fetch_add(1, Ordering::Relaxed);
                            Ok(())
                        });
                        channel.publish(&i).unwrap();
                        drop(sub);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(channel.events_published(), 200);
        assert!(counter.load(Ordering::Relaxed) >= 200);
    }
}
