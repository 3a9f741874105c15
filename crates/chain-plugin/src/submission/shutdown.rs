//! # Emergency Shutdown
//!
//! Cooperative replacement for a process signalling itself: the submission
//! pipeline requests shutdown, the main loop awaits [`EmergencyShutdown::subscribe`]
//! and exits with the bad-alloc status.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error};

struct Inner {
    sender: watch::Sender<Option<String>>,
    requested: AtomicBool,
    issued: AtomicU64,
}

/// Shared shutdown request flag. Clones share state.
#[derive(Clone)]
pub struct EmergencyShutdown {
    inner: Arc<Inner>,
}

impl Default for EmergencyShutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl EmergencyShutdown {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                sender,
                requested: AtomicBool::new(false),
                issued: AtomicU64::new(0),
            }),
        }
    }

    /// Request shutdown. Only the first request is issued; later calls
    /// return false.
    pub fn request(&self, reason: impl Into<String>) -> bool {
        if self.inner.requested.swap(true, Ordering::SeqCst) {
            debug!("Emergency shutdown already requested");
            return false;
        }
        let reason = reason.into();
        error!(%reason, "Emergency shutdown requested");
        self.inner.issued.fetch_add(1, Ordering::SeqCst);
        self.inner.sender.send_replace(Some(reason));
        true
    }

    /// Receiver that changes once a request is issued.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.inner.sender.subscribe()
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Number of requests actually issued (0 or 1).
    #[must_use]
    pub fn requests_issued(&self) -> u64 {
        self.inner.issued.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.sender.borrow().clone()
    }
}

impl std::fmt::Debug for EmergencyShutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmergencyShutdown")
            .field("requested", &self.is_requested())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_first_request_is_issued() {
        let shutdown = EmergencyShutdown::new();
        assert!(!shutdown.is_requested());

        assert!(shutdown.request("cache exhausted"));
        assert!(!shutdown.clone().request("again"));

        assert!(shutdown.is_requested());
        assert_eq!(shutdown.requests_issued(), 1);
        assert_eq!(shutdown.reason().as_deref(), Some("cache exhausted"));
    }

    #[tokio::test]
    async fn test_subscriber_wakes_on_request() {
        let shutdown = EmergencyShutdown::new();
        let mut rx = shutdown.subscribe();

        let requester = shutdown.clone();
        tokio::spawn(async move {
            requester.request("out of memory");
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_deref(), Some("out of memory"));
    }
}
