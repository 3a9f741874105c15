//! # Ownership Tokens
//!
//! A registration on a channel or a method slot is owned by exactly one
//! token. Releasing the token (explicitly or by dropping it) removes exactly
//! that registration. The token only holds a weak reference, so releasing it
//! after the channel or slot is gone is a no-op.

use std::fmt;
use std::sync::Weak;

use tracing::debug;

/// Something a token can deregister from.
pub(crate) trait Deregister: Send + Sync {
    /// Remove the registration `id`. Returns false if it was already gone.
    fn deregister(&self, id: u64) -> bool;
}

/// Weak link from a token to its registration entry.
pub(crate) struct Registration {
    id: u64,
    name: &'static str,
    target: Option<Weak<dyn Deregister>>,
}

impl Registration {
    pub(crate) fn new(id: u64, name: &'static str, target: Weak<dyn Deregister>) -> Self {
        Self {
            id,
            name,
            target: Some(target),
        }
    }

    /// Idempotent: the first call deregisters, later calls do nothing.
    fn release(&mut self) -> bool {
        let Some(target) = self.target.take() else {
            return false;
        };
        let Some(owner) = target.upgrade() else {
            debug!(name = self.name, id = self.id, "Registration released after owner was dropped");
            return false;
        };
        owner.deregister(self.id)
    }

    fn is_active(&self) -> bool {
        self.target.as_ref().is_some_and(|t| t.strong_count() > 0)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Ownership token for a channel subscription.
///
/// When dropped, the subscription is automatically removed.
#[must_use = "dropping a Subscription immediately unsubscribes the callback"]
#[derive(Debug)]
pub struct Subscription {
    registration: Registration,
}

impl Subscription {
    pub(crate) fn new(registration: Registration) -> Self {
        Self { registration }
    }

    /// Remove the callback from its channel.
    pub fn release(&mut self) {
        if self.registration.release() {
            debug!(channel = self.registration.name, id = self.registration.id, "Subscription released");
        }
    }

    /// Name of the channel this token subscribes to.
    #[must_use]
    pub fn channel(&self) -> &'static str {
        self.registration.name
    }

    /// True until released or until the channel is dropped.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registration.is_active()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

/// Ownership token for a bound method provider.
///
/// When dropped, the provider is unbound.
#[must_use = "dropping a ProviderHandle immediately unbinds the provider"]
#[derive(Debug)]
pub struct ProviderHandle {
    registration: Registration,
}

impl ProviderHandle {
    pub(crate) fn new(registration: Registration) -> Self {
        Self { registration }
    }

    /// Unbind the provider from its slot.
    pub fn release(&mut self) {
        if self.registration.release() {
            debug!(method = self.registration.name, "Provider unbound");
        }
    }

    /// Name of the method this provider is bound to.
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.registration.name
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.registration.is_active()
    }
}

impl Drop for ProviderHandle {
    fn drop(&mut self) {
        self.release();
    }
}
