//! # Method Slots
//!
//! A method slot is a typed call point with at most one bound provider.
//! Unlike a channel, a slot models a single authoritative implementation:
//! binding while another provider is bound panics, and calling an unbound
//! slot fails with [`MethodError::NoProviderBound`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::errors::MethodError;
use crate::subscriber::{Deregister, ProviderHandle, Registration};

/// Compile-time identity of a method slot.
pub trait MethodKind: 'static {
    /// Argument type (use a tuple for several arguments).
    type Args: 'static;
    /// Return type of the provider.
    type Output: 'static;
    /// Slot name, used in logs and errors.
    const NAME: &'static str;
}

type Provider<M> =
    Arc<dyn Fn(<M as MethodKind>::Args) -> <M as MethodKind>::Output + Send + Sync>;

struct MethodInner<M: MethodKind> {
    next_id: AtomicU64,
    provider: RwLock<Option<(u64, Provider<M>)>>,
    _kind: PhantomData<fn() -> M>,
}

impl<M: MethodKind> Deregister for MethodInner<M> {
    fn deregister(&self, id: u64) -> bool {
        let mut provider = self.provider.write();
        match provider.as_ref() {
            Some((bound, _)) if *bound == id => {
                *provider = None;
                true
            }
            _ => false,
        }
    }
}

/// A typed single-provider call point.
///
/// Cloning yields another handle to the same slot.
pub struct Method<M: MethodKind> {
    inner: Arc<MethodInner<M>>,
}

impl<M: MethodKind> Method<M> {
    /// Create an unbound slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MethodInner {
                next_id: AtomicU64::new(1),
                provider: RwLock::new(None),
                _kind: PhantomData,
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        M::NAME
    }

    /// Bind `provider` unless one is already bound.
    ///
    /// # Errors
    ///
    /// `MethodError::AlreadyBound` if the slot is occupied.
    pub fn try_bind<F>(&self, provider: F) -> Result<ProviderHandle, MethodError>
    where
        F: Fn(M::Args) -> M::Output + Send + Sync + 'static,
    {
        let mut slot = self.inner.provider.write();
        if slot.is_some() {
            return Err(MethodError::AlreadyBound { method: M::NAME });
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some((id, Arc::new(provider)));
        drop(slot);

        debug!(method = M::NAME, "Provider bound");

        let target = Arc::downgrade(&self.inner);
        let target: Weak<dyn Deregister> = target;
        Ok(ProviderHandle::new(Registration::new(id, M::NAME, target)))
    }

    /// Bind the sole provider for this slot.
    ///
    /// # Panics
    ///
    /// If a provider is already bound. Rebinding is a programming error.
    #[allow(clippy::panic)]
    pub fn bind<F>(&self, provider: F) -> ProviderHandle
    where
        F: Fn(M::Args) -> M::Output + Send + Sync + 'static,
    {
        match self.try_bind(provider) {
            Ok(handle) => handle,
            Err(e) => panic!("{e}"),
        }
    }

    /// Forward `args` to the bound provider.
    ///
    /// The provider runs on the caller's thread without the slot lock held.
    ///
    /// # Errors
    ///
    /// `MethodError::NoProviderBound` if nothing is bound.
    pub fn call(&self, args: M::Args) -> Result<M::Output, MethodError> {
        let provider = self
            .inner
            .provider
            .read()
            .as_ref()
            .map(|(_, provider)| Arc::clone(provider))
            .ok_or(MethodError::NoProviderBound { method: M::NAME })?;
        Ok(provider(args))
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.provider.read().is_some()
    }
}

impl<M: MethodKind> Default for Method<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: MethodKind> Clone for Method<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: MethodKind> fmt::Debug for Method<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &M::NAME)
            .field("bound", &self.is_bound())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Double;
    impl MethodKind for Double {
        type Args = u32;
        type Output = u64;
        const NAME: &'static str = "double";
    }

    #[test]
    fn test_call_unbound_fails() {
        let method = Method::<Double>::new();
        assert_eq!(
            method.call(2),
            Err(MethodError::NoProviderBound { method: "double" })
        );
    }

    #[test]
    fn test_call_forwards_to_provider() {
        let method = Method::<Double>::new();
        let _handle = method.bind(|x| u64::from(x) * 2);
        assert_eq!(method.call(21), Ok(42));
    }

    #[test]
    #[should_panic(expected = "already has a bound provider")]
    fn test_rebind_panics() {
        let method = Method::<Double>::new();
        let _first = method.bind(|x| u64::from(x));
        let _second = method.bind(|x| u64::from(x) + 1);
    }

    #[test]
    fn test_try_bind_reports_conflict() {
        let method = Method::<Double>::new();
        let _first = method.bind(|x| u64::from(x));
        let err = method.try_bind(|x| u64::from(x) + 1).unwrap_err();
        assert_eq!(err, MethodError::AlreadyBound { method: "double" });
        assert_eq!(method.call(1), Ok(1));
    }

    #[test]
    fn test_release_unbinds() {
        let method = Method::<Double>::new();
        let mut handle = method.bind(|x| u64::from(x));
        handle.release();

        assert!(!method.is_bound());
        assert!(matches!(
            method.call(1),
            Err(MethodError::NoProviderBound { .. })
        ));

        let _rebound = method.bind(|x| u64::from(x) * 3);
        assert_eq!(method.call(1), Ok(3));
    }

    #[test]
    fn test_stale_handle_does_not_unbind_successor() {
        let method = Method::<Double>::new();
        let mut first = method.bind(|x| u64::from(x));
        first.release();

        let _second = method.bind(|x| u64::from(x) * 3);
        first.release();
        drop(first);

        assert_eq!(method.call(2), Ok(6));
    }

    #[test]
    fn test_provider_may_call_other_slot() {
        let inner = Method::<Double>::new();
        let _inner_handle = inner.bind(|x| u64::from(x) * 2);

        let outer = Method::<Double>::new();
        let forward = inner.clone();
        let _outer_handle = outer.bind(move |x| forward.call(x).unwrap_or(0) + 1);

        assert_eq!(outer.call(5), Ok(11));
    }

    #[test]
    fn test_release_after_slot_dropped() {
        let method = Method::<Double>::new();
        let mut handle = method.bind(|x| u64::from(x));
        drop(method);
        assert!(!handle.is_active());
        handle.release();
    }
}
