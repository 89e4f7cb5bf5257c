use std::any::type_name;
use std::fmt::{self, Debug, Formatter};
use std::num::NonZero;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::{CallbackIdentity, ContextRef, Handler, Result, describe_panic};

struct Entry<S: ?Sized, A: ?Sized> {
    identity: CallbackIdentity<S, A>,
    ref_count: NonZero<usize>,
}

struct Subscriptions<S: ?Sized, A: ?Sized> {
    // In order of first registration. No two entries have the same identity.
    entries: Vec<Entry<S, A>>,

    // Always the sum of all `ref_count` values.
    total: usize,
}

/// A thread-safe notification point that any number of callbacks can subscribe to.
///
/// Subscriptions are a multiset: adding the same [`Handler`] on the same execution context
/// twice creates one entry with a reference count of two. Each notification invokes the
/// callback once per registration and each [`remove()`][Self::remove] takes away one
/// registration.
///
/// Callbacks are invoked in order of first registration. A subscription with a captured
/// [`ExecutionContext`][crate::ExecutionContext] is invoked through that context and the
/// dispatching thread waits for it; other subscriptions are invoked on the dispatching thread.
///
/// Callbacks may add or remove subscriptions, including their own, while being invoked. Such
/// changes take effect starting with the next dispatch.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use multicast::{Handler, Registry};
///
/// let calls = Arc::new(AtomicUsize::new(0));
/// let handler = Handler::new({
///     let calls = Arc::clone(&calls);
///     move |_: &(), _: &()| {
///         calls.fetch_add(1, Ordering::Relaxed);
///     }
/// });
///
/// let registry = Registry::new();
/// registry.add(&handler).unwrap();
/// registry.add(&handler).unwrap();
/// registry.remove(&handler).unwrap();
///
/// registry.dispatch(&(), &());
///
/// // One registration remains.
/// assert_eq!(calls.load(Ordering::Relaxed), 1);
/// ```
pub struct Registry<S: ?Sized, A: ?Sized> {
    subscriptions: Mutex<Subscriptions<S, A>>,
}

impl<S: ?Sized, A: ?Sized> Registry<S, A> {
    /// Creates a registry without any subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Subscriptions {
                entries: Vec::new(),
                total: 0,
            }),
        }
    }

    /// Subscribes `handler` to be invoked on the dispatching thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCallbackKind`][crate::Error::UnsupportedCallbackKind] if the
    /// identity of `handler` cannot be established.
    pub fn add(&self, handler: &Handler<S, A>) -> Result<()> {
        self.add_with_context(handler, None)
    }

    /// Subscribes `handler` to be invoked on `context`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCallbackKind`][crate::Error::UnsupportedCallbackKind] if the
    /// identity of `handler` cannot be established.
    pub fn add_on(&self, handler: &Handler<S, A>, context: &ContextRef) -> Result<()> {
        self.add_with_context(handler, Some(context))
    }

    /// Removes one registration of `handler` that was added via [`add()`][Self::add].
    ///
    /// Returns whether a registration was removed. Removing a callback that is not subscribed
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCallbackKind`][crate::Error::UnsupportedCallbackKind] if the
    /// identity of `handler` cannot be established.
    pub fn remove(&self, handler: &Handler<S, A>) -> Result<bool> {
        self.remove_with_context(handler, None)
    }

    /// Removes one registration of `handler` that was added via [`add_on()`][Self::add_on]
    /// with the same `context`.
    ///
    /// Returns whether a registration was removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCallbackKind`][crate::Error::UnsupportedCallbackKind] if the
    /// identity of `handler` cannot be established.
    pub fn remove_on(&self, handler: &Handler<S, A>, context: &ContextRef) -> Result<bool> {
        self.remove_with_context(handler, Some(context))
    }

    /// The number of registrations, counting repeated registrations of the same callback.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.lock().total
    }

    /// Whether there are no registrations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all registrations.
    pub fn clear(&self) {
        // Handlers may hold the last reference to arbitrary objects; drop them outside the lock.
        let entries = {
            let mut subscriptions = self.subscriptions.lock();
            subscriptions.total = 0;
            std::mem::take(&mut subscriptions.entries)
        };

        drop(entries);
    }

    /// Invokes every subscribed callback with `sender` and `args`.
    ///
    /// A panic in a callback propagates to the caller and the remaining callbacks are not
    /// invoked. Use [`dispatch_isolated()`][Self::dispatch_isolated] if one failing subscriber
    /// must not affect the others.
    pub fn dispatch(&self, sender: &S, args: &A)
    where
        S: Sync,
        A: Sync,
    {
        for (identity, ref_count) in self.snapshot() {
            for _ in 0..ref_count.get() {
                identity.invoke(sender, args);
            }
        }
    }

    /// Invokes every subscribed callback with `sender` and `args`, containing failures.
    ///
    /// If a callback panics, the panic is logged, the remaining registrations of the same
    /// callback are skipped and dispatch continues with the next subscriber.
    pub fn dispatch_isolated(&self, sender: &S, args: &A) -> DispatchOutcome
    where
        S: Sync,
        A: Sync,
    {
        let mut outcome = DispatchOutcome::default();

        for (identity, ref_count) in self.snapshot() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                for _ in 0..ref_count.get() {
                    identity.invoke(sender, args);
                    outcome.invocations = outcome.invocations.saturating_add(1);
                }
            }));

            if let Err(payload) = result {
                outcome.failures = outcome.failures.saturating_add(1);

                warn!(
                    registry = type_name::<Self>(),
                    callback = ?identity.handler(),
                    panic_message = describe_panic(&*payload),
                    "subscriber panicked during notification; continuing with the next subscriber"
                );
            }
        }

        outcome
    }

    /// Subscribes `handler` to a registry that may not exist yet.
    ///
    /// The registry is created on first use, so an owner can keep an `Option<Registry>` and
    /// not pay for it until somebody subscribes. An absent `handler` does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCallbackKind`][crate::Error::UnsupportedCallbackKind] if the
    /// identity of `handler` cannot be established. The registry is not created in that case.
    pub fn add_to(
        slot: &mut Option<Self>,
        handler: Option<&Handler<S, A>>,
        context: Option<&ContextRef>,
    ) -> Result<()> {
        let Some(handler) = handler else {
            return Ok(());
        };

        handler.ensure_identifiable()?;

        slot.get_or_insert_with(Self::new)
            .add_with_context(handler, context)
    }

    /// Unsubscribes `handler` from a registry that may not exist.
    ///
    /// When the last registration is removed, the registry is dropped and `slot` becomes
    /// [`None`]. An absent `handler` or absent registry does nothing.
    ///
    /// Returns whether a registration was removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCallbackKind`][crate::Error::UnsupportedCallbackKind] if the
    /// identity of `handler` cannot be established.
    pub fn remove_from(
        slot: &mut Option<Self>,
        handler: Option<&Handler<S, A>>,
        context: Option<&ContextRef>,
    ) -> Result<bool> {
        let Some(handler) = handler else {
            return Ok(false);
        };

        handler.ensure_identifiable()?;

        let Some(registry) = slot.as_ref() else {
            return Ok(false);
        };

        let removed = registry.remove_with_context(handler, context)?;

        if registry.is_empty() {
            *slot = None;
        }

        Ok(removed)
    }

    /// Dispatches to a registry that may not exist. An absent registry has no subscribers.
    pub fn dispatch_optional(slot: Option<&Self>, sender: &S, args: &A)
    where
        S: Sync,
        A: Sync,
    {
        if let Some(registry) = slot {
            registry.dispatch(sender, args);
        }
    }

    fn add_with_context(&self, handler: &Handler<S, A>, context: Option<&ContextRef>) -> Result<()> {
        handler.ensure_identifiable()?;

        let mut guard = self.subscriptions.lock();
        let subscriptions = &mut *guard;

        if let Some(entry) = subscriptions
            .entries
            .iter_mut()
            .find(|entry| entry.identity.matches(handler, context))
        {
            entry.ref_count = entry
                .ref_count
                .checked_add(1)
                .expect("subscription count overflow is not supported");
        } else {
            subscriptions.entries.push(Entry {
                identity: CallbackIdentity::new(handler.clone(), context.cloned()),
                ref_count: NonZero::<usize>::MIN,
            });
        }

        subscriptions.total = subscriptions
            .total
            .checked_add(1)
            .expect("subscription count overflow is not supported");

        Ok(())
    }

    fn remove_with_context(
        &self,
        handler: &Handler<S, A>,
        context: Option<&ContextRef>,
    ) -> Result<bool> {
        handler.ensure_identifiable()?;

        let removed_entry = {
            let mut guard = self.subscriptions.lock();
            let subscriptions = &mut *guard;

            let Some(index) = subscriptions
                .entries
                .iter()
                .position(|entry| entry.identity.matches(handler, context))
            else {
                return Ok(false);
            };

            subscriptions.total = subscriptions
                .total
                .checked_sub(1)
                .expect("total is the sum of all reference counts, so it cannot be zero here");

            let entry = subscriptions
                .entries
                .get_mut(index)
                .expect("we just found the entry at this index");

            match NonZero::new(entry.ref_count.get().saturating_sub(1)) {
                Some(remaining) => {
                    entry.ref_count = remaining;
                    None
                }
                None => Some(subscriptions.entries.remove(index)),
            }
        };

        // The handler may hold the last reference to arbitrary objects; drop it outside the lock.
        drop(removed_entry);

        Ok(true)
    }

    // Most notification points have a handful of subscribers at most.
    fn snapshot(&self) -> SmallVec<[(CallbackIdentity<S, A>, NonZero<usize>); 4]> {
        let subscriptions = self.subscriptions.lock();

        trace!(
            registry = type_name::<Self>(),
            entries = subscriptions.entries.len(),
            total = subscriptions.total,
            "dispatching notification"
        );

        subscriptions
            .entries
            .iter()
            .map(|entry| (entry.identity.clone(), entry.ref_count))
            .collect()
    }
}

impl<S: ?Sized, A: ?Sized> Default for Registry<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl<S: ?Sized, A: ?Sized> Debug for Registry<S, A> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let subscriptions = self.subscriptions.lock();

        f.debug_struct(type_name::<Self>())
            .field("entries", &subscriptions.entries.len())
            .field("total", &subscriptions.total)
            .finish()
    }
}

/// What happened during [`Registry::dispatch_isolated()`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DispatchOutcome {
    invocations: usize,
    failures: usize,
}

impl DispatchOutcome {
    /// The number of callback invocations that completed normally.
    #[must_use]
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    /// The number of subscribers whose callback panicked.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Whether every callback completed normally.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures == 0
    }
}
