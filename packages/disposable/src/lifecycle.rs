use std::any::type_name;
use std::fmt::{self, Debug, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{self, AtomicU8};

use multicast::{Registry, describe_panic};
use tracing::{debug, trace, warn};

use crate::{DEAD, Disposable, Error, LIVE, LifecycleState, Phase, Result, TEARING_DOWN};

/// The lifecycle state machine of an object of type `O`.
///
/// An owner embeds one `Lifecycle<Self>`, exposes it via [`Disposable::lifecycle()`] and gets
/// idempotent, thread-safe teardown in return. The state only ever advances
/// `Live -> TearingDown -> Dead`.
///
/// Two notification points let other code observe teardown:
///
/// * [`tearing_down()`][Self::tearing_down] fires when teardown starts, before any resources
///   are released.
/// * [`dead()`][Self::dead] fires after all resources have been released.
///
/// Subscribers receive the owner as the sender and the [`Phase`] as the argument. Both
/// registries are emptied once teardown completes, releasing anything the callbacks hold.
pub struct Lifecycle<O: ?Sized> {
    // See `state.rs` for the meaning of the values.
    state: AtomicU8,

    tearing_down: Registry<O, Phase>,
    dead: Registry<O, Phase>,
}

impl<O: ?Sized> Lifecycle<O> {
    /// Creates a lifecycle in the live state, without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LIVE),
            tearing_down: Registry::new(),
            dead: Registry::new(),
        }
    }

    /// The current state.
    ///
    /// Other threads may advance the state at any time, so the result may be stale as soon as
    /// it is returned. Only [`LifecycleState::Dead`] is final.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_raw(self.state.load(atomic::Ordering::Acquire))
    }

    /// Whether teardown has completed.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.state.load(atomic::Ordering::Acquire) == DEAD
    }

    /// Fails if teardown has completed.
    ///
    /// Owners call this before touching anything that teardown may have released. While
    /// teardown is still in progress this succeeds, so release hooks and `tearing_down()`
    /// subscribers can still use the owner.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`] if the state is [`LifecycleState::Dead`].
    pub fn guard_live(&self) -> Result<()> {
        if self.is_dead() {
            return Err(Error::UseAfterDispose {
                type_name: type_name::<O>(),
            });
        }

        Ok(())
    }

    /// The notification point that fires when teardown starts.
    #[must_use]
    pub fn tearing_down(&self) -> &Registry<O, Phase> {
        &self.tearing_down
    }

    /// The notification point that fires when teardown has completed.
    #[must_use]
    pub fn dead(&self) -> &Registry<O, Phase> {
        &self.dead
    }
}

impl<O: Disposable> Lifecycle<O> {
    /// Tears down `owner`, unless it is already being or has been torn down.
    ///
    /// `owner` must be the object this lifecycle belongs to.
    ///
    /// Exactly one caller wins the right to perform teardown, no matter how many threads call
    /// this concurrently. The winner:
    ///
    /// 1. Notifies [`tearing_down()`][Self::tearing_down] subscribers.
    /// 2. Calls [`Disposable::release_managed()`], [`Disposable::release_subscriptions()`]
    ///    and [`Disposable::release_unmanaged()`], in that order.
    /// 3. Marks the lifecycle as dead.
    /// 4. Notifies [`dead()`][Self::dead] subscribers.
    ///
    /// Each subscriber and each hook is isolated: a panic in one is logged and swallowed and
    /// teardown continues with the next step.
    ///
    /// A caller that loses the race while teardown is in progress calls
    /// [`Disposable::release_unmanaged()`] itself and returns without waiting for the winner.
    /// That hook must therefore be idempotent and safe to call concurrently with itself.
    pub fn dispose(&self, owner: &O) {
        if self.is_dead() {
            return;
        }

        if !self.try_begin_teardown() {
            trace!(
                owner = type_name::<O>(),
                "teardown already started by another caller; releasing unmanaged resources only"
            );

            run_hook(owner, "release_unmanaged", O::release_unmanaged);
            return;
        }

        debug!(owner = type_name::<O>(), "tearing down");

        notify(&self.tearing_down, owner, Phase::TearingDown);

        run_hook(owner, "release_managed", O::release_managed);
        run_hook(owner, "release_subscriptions", O::release_subscriptions);
        run_hook(owner, "release_unmanaged", O::release_unmanaged);

        // Only the winner of the compare-and-swap ever gets here.
        self.state.store(DEAD, atomic::Ordering::Release);

        debug!(owner = type_name::<O>(), "torn down");

        notify(&self.dead, owner, Phase::Dead);

        // Nobody will be notified again, so there is no reason to keep the callbacks alive.
        self.tearing_down.clear();
        self.dead.clear();
    }

    /// Releases the unmanaged resources of `owner` without notifying anyone.
    ///
    /// This is the teardown path for [`Drop`] implementations of owners that were never
    /// disposed explicitly. `owner` must be the object this lifecycle belongs to.
    ///
    /// * If the lifecycle is already dead, this does nothing.
    /// * If this call wins the race to start teardown, it calls
    ///   [`Disposable::release_unmanaged()`] and marks the lifecycle as dead. Managed resources
    ///   and subscriptions are left to their own destructors and no notifications are sent.
    /// * If teardown is already in progress, it calls [`Disposable::release_unmanaged()`] as a
    ///   safety net, exactly like a losing [`dispose()`][Self::dispose] call.
    ///
    /// # Example
    ///
    /// ```rust
    /// use disposable::{Disposable, Lifecycle};
    ///
    /// #[derive(Default)]
    /// struct Socket {
    ///     lifecycle: Lifecycle<Self>,
    /// }
    ///
    /// impl Disposable for Socket {
    ///     fn lifecycle(&self) -> &Lifecycle<Self> {
    ///         &self.lifecycle
    ///     }
    ///
    ///     fn release_unmanaged(&self) {
    ///         // Close the OS handle here.
    ///     }
    /// }
    ///
    /// impl Drop for Socket {
    ///     fn drop(&mut self) {
    ///         self.lifecycle.finalize(self);
    ///     }
    /// }
    ///
    /// let socket = Socket::default();
    /// drop(socket);
    /// ```
    pub fn finalize(&self, owner: &O) {
        if self.is_dead() {
            return;
        }

        let won = self.try_begin_teardown();

        run_hook(owner, "release_unmanaged", O::release_unmanaged);

        if won {
            self.state.store(DEAD, atomic::Ordering::Release);

            debug!(owner = type_name::<O>(), "finalized without explicit teardown");
        }
    }

    fn try_begin_teardown(&self) -> bool {
        // AcqRel on success because the winner both publishes the transition and must see
        // everything that happened to the owner before it. Acquire on failure so a loser sees
        // the state written by the winner.
        self.state
            .compare_exchange(
                LIVE,
                TEARING_DOWN,
                atomic::Ordering::AcqRel,
                atomic::Ordering::Acquire,
            )
            .is_ok()
    }
}

fn notify<O: Disposable>(registry: &Registry<O, Phase>, owner: &O, phase: Phase) {
    let outcome = registry.dispatch_isolated(owner, &phase);

    if !outcome.is_clean() {
        debug!(
            owner = type_name::<O>(),
            ?phase,
            failures = outcome.failures(),
            "lifecycle subscribers failed; failures suppressed to let teardown complete"
        );
    }
}

fn run_hook<O>(owner: &O, hook: &'static str, f: fn(&O)) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(owner))) {
        warn!(
            owner = type_name::<O>(),
            hook,
            panic_message = describe_panic(&*payload),
            "teardown hook panicked; continuing teardown"
        );
    }
}

impl<O: ?Sized> Default for Lifecycle<O> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl<O: ?Sized> Debug for Lifecycle<O> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("state", &self.state())
            .field("tearing_down", &self.tearing_down)
            .field("dead", &self.dead)
            .finish()
    }
}
