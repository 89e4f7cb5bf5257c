//! Lifecycle state machine. Everything starts in the live state and only ever moves forward:
//!
//! 0 - live - the owner is usable; nobody has started tearing it down yet.
//! 1 - tearing down - one caller has won the right to tear the owner down and is running the
//!                    notifications and release hooks; the owner is still usable by those.
//! 2 - dead - teardown has completed; the owner must no longer be used.
//!
//! The `live -> tearing down` transition is a compare-and-swap, so exactly one caller wins it.
//! The `tearing down -> dead` transition is a plain store because only the winner performs it.

pub(crate) const LIVE: u8 = 0;
pub(crate) const TEARING_DOWN: u8 = 1;
pub(crate) const DEAD: u8 = 2;

/// Where an object is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[allow(
    clippy::exhaustive_enums,
    reason = "the lifecycle has exactly these three states and callers are expected to match on them"
)]
pub enum LifecycleState {
    /// The object is usable.
    Live,

    /// Teardown is in progress.
    TearingDown,

    /// Teardown has completed. Using the object is an error.
    Dead,
}

impl LifecycleState {
    pub(crate) fn from_raw(raw: u8) -> Self {
        match raw {
            LIVE => Self::Live,
            TEARING_DOWN => Self::TearingDown,
            DEAD => Self::Dead,
            _ => unreachable!("lifecycle state {raw} is not a valid state"),
        }
    }
}

/// Which lifecycle notification is being delivered.
///
/// This is the argument passed to subscribers of [`Lifecycle::tearing_down()`] and
/// [`Lifecycle::dead()`], so one callback can subscribe to both and tell them apart.
///
/// [`Lifecycle::tearing_down()`]: crate::Lifecycle::tearing_down
/// [`Lifecycle::dead()`]: crate::Lifecycle::dead
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[allow(
    clippy::exhaustive_enums,
    reason = "there is one phase per notification point and there are exactly two of those"
)]
pub enum Phase {
    /// Teardown has started. The object is still usable.
    TearingDown,

    /// Teardown has completed. The object is no longer usable.
    Dead,
}
