#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Idempotent, race-free and observable teardown.
//!
//! An object that owns resources embeds a [`Lifecycle`] and implements [`Disposable`]. Calling
//! [`Disposable::dispose()`] any number of times, from any number of threads, tears the object
//! down exactly once:
//!
//! 1. Subscribers of [`Lifecycle::tearing_down()`] are notified.
//! 2. The release hooks of the object run: managed resources, then subscriptions to other
//!    objects, then unmanaged resources.
//! 3. The object becomes dead and [`Disposable::guard_live()`] starts failing.
//! 4. Subscribers of [`Lifecycle::dead()`] are notified.
//!
//! Failures of subscribers and hooks are logged and suppressed, so teardown always completes.
//!
//! # Example
//!
//! ```rust
//! use disposable::{Disposable, Lifecycle, Phase};
//! use multicast::Handler;
//!
//! #[derive(Default)]
//! struct Cache {
//!     lifecycle: Lifecycle<Self>,
//! }
//!
//! impl Disposable for Cache {
//!     fn lifecycle(&self) -> &Lifecycle<Self> {
//!         &self.lifecycle
//!     }
//!
//!     fn release_managed(&self) {
//!         println!("flushing cache");
//!     }
//! }
//!
//! fn report(_cache: &Cache, phase: &Phase) {
//!     println!("cache is now {phase:?}");
//! }
//!
//! let cache = Cache::default();
//! cache.lifecycle().tearing_down().add(&Handler::function(report)).unwrap();
//! cache.lifecycle().dead().add(&Handler::function(report)).unwrap();
//!
//! cache.dispose();
//! cache.dispose(); // Does nothing.
//!
//! assert!(cache.guard_live().is_err());
//! ```

mod error;
mod lifecycle;
mod owner;
mod state;

pub use error::*;
pub use lifecycle::*;
pub use owner::*;
pub(crate) use state::{DEAD, LIVE, TEARING_DOWN};
pub use state::{LifecycleState, Phase};
