#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Thread-safe multicast callback registry.
//!
//! A [`Registry<S, A>`] is a single notification point that any number of callbacks can
//! subscribe to. Each notification calls every subscriber with a sender `&S` and an argument
//! `&A`.
//!
//! # Callback identity
//!
//! Subscriptions are reference-counted by identity: registering the same callback twice keeps a
//! single entry with a count of two, so it is invoked twice per notification and has to be
//! removed twice before it stops receiving notifications. The identity of a callback is defined
//! by how its [`Handler`] was created:
//!
//! * [`Handler::new()`] - the shared closure allocation; clones of one handler are the same
//!   callback, two separately created handlers are not.
//! * [`Handler::function()`] - a stateless function; the same function is always the same
//!   callback.
//! * [`Handler::bound()`] - a receiver object plus a stateless method; the same method bound to
//!   the same receiver is always the same callback.
//! * [`Handler::keyed()`] - a caller-supplied key.
//!
//! # Execution contexts
//!
//! A subscription may capture an [`ExecutionContext`] via [`Registry::add_on()`]. Notifications
//! for that subscription are then delivered through [`ExecutionContext::send()`], which runs the
//! callback on the context (for example a dedicated [`ThreadContext`] thread) while the
//! dispatching thread waits for it to complete.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use multicast::{Handler, Registry};
//!
//! let received = Arc::new(AtomicUsize::new(0));
//!
//! let registry = Registry::<&str, usize>::new();
//! let handler = Handler::new({
//!     let received = Arc::clone(&received);
//!     move |_sender: &&str, value: &usize| {
//!         received.fetch_add(*value, Ordering::Relaxed);
//!     }
//! });
//!
//! registry.add(&handler).unwrap();
//! registry.dispatch(&"example", &5);
//!
//! assert_eq!(received.load(Ordering::Relaxed), 5);
//! ```

mod context;
mod error;
mod handler;
mod identity;
mod inline_context;
mod panic_payload;
mod registry;
mod thread_context;

pub use context::*;
pub use error::*;
pub use handler::*;
pub use identity::*;
pub use inline_context::*;
pub use panic_payload::*;
pub use registry::*;
pub use thread_context::*;
