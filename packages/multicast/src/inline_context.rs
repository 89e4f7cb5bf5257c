use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tracing::warn;

use crate::{ExecutionContext, describe_panic};

/// An execution context that is not bound to any particular thread.
///
/// [`send()`][ExecutionContext::send] runs the work directly on the calling thread.
/// [`post()`][ExecutionContext::post] runs the work on a new detached thread.
///
/// Subscribing on an `InlineContext` behaves like subscribing without a context, except that
/// the subscription is a distinct identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineContext;

impl ExecutionContext for InlineContext {
    fn send(&self, work: &(dyn Fn() + Sync)) {
        work();
    }

    fn post(&self, work: Box<dyn FnOnce() + Send>) {
        thread::spawn(move || {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
                warn!(
                    panic_message = describe_panic(&*payload),
                    "work posted to inline execution context panicked"
                );
            }
        });
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, mpsc};

    use testing::with_watchdog;

    use super::*;

    #[test]
    fn send_runs_on_calling_thread() {
        let caller = thread::current().id();
        let ran = AtomicBool::new(false);

        InlineContext.send(&|| {
            assert_eq!(thread::current().id(), caller);
            ran.store(true, Ordering::Relaxed);
        });

        assert!(ran.load(Ordering::Relaxed));
    }

    #[cfg_attr(miri, ignore)] // Spawns a real thread.
    #[test]
    fn post_runs_on_another_thread() {
        with_watchdog(|| {
            let caller = thread::current().id();
            let (tx, rx) = mpsc::channel();

            InlineContext.post(Box::new(move || {
                tx.send(thread::current().id()).unwrap();
            }));

            assert_ne!(rx.recv().unwrap(), caller);
        });
    }

    #[cfg_attr(miri, ignore)] // Spawns a real thread.
    #[test]
    fn post_contains_panics() {
        with_watchdog(|| {
            let (tx, rx) = mpsc::channel();
            let reached = Arc::new(AtomicBool::new(false));

            InlineContext.post(Box::new(|| panic!("posted work failed")));
            InlineContext.post(Box::new({
                let reached = Arc::clone(&reached);
                move || {
                    reached.store(true, Ordering::Relaxed);
                    tx.send(()).unwrap();
                }
            }));

            rx.recv().unwrap();
            assert!(reached.load(Ordering::Relaxed));
        });
    }
}
