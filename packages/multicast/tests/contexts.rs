//! Integration tests for delivering notifications on execution contexts.
//!
//! These tests use real threads, so they are ignored under Miri.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use multicast::{ContextRef, Handler, InlineContext, Registry, ThreadContext};
use parking_lot::Mutex;
use testing::with_watchdog;

#[cfg_attr(miri, ignore)]
#[test]
fn callback_runs_on_captured_context() {
    with_watchdog(|| {
        let context = ThreadContext::builder().name("subscriber").build();
        let context_thread = context.thread_id();
        let context: ContextRef = Arc::new(context);

        let observed: Arc<Mutex<Vec<ThreadId>>> = Arc::new(Mutex::new(Vec::new()));
        let handler = Handler::<(), u32>::new({
            let observed = Arc::clone(&observed);
            move |_, _| observed.lock().push(thread::current().id())
        });

        let registry = Arc::new(Registry::new());
        registry.add_on(&handler, &context).unwrap();

        // Dispatch from a thread that is neither the test thread nor the context thread.
        thread::spawn({
            let registry = Arc::clone(&registry);
            move || registry.dispatch(&(), &1)
        })
        .join()
        .unwrap();

        assert_eq!(*observed.lock(), vec![context_thread]);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn dispatch_waits_for_context_callbacks() {
    with_watchdog(|| {
        let context: ContextRef = Arc::new(ThreadContext::new());
        let counter = Arc::new(AtomicU32::new(0));

        let handler = Handler::<(), u32>::new({
            let counter = Arc::clone(&counter);
            move |_, args| {
                counter.fetch_add(*args, Ordering::Relaxed);
            }
        });

        let registry = Registry::new();
        registry.add_on(&handler, &context).unwrap();
        registry.add_on(&handler, &context).unwrap();

        registry.dispatch(&(), &3);

        // Both registrations have completed by the time dispatch returns.
        assert_eq!(counter.load(Ordering::Relaxed), 6);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn mixed_contexts_each_get_their_own_delivery() {
    with_watchdog(|| {
        let first = ThreadContext::builder().name("first").build();
        let second = ThreadContext::builder().name("second").build();
        let expected = vec![None, Some(first.thread_id()), Some(second.thread_id())];

        let first: ContextRef = Arc::new(first);
        let second: ContextRef = Arc::new(second);

        let caller = thread::current().id();
        let observed: Arc<Mutex<Vec<Option<ThreadId>>>> = Arc::new(Mutex::new(Vec::new()));

        let handler = Handler::<(), ()>::new({
            let observed = Arc::clone(&observed);
            move |(), ()| {
                let current = thread::current().id();
                observed
                    .lock()
                    .push((current != caller).then_some(current));
            }
        });

        let registry = Registry::new();
        registry.add(&handler).unwrap();
        registry.add_on(&handler, &first).unwrap();
        registry.add_on(&handler, &second).unwrap();
        assert_eq!(registry.len(), 3);

        registry.dispatch(&(), &());

        assert_eq!(*observed.lock(), expected);
    });
}

#[cfg_attr(miri, ignore)]
#[test]
fn callback_panic_on_context_reaches_dispatcher() {
    with_watchdog(|| {
        let context: ContextRef = Arc::new(ThreadContext::new());
        let after = Arc::new(AtomicUsize::new(0));

        let registry = Registry::<(), ()>::new();
        registry
            .add_on(&Handler::new(|(), ()| panic!("subscriber failed")), &context)
            .unwrap();
        registry
            .add(&Handler::new({
                let after = Arc::clone(&after);
                move |(), ()| {
                    after.fetch_add(1, Ordering::Relaxed);
                }
            }))
            .unwrap();

        let outcome = registry.dispatch_isolated(&(), &());

        assert_eq!(outcome.failures(), 1);
        assert_eq!(after.load(Ordering::Relaxed), 1);
    });
}

#[test]
fn inline_context_is_distinct_subscription() {
    let context: ContextRef = Arc::new(InlineContext);
    let counter = Arc::new(AtomicUsize::new(0));

    let handler = Handler::<(), ()>::new({
        let counter = Arc::clone(&counter);
        move |(), ()| {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    let registry = Registry::new();
    registry.add(&handler).unwrap();
    registry.add_on(&handler, &context).unwrap();

    registry.dispatch(&(), &());
    assert_eq!(counter.load(Ordering::Relaxed), 2);

    assert!(registry.remove_on(&handler, &context).unwrap());
    registry.dispatch(&(), &());
    assert_eq!(counter.load(Ordering::Relaxed), 3);
}
