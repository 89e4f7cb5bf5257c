//! Execution context backed by a dedicated thread running a message loop.

use std::any::type_name;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::{ExecutionContext, describe_panic};

const DEFAULT_THREAD_NAME: &str = "multicast-context";

enum Message {
    Post(Box<dyn FnOnce() + Send>),
    Send(SendRequest),
}

struct SendRequest {
    // The lifetime is erased. The thread that created the request blocks until it receives the
    // outcome on `completed` or until the request is dropped unexecuted, so the borrow outlives
    // every use of it.
    work: &'static (dyn Fn() + Sync),
    completed: Sender<thread::Result<()>>,
}

/// An execution context that runs all work on one dedicated thread.
///
/// Work is executed in the order it was submitted. [`send()`][ExecutionContext::send] blocks
/// the caller until the work has run; if called from the context thread itself, the work runs
/// immediately instead of being queued (queueing would deadlock).
///
/// A panic in work submitted via [`send()`][ExecutionContext::send] is resumed on the sending
/// thread. A panic in work submitted via [`post()`][ExecutionContext::post] is logged and
/// discarded; the context keeps running either way.
///
/// # Shutdown
///
/// Dropping the context stops accepting work, lets the thread finish everything already queued
/// and then joins it.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
///
/// use multicast::{ContextRef, ExecutionContext, ThreadContext};
///
/// let context = ThreadContext::builder().name("ui").build();
/// let context_thread = context.thread_id();
///
/// let context: ContextRef = Arc::new(context);
///
/// context.send(&|| {
///     assert_eq!(thread::current().id(), context_thread);
/// });
/// ```
pub struct ThreadContext {
    name: String,
    thread_id: ThreadId,

    // Only taken during drop, to close the channel.
    sender: Option<Sender<Message>>,
    join_handle: Option<JoinHandle<()>>,
}

impl ThreadContext {
    /// Starts a context thread with default settings.
    ///
    /// Use [`ThreadContext::builder()`] for custom configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring the context.
    #[must_use]
    pub fn builder() -> ThreadContextBuilder {
        ThreadContextBuilder::new()
    }

    /// The name of the context thread.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identifier of the context thread.
    #[must_use]
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether the calling thread is the context thread.
    #[must_use]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn submit(&self, message: Message) {
        let sender = self
            .sender
            .as_ref()
            .expect("sender is only taken when the context is dropped");

        // The receiver lives as long as the context thread, which outlives us.
        if sender.send(message).is_err() {
            panic!("execution context thread '{}' is no longer running", self.name);
        }
    }
}

impl Default for ThreadContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext for ThreadContext {
    fn send(&self, work: &(dyn Fn() + Sync)) {
        if self.is_current() {
            work();
            return;
        }

        // SAFETY: We do not return from this function until the context thread has either
        // reported the outcome of executing `work` or dropped the request without executing it.
        // Either way, the context thread no longer uses the reference once we return.
        let work = unsafe {
            mem::transmute::<&(dyn Fn() + Sync), &'static (dyn Fn() + Sync)>(work)
        };

        let (completed_tx, completed_rx) = channel::bounded(1);

        self.submit(Message::Send(SendRequest {
            work,
            completed: completed_tx,
        }));

        match completed_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(payload)) => panic::resume_unwind(payload),
            Err(_) => panic!(
                "execution context thread '{}' stopped before executing the work",
                self.name
            ),
        }
    }

    fn post(&self, work: Box<dyn FnOnce() + Send>) {
        self.submit(Message::Post(work));
    }
}

impl Drop for ThreadContext {
    fn drop(&mut self) {
        // Closing the channel ends the message loop once the queue is drained.
        drop(self.sender.take());

        let Some(join_handle) = self.join_handle.take() else {
            return;
        };

        // The last handle may be released by work running on the context thread itself.
        // Joining would deadlock, so we let the thread finish on its own.
        if self.is_current() {
            return;
        }

        if join_handle.join().is_err() {
            // The message loop traps all panics, so this is a defect in the loop itself.
            warn!(context = %self.name, "execution context thread terminated abnormally");
        }
    }
}

impl fmt::Debug for ThreadContext {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.name)
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

fn run_message_loop(name: &str, receiver: &Receiver<Message>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Post(work) => {
                trace!(context = name, "executing posted work");

                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(work)) {
                    warn!(
                        context = name,
                        panic_message = describe_panic(&*payload),
                        "work posted to execution context panicked"
                    );
                }
            }
            Message::Send(request) => {
                trace!(context = name, "executing sent work");

                let outcome = panic::catch_unwind(AssertUnwindSafe(request.work));

                // The sender is blocked waiting for this, so the receiving end is still there.
                drop(request.completed.send(outcome));
            }
        }
    }
}

/// Builder for configuring a [`ThreadContext`].
#[derive(Debug)]
pub struct ThreadContextBuilder {
    name: String,
}

impl ThreadContextBuilder {
    fn new() -> Self {
        Self {
            name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Sets the name of the context thread.
    ///
    /// Default is `multicast-context`.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Starts the context thread.
    ///
    /// # Panics
    ///
    /// Panics if the operating system fails to start a thread.
    #[must_use]
    pub fn build(self) -> ThreadContext {
        let (sender, receiver) = channel::unbounded::<Message>();

        let join_handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn({
                let name = self.name.clone();

                move || {
                    debug!(context = %name, "execution context thread started");
                    run_message_loop(&name, &receiver);
                    debug!(context = %name, "execution context thread exiting");
                }
            })
            .expect("failed to spawn execution context thread: thread spawning failure is not supported");

        ThreadContext {
            name: self.name,
            thread_id: join_handle.thread().id(),
            sender: Some(sender),
            join_handle: Some(join_handle),
        }
    }
}
