use std::fmt::Debug;
use std::ptr;
use std::sync::Arc;

/// A place where code can be executed, such as a specific thread or message queue.
///
/// Subscriptions that capture an execution context receive their notifications through
/// [`send()`][Self::send], so the callback runs on the context instead of on whichever thread
/// happens to dispatch the notification.
///
/// The crate provides [`ThreadContext`][crate::ThreadContext] (a dedicated thread with a
/// message loop) and [`InlineContext`][crate::InlineContext] (runs work on the calling thread).
pub trait ExecutionContext: Debug + Send + Sync {
    /// Executes `work` on this context and returns once it has completed.
    ///
    /// This may be called from any thread. If `work` panics, the panic is resumed on the
    /// calling thread.
    ///
    /// There is no timeout: if the context never gets around to executing the work, the caller
    /// blocks forever.
    fn send(&self, work: &(dyn Fn() + Sync));

    /// Schedules `work` for execution on this context and returns without waiting for it.
    fn post(&self, work: Box<dyn FnOnce() + Send>);
}

/// A shared handle to an execution context, as captured by a subscription.
pub type ContextRef = Arc<dyn ExecutionContext>;

/// Returns whether two handles refer to the same execution context.
///
/// Execution contexts are compared by reference, never by value.
#[must_use]
pub fn same_context(a: &ContextRef, b: &ContextRef) -> bool {
    ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
