use std::any::type_name;
use std::fmt::{self, Debug, Formatter};

use crate::{ContextRef, Handler, same_context};

/// A callback together with the execution context it was subscribed on.
///
/// Two identities are equal if their handlers are the same callback and they captured the
/// same execution context. An identity without a context only matches other identities
/// without a context.
pub struct CallbackIdentity<S: ?Sized, A: ?Sized> {
    handler: Handler<S, A>,
    context: Option<ContextRef>,
}

impl<S: ?Sized, A: ?Sized> CallbackIdentity<S, A> {
    /// Pairs a handler with the context its notifications are delivered on.
    #[must_use]
    pub fn new(handler: Handler<S, A>, context: Option<ContextRef>) -> Self {
        Self { handler, context }
    }

    /// The callback.
    #[must_use]
    pub fn handler(&self) -> &Handler<S, A> {
        &self.handler
    }

    /// The captured execution context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&ContextRef> {
        self.context.as_ref()
    }

    /// Whether this identity is the given handler subscribed on the given context.
    pub(crate) fn matches(&self, handler: &Handler<S, A>, context: Option<&ContextRef>) -> bool {
        if self.handler.key() != handler.key() {
            return false;
        }

        match (&self.context, context) {
            (None, None) => true,
            (Some(ours), Some(theirs)) => same_context(ours, theirs),
            _ => false,
        }
    }

    /// Calls the callback, on the captured context if there is one.
    ///
    /// With a context, this blocks until the context has executed the callback.
    pub(crate) fn invoke(&self, sender: &S, args: &A)
    where
        S: Sync,
        A: Sync,
    {
        match &self.context {
            Some(context) => context.send(&|| self.handler.invoke(sender, args)),
            None => self.handler.invoke(sender, args),
        }
    }
}

impl<S: ?Sized, A: ?Sized> Clone for CallbackIdentity<S, A> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            context: self.context.clone(),
        }
    }
}

impl<S: ?Sized, A: ?Sized> PartialEq for CallbackIdentity<S, A> {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.handler, other.context.as_ref())
    }
}

impl<S: ?Sized, A: ?Sized> Eq for CallbackIdentity<S, A> {}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl<S: ?Sized, A: ?Sized> Debug for CallbackIdentity<S, A> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("handler", &self.handler)
            .field("context", &self.context)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::InlineContext;

    fn on_event(_sender: &(), _args: &()) {}

    #[test]
    fn same_handler_without_context_is_equal() {
        let first = CallbackIdentity::new(Handler::function(on_event), None);
        let second = CallbackIdentity::new(Handler::function(on_event), None);

        assert_eq!(first, second);
    }

    #[test]
    fn same_handler_on_same_context_is_equal() {
        let context: ContextRef = Arc::new(InlineContext);

        let first = CallbackIdentity::new(Handler::function(on_event), Some(Arc::clone(&context)));
        let second = CallbackIdentity::new(Handler::function(on_event), Some(context));

        assert_eq!(first, second);
    }

    #[test]
    fn context_and_no_context_differ() {
        let context: ContextRef = Arc::new(InlineContext);

        let with_context = CallbackIdentity::new(Handler::function(on_event), Some(context));
        let without_context = CallbackIdentity::new(Handler::function(on_event), None);

        assert_ne!(with_context, without_context);
        assert_ne!(without_context, with_context);
    }

    #[test]
    fn different_contexts_differ() {
        let first = CallbackIdentity::new(
            Handler::function(on_event),
            Some(Arc::new(InlineContext) as ContextRef),
        );
        let second = CallbackIdentity::new(
            Handler::function(on_event),
            Some(Arc::new(InlineContext) as ContextRef),
        );

        assert_ne!(first, second);
    }
}
