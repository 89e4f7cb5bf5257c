use std::any::{TypeId, type_name};
use std::fmt::{self, Debug, Formatter};
use std::mem::size_of;
use std::sync::Arc;

use crate::{Error, Result};

type Callback<S, A> = Arc<dyn Fn(&S, &A) + Send + Sync>;

/// The equality key of a [`Handler`].
///
/// Addresses are only ever compared while the handler that owns the allocation is alive, so a
/// freed-and-reused address cannot alias a registered callback.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum HandlerKey {
    /// The shared closure allocation.
    Instance(usize),

    /// A stateless function, identified by its (unique, zero-sized) type.
    Function(TypeId),

    /// A receiver allocation plus a stateless method.
    Bound { receiver: usize, method: TypeId },

    /// Supplied by the caller.
    Keyed(u64),

    /// A stateful callable that was offered as a stateless one.
    Unidentifiable(&'static str),
}

/// A callback that can be subscribed to a [`Registry<S, A>`][crate::Registry].
///
/// A handler pairs the callable with the key that decides whether two handlers are the same
/// callback. See the [crate-level documentation][crate] for the identity rules of each
/// constructor.
///
/// Handlers are cheap to clone; clones share the callable and compare equal.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use multicast::Handler;
///
/// #[derive(Debug)]
/// struct Window;
///
/// impl Window {
///     fn on_closed(&self, _sender: &str, _code: &u32) {}
/// }
///
/// let window = Arc::new(Window);
///
/// let first = Handler::<str, u32>::bound(&window, Window::on_closed);
/// let second = Handler::<str, u32>::bound(&window, Window::on_closed);
///
/// // The same method bound to the same receiver is the same callback.
/// assert_eq!(first, second);
/// ```
pub struct Handler<S: ?Sized, A: ?Sized> {
    callback: Callback<S, A>,
    key: HandlerKey,
}

impl<S: ?Sized, A: ?Sized> Handler<S, A> {
    /// Creates a handler whose identity is this particular closure instance.
    ///
    /// Clones of the returned handler are the same callback. Calling `new()` again, even with
    /// an identical closure, creates a different callback.
    #[must_use]
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&S, &A) + Send + Sync + 'static,
    {
        let callback: Callback<S, A> = Arc::new(callback);
        let key = HandlerKey::Instance(Arc::as_ptr(&callback).cast::<()>().addr());

        Self { callback, key }
    }

    /// Creates a handler for a stateless function, identified by the function itself.
    ///
    /// `callback` must be a function item (e.g. `on_changed` or `Self::on_changed`) or a
    /// closure that captures nothing. Anything that carries state, including function
    /// pointers, cannot be identified; such a handler is rejected with
    /// [`Error::UnsupportedCallbackKind`] when it is added to or removed from a registry.
    #[must_use]
    pub fn function<F>(callback: F) -> Self
    where
        F: Fn(&S, &A) + Send + Sync + 'static,
    {
        let key =
            stateless_key::<F>().map_or_else(HandlerKey::Unidentifiable, HandlerKey::Function);

        Self {
            callback: Arc::new(callback),
            key,
        }
    }

    /// Creates a handler that calls `method` on `receiver`.
    ///
    /// Two handlers are the same callback if they bind the same method to the same receiver
    /// allocation. The handler keeps the receiver alive for as long as it is subscribed.
    ///
    /// `method` must be stateless, as for [`Handler::function()`].
    #[must_use]
    pub fn bound<R, M>(receiver: &Arc<R>, method: M) -> Self
    where
        R: ?Sized + Send + Sync + 'static,
        M: Fn(&R, &S, &A) + Send + Sync + 'static,
    {
        let key = match stateless_key::<M>() {
            Ok(method_key) => HandlerKey::Bound {
                receiver: Arc::as_ptr(receiver).cast::<()>().addr(),
                method: method_key,
            },
            Err(callback_type) => HandlerKey::Unidentifiable(callback_type),
        };

        let receiver = Arc::clone(receiver);

        Self {
            callback: Arc::new(move |sender: &S, args: &A| method(&receiver, sender, args)),
            key,
        }
    }

    /// Creates a handler identified by a caller-supplied key.
    ///
    /// Any two handlers with the same key are the same callback, regardless of the closure they
    /// carry. This allows a subscription to be removed without holding on to the original
    /// handler.
    #[must_use]
    pub fn keyed<F>(key: u64, callback: F) -> Self
    where
        F: Fn(&S, &A) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
            key: HandlerKey::Keyed(key),
        }
    }

    /// Calls the callback on the current thread.
    pub fn invoke(&self, sender: &S, args: &A) {
        (self.callback)(sender, args);
    }

    pub(crate) fn key(&self) -> HandlerKey {
        self.key
    }

    /// Fails if the identity of this handler cannot be established.
    pub(crate) fn ensure_identifiable(&self) -> Result<()> {
        match self.key {
            HandlerKey::Unidentifiable(callback_type) => {
                Err(Error::UnsupportedCallbackKind { callback_type })
            }
            _ => Ok(()),
        }
    }
}

// Function items and non-capturing closures are zero-sized and every one of them has its own
// type. Anything with a size has state that the type alone cannot tell apart.
fn stateless_key<F: 'static>() -> std::result::Result<TypeId, &'static str> {
    if size_of::<F>() == 0 {
        Ok(TypeId::of::<F>())
    } else {
        Err(type_name::<F>())
    }
}

impl<S: ?Sized, A: ?Sized> Clone for Handler<S, A> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
            key: self.key,
        }
    }
}

impl<S: ?Sized, A: ?Sized> PartialEq for Handler<S, A> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<S: ?Sized, A: ?Sized> Eq for Handler<S, A> {}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl<S: ?Sized, A: ?Sized> Debug for Handler<S, A> {
    #[cfg_attr(test, mutants::skip)] // No API contract.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
