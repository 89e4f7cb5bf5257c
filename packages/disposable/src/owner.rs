use crate::{Lifecycle, Result};

/// An object whose teardown is driven by an embedded [`Lifecycle`].
///
/// Implementors provide access to their lifecycle and override whichever release hooks they
/// need. Each hook is called at most once by the winning [`dispose()`][Self::dispose] call,
/// in declaration order. The exception is [`release_unmanaged()`][Self::release_unmanaged],
/// which callers that lose the teardown race also call as a safety net.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// use disposable::{Disposable, Error, Lifecycle};
///
/// struct Connection {
///     lifecycle: Lifecycle<Self>,
///     open: AtomicBool,
/// }
///
/// impl Connection {
///     fn send(&self, _payload: &[u8]) -> Result<(), Error> {
///         self.guard_live()?;
///         // Write to the connection.
///         Ok(())
///     }
/// }
///
/// impl Disposable for Connection {
///     fn lifecycle(&self) -> &Lifecycle<Self> {
///         &self.lifecycle
///     }
///
///     fn release_unmanaged(&self) {
///         // Idempotent: only the first caller closes the connection.
///         if self.open.swap(false, Ordering::AcqRel) {
///             println!("connection closed");
///         }
///     }
/// }
///
/// let connection = Connection {
///     lifecycle: Lifecycle::new(),
///     open: AtomicBool::new(true),
/// };
///
/// connection.send(b"hello").unwrap();
/// connection.dispose();
///
/// assert!(connection.is_dead());
/// assert!(matches!(
///     connection.send(b"hello"),
///     Err(Error::UseAfterDispose { .. })
/// ));
/// ```
pub trait Disposable: Sized + Sync {
    /// The lifecycle embedded in this object.
    fn lifecycle(&self) -> &Lifecycle<Self>;

    /// Releases resources that are themselves disposable or otherwise owned objects.
    fn release_managed(&self) {}

    /// Unsubscribes this object from notification points of other objects.
    fn release_subscriptions(&self) {}

    /// Releases resources that nothing else will release, such as operating system handles.
    ///
    /// May be called more than once and concurrently with itself, so it must be idempotent.
    fn release_unmanaged(&self) {}

    /// Tears down this object. See [`Lifecycle::dispose()`].
    fn dispose(&self) {
        self.lifecycle().dispose(self);
    }

    /// Whether this object has been torn down.
    fn is_dead(&self) -> bool {
        self.lifecycle().is_dead()
    }

    /// Fails if this object has been torn down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterDispose`][crate::Error::UseAfterDispose] if this object has
    /// been torn down.
    fn guard_live(&self) -> Result<()> {
        self.lifecycle().guard_live()
    }
}
