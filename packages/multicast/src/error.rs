use thiserror::Error;

/// Errors that can occur when subscribing callbacks to a registry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The callback carries state of its own, so there is no way to tell whether two instances
    /// of it are the same callback. This is a programming error, not a runtime condition.
    ///
    /// Use [`Handler::new()`][crate::Handler::new] or [`Handler::keyed()`][crate::Handler::keyed]
    /// for closures that capture state.
    #[error(
        "callback of type '{callback_type}' cannot be identified: stateful callables must be \
         registered via Handler::new() or Handler::keyed()"
    )]
    UnsupportedCallbackKind {
        /// Type name of the callable that was rejected.
        callback_type: &'static str,
    },
}

/// A specialized `Result` type for registry operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
