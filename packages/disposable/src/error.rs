use thiserror::Error;

/// Errors that can occur when using an object with a managed lifecycle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The object has already been torn down.
    #[error("cannot use {type_name} because it has already been disposed")]
    UseAfterDispose {
        /// Type name of the disposed object.
        type_name: &'static str,
    },
}

/// A specialized `Result` type for lifecycle operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn use_after_dispose_names_the_type() {
        let error = Error::UseAfterDispose {
            type_name: "my_app::Connection",
        };

        assert_eq!(
            error.to_string(),
            "cannot use my_app::Connection because it has already been disposed"
        );
    }
}
