use std::any::Any;

/// Extracts a human-readable message from a panic payload.
///
/// Panics raised via `panic!` carry either a `&'static str` or a `String`; anything else is
/// reported as an unknown payload.
///
/// # Example
///
/// ```rust
/// use std::panic;
///
/// use multicast::describe_panic;
///
/// let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
/// assert_eq!(describe_panic(&*payload), "boom");
/// ```
#[must_use]
pub fn describe_panic(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn static_str_payload() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(describe_panic(&*payload), "static message");
    }

    #[test]
    fn formatted_payload() {
        let value = 42;
        let payload = panic::catch_unwind(|| panic!("value was {value}")).unwrap_err();
        assert_eq!(describe_panic(&*payload), "value was 42");
    }

    #[test]
    fn foreign_payload() {
        let payload = panic::catch_unwind(|| panic::panic_any(17_u8)).unwrap_err();
        assert_eq!(describe_panic(&*payload), "unknown panic payload");
    }
}
