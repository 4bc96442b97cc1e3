//! The per-thread last-error slot.

use std::cell::RefCell;
use std::fmt;

use isobridge_core::Error;
use tracing::error;

thread_local! {
    static LAST_ERROR: RefCell<Option<CapturedError>> = const { RefCell::new(None) };
}

/// An error captured at the boundary.
///
/// Handed to native callers behind a domain-agnostic handle, so it can be
/// stringified from any domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedError {
    message: String,
    code: i32,
}

impl CapturedError {
    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The numeric code of the error.
    pub fn code(&self) -> i32 {
        self.code
    }
}

impl From<&Error> for CapturedError {
    fn from(e: &Error) -> Self {
        Self {
            message: e.to_string(),
            code: e.hresult(),
        }
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Capture `e` into the calling thread's slot, replacing any uncleared error.
pub fn capture(e: Error) {
    error!(error = %e, "Operation failed at the native boundary");
    let captured = CapturedError::from(&e);
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(captured));
}

/// Take and clear the calling thread's captured error.
pub fn take_last_error() -> Option<CapturedError> {
    LAST_ERROR.with(|slot| slot.borrow_mut().take())
}

#[cfg(test)]
mod tests {
    use super::*;
    use isobridge_core::error::{hresult, ActivationError};

    #[test]
    fn test_capture_overwrites() {
        capture(Error::InvalidArgument("first".into()));
        capture(ActivationError::NullArgument("out_fn").into());

        let captured = take_last_error().unwrap();
        assert_eq!(captured.code(), hresult::E_POINTER);
        assert_eq!(captured.to_string(), "Activation error: Null argument: out_fn");
        assert!(take_last_error().is_none());
    }

    #[test]
    fn test_slot_is_per_thread() {
        capture(Error::InvalidArgument("here".into()));
        let other = std::thread::spawn(take_last_error).join().unwrap();
        assert!(other.is_none());
        assert!(take_last_error().is_some());
    }
}
