//! The boundary protocol.
//!
//! Every exported function runs its body through [`guard`]: errors and panics
//! are captured into the calling thread's last-error slot and the function
//! returns its failure sentinel instead. Strings and booleans cross the
//! boundary with the conventions in [`strings`].

pub mod error;
pub mod strings;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use isobridge_core::{Error, Result};

pub use error::{capture, take_last_error, CapturedError};
pub use strings::{
    read_cstr, read_object_id, read_utf8, write_bytes, write_object_id, write_string,
};

/// A boolean crossing the boundary.
pub type CBool = u8;

/// Encoded `true`.
pub const TRUE: CBool = 1;

/// Encoded `false`.
pub const FALSE: CBool = 0;

/// Encode a boolean.
pub fn to_cbool(value: bool) -> CBool {
    if value {
        TRUE
    } else {
        FALSE
    }
}

/// Run an exported function body.
///
/// Returns the body's value, or `sentinel` after capturing the error or panic
/// it produced.
pub fn guard<R>(sentinel: R, body: impl FnOnce() -> Result<R>) -> R {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            capture(e);
            sentinel
        }
        Err(payload) => {
            capture(Error::Panic(panic_message(payload.as_ref())));
            sentinel
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
