//! The exported functions.
//!
//! Handle operations are dispatched to the domain owning the handle and
//! domain-qualified operations run in the domain they name. Either way, a
//! call that has to move is re-invoked through the target domain's own entry
//! point for the same operation, with the same arguments.

use std::sync::Arc;

use isobridge_core::error::{HandleError, Result};
use isobridge_core::{HandleTarget, HandleToken};
use isobridge_isolation::ObjectRef;

/// Call a resolved entry point as the given function type.
macro_rules! call_entry {
    ($entry:expr, fn($($ty:ty),*) -> $ret:ty, ($($arg:expr),*)) => {{
        let f = std::mem::transmute::<*const std::ffi::c_void, unsafe extern "C" fn($($ty),*) -> $ret>(
            $entry.as_ptr(),
        );
        f($($arg),*)
    }};
}

pub mod content;
pub mod core;
pub mod image;

/// The target of `object` as a `T`.
fn expect_target<T: HandleTarget>(
    object: &ObjectRef,
    token: HandleToken,
    expected: &'static str,
) -> Result<Arc<T>> {
    object
        .downcast::<T>()
        .ok_or_else(|| HandleError::TypeMismatch { token, expected }.into())
}

/// Clear the calling thread's formatting caches.
pub fn reset_thread_caches() {
    core::reset_string_cache();
    content::reset_type_caches();
}
