//! # Isobridge FFI
//!
//! The C ABI of the bridge. Every function here follows the boundary
//! protocol: no error or panic crosses into the caller, failures return a
//! documented sentinel and leave a captured error behind that
//! `isobridge_get_last_exception` hands out as a handle.
//!
//! Strings are UTF-8. Output strings use the buffer-size-query convention
//! described in [`boundary::strings`]; booleans are single bytes.
//!
//! Every function except `isobridge_activate_component` is also published in
//! each domain's export table under its name without the `isobridge_` prefix,
//! which is how calls are redirected between domains.

pub mod activation;
pub mod boundary;
pub mod exports;
pub mod global;
pub mod loader;

pub use activation::{isobridge_activate_component, isobridge_deisolate};
pub use boundary::{CBool, FALSE, TRUE};
pub use exports::content::*;
pub use exports::core::*;
pub use exports::image::*;
pub use global::runtime;
pub use loader::{standard_exports, BridgeLoader};

/// Drop the runtime's cached entry points and the calling thread's
/// formatting caches.
pub fn reset_caches() -> isobridge_core::Result<()> {
    runtime()?.reset_caches();
    exports::reset_thread_caches();
    Ok(())
}
