//! Domain, handle and error operations.

use std::cell::RefCell;
use std::ffi::{c_char, c_void};
use std::ptr;
use std::sync::{Arc, Weak};

use isobridge_core::error::hresult;
use isobridge_core::{DomainId, HandleTarget, HandleToken};
use tracing::debug;

use crate::boundary::{guard, read_cstr, take_last_error, to_cbool, write_string, CBool, FALSE};
use crate::global::{engine, runtime};

thread_local! {
    static LAST_STRING: RefCell<Option<(Weak<dyn HandleTarget>, String)>> = const { RefCell::new(None) };
}

pub(crate) fn reset_string_cache() {
    LAST_STRING.with(|slot| slot.borrow_mut().take());
}

fn same_target(a: &Arc<dyn HandleTarget>, b: &Arc<dyn HandleTarget>) -> bool {
    ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

fn cached_string(target: &Arc<dyn HandleTarget>) -> Option<String> {
    LAST_STRING.with(|slot| {
        slot.borrow().as_ref().and_then(|(weak, text)| {
            weak.upgrade()
                .filter(|cached| same_target(cached, target))
                .map(|_| text.clone())
        })
    })
}

/// Bring up the content engine of the calling domain. Idempotent.
#[no_mangle]
pub extern "C" fn isobridge_initialize() {
    guard((), || {
        engine()?.initialize();
        Ok(())
    })
}

/// Create an isolation domain and return its id, or `-1`.
#[no_mangle]
pub extern "C" fn isobridge_create_isolation_context() -> i32 {
    guard(-1, || Ok(runtime()?.create_domain()?.as_raw()))
}

/// Unload an isolation domain.
#[no_mangle]
pub extern "C" fn isobridge_unload_isolation_context(id: i32) -> CBool {
    guard(FALSE, || {
        Ok(to_cbool(runtime()?.unload_domain(DomainId::new(id))))
    })
}

/// The id of the calling domain, or `-1`.
#[no_mangle]
pub extern "C" fn isobridge_get_isolation_context_id() -> i32 {
    guard(-1, || Ok(runtime()?.current_id()?.as_raw()))
}

/// Resolve an operation in a domain.
///
/// Returns null if the domain does not publish the operation.
///
/// # Safety
///
/// `name` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn isobridge_get_export(domain_id: i32, name: *const c_char) -> *const c_void {
    guard(ptr::null(), || {
        let Some(name) = read_cstr(name)? else {
            return Ok(ptr::null());
        };
        let entry = runtime()?.resolve_export(DomainId::new(domain_id), &name)?;
        Ok(entry.map_or(ptr::null(), |entry| entry.as_ptr()))
    })
}

/// Release a handle.
#[no_mangle]
pub extern "C" fn isobridge_release_handle(handle: isize) {
    guard((), || {
        let token = HandleToken::from_native(handle);
        runtime()?.handles().release(token)?;
        debug!(%token, "Released handle");
        Ok(())
    })
}

/// Describe the target of a handle.
///
/// A size query remembers the string it measured, so the follow-up call for
/// the same target writes exactly that string.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_handle_to_string(
    handle: isize,
    buffer: *mut c_char,
    capacity: i32,
) -> i32 {
    guard(0, || {
        let Some(object) = runtime()?.handles().resolve(HandleToken::from_native(handle)) else {
            return Ok(0);
        };
        let target = object.target();
        let text = cached_string(target).unwrap_or_else(|| target.to_string());

        let written = write_string(Some(&text), buffer, capacity);
        LAST_STRING.with(|slot| {
            *slot.borrow_mut() = (written < 0).then(|| (Arc::downgrade(target), text));
        });
        Ok(written)
    })
}

/// Take the calling thread's captured error as a handle, or `0`.
#[no_mangle]
pub extern "C" fn isobridge_get_last_exception() -> isize {
    guard(0, || match take_last_error() {
        Some(captured) => Ok(runtime()?.alloc_agnostic(Arc::new(captured)).to_native()),
        None => Ok(0),
    })
}

/// Write the library version.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_get_version(buffer: *mut c_char, capacity: i32) -> i32 {
    guard(0, || Ok(write_string(Some(env!("CARGO_PKG_VERSION")), buffer, capacity)))
}

/// The component entry point with the host's default signature.
#[no_mangle]
pub extern "C" fn isobridge_component_main(args: *mut c_void, size: i32) -> i32 {
    guard(hresult::E_FAIL, || {
        debug!(has_args = !args.is_null(), size, "Component entry point called");
        engine()?.initialize();
        Ok(hresult::S_OK)
    })
}
