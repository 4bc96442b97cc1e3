//! Component activation.
//!
//! The host activates a component by asking for a function pointer to one of
//! its methods. Activation goes through a swappable slot: by default every
//! request loads the component's export table anew, and after
//! [`isobridge_deisolate`] requests for the configured component image are
//! served straight from the root domain's loaded table.
//!
//! Three calling conventions are understood, selected by `delegate_type`:
//!
//! - null: the method must have the default component entry signature,
//! - all bits set: the method must be a plain C function,
//! - anything else: a NUL-terminated delegate type name the method must be
//!   published with.

use std::ffi::{c_char, c_void};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use isobridge_core::error::{hresult, ActivationError, Result};
use isobridge_isolation::{Export, ExportTable, Signature};
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

use crate::boundary::{guard, read_cstr};
use crate::global::runtime;
use crate::loader::standard_exports;

/// The activation function signature.
pub type ActivateFn = unsafe extern "C" fn(
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_void,
    *mut *const c_void,
) -> i32;

/// The `delegate_type` value selecting a plain C function.
pub const UNMANAGED_CALLERS_ONLY: *const c_char = usize::MAX as *const c_char;

static SLOT: AtomicUsize = AtomicUsize::new(0);

// Entry points handed out for delegate conventions, kept for the process.
static KEEP_ALIVE: Lazy<DashMap<usize, Export>> = Lazy::new(DashMap::new);

/// Point the activation slot at `f`.
pub fn install(f: ActivateFn) {
    SLOT.store(f as usize, Ordering::SeqCst);
}

/// Restore the default activation strategy.
pub fn reset() {
    SLOT.store(0, Ordering::SeqCst);
}

/// The activation function currently installed.
pub fn installed() -> ActivateFn {
    match SLOT.load(Ordering::SeqCst) {
        0 => default_activate,
        // SAFETY: only `install` stores non-zero values, and it stores
        // `ActivateFn` addresses.
        addr => unsafe { mem::transmute::<usize, ActivateFn>(addr) },
    }
}

/// Whether the fast path is installed.
pub fn is_deisolated() -> bool {
    SLOT.load(Ordering::SeqCst) == fast_activate as usize
}

/// Number of entry points kept alive for delegate conventions.
pub fn kept_alive() -> usize {
    KEEP_ALIVE.len()
}

enum Convention {
    Default,
    Unmanaged,
    Named(String),
}

unsafe fn convention(delegate_type: *const c_char) -> Result<Convention> {
    if delegate_type.is_null() {
        return Ok(Convention::Default);
    }
    if delegate_type == UNMANAGED_CALLERS_ONLY {
        return Ok(Convention::Unmanaged);
    }
    let name = read_cstr(delegate_type)?.unwrap_or_default();
    Ok(Convention::Named(name))
}

fn find(table: &ExportTable, type_name: &str, method: &str) -> Result<Export> {
    if table.component_type() != type_name {
        return Err(ActivationError::TypeLoad(type_name.to_string()).into());
    }
    table.get(method).cloned().ok_or_else(|| {
        ActivationError::MissingMethod {
            type_name: type_name.to_string(),
            method: method.to_string(),
        }
        .into()
    })
}

fn load_and_find(image: &str, type_name: &str, method: &str) -> Result<Export> {
    let rt = runtime()?;
    let table = standard_exports(&rt.config().component_type)?;
    debug!(image, exports = table.len(), "Loaded component exports for activation");
    find(&table, type_name, method)
}

fn check_convention(export: &Export, convention: &Convention) -> Result<()> {
    let matches = match (convention, export.signature()) {
        (Convention::Default, Signature::ComponentEntryPoint) => true,
        (Convention::Unmanaged, Signature::Unmanaged) => true,
        (Convention::Named(name), Signature::Named(published)) => name == published,
        _ => false,
    };
    if matches {
        return Ok(());
    }
    Err(ActivationError::InvalidOperation(format!(
        "'{}' is published as {:?}",
        export.name(),
        export.signature()
    ))
    .into())
}

unsafe fn try_activate(
    lookup: fn(&str, &str, &str) -> Result<Export>,
    image: *const c_char,
    type_name: *const c_char,
    method: *const c_char,
    delegate_type: *const c_char,
    reserved: *const c_void,
    out_fn: *mut *const c_void,
) -> Result<()> {
    if !reserved.is_null() {
        return Err(ActivationError::ReservedNotNull.into());
    }
    if out_fn.is_null() {
        return Err(ActivationError::NullArgument("out_fn").into());
    }
    let image = read_cstr(image)?.ok_or(ActivationError::NullArgument("image_path"))?;
    let type_name = read_cstr(type_name)?.ok_or(ActivationError::NullArgument("type_name"))?;
    let method = read_cstr(method)?.ok_or(ActivationError::NullArgument("method_name"))?;
    let convention = convention(delegate_type)?;

    let export = lookup(&image, &type_name, &method)?;
    check_convention(&export, &convention)?;

    if !matches!(convention, Convention::Unmanaged) {
        KEEP_ALIVE.entry(export.addr()).or_insert_with(|| export.clone());
    }

    *out_fn = export.as_ptr();
    debug!(image, type_name, method, "Activated component method");
    Ok(())
}

unsafe fn activate(
    lookup: fn(&str, &str, &str) -> Result<Export>,
    image: *const c_char,
    type_name: *const c_char,
    method: *const c_char,
    delegate_type: *const c_char,
    reserved: *const c_void,
    out_fn: *mut *const c_void,
) -> i32 {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        try_activate(lookup, image, type_name, method, delegate_type, reserved, out_fn)
    }));
    match result {
        Ok(Ok(())) => hresult::S_OK,
        Ok(Err(e)) => {
            warn!(error = %e, code = e.hresult(), "Component activation failed");
            e.hresult()
        }
        Err(_) => {
            warn!("Component activation panicked");
            hresult::E_FAIL
        }
    }
}

/// Activation that loads the component's exports for every request.
///
/// # Safety
///
/// String arguments must be null or NUL-terminated, and `out_fn` must be null
/// or valid for writes.
pub unsafe extern "C" fn default_activate(
    image: *const c_char,
    type_name: *const c_char,
    method: *const c_char,
    delegate_type: *const c_char,
    reserved: *const c_void,
    out_fn: *mut *const c_void,
) -> i32 {
    activate(load_and_find, image, type_name, method, delegate_type, reserved, out_fn)
}

fn find_loaded(image: &str, type_name: &str, method: &str) -> Result<Export> {
    let rt = runtime()?;
    if Path::new(image) == rt.config().component_image {
        return find(rt.root().exports(), type_name, method);
    }
    load_and_find(image, type_name, method)
}

/// Activation served from the root domain's loaded export table.
///
/// Images other than the configured component fall back to
/// [`default_activate`].
///
/// # Safety
///
/// As for [`default_activate`].
pub unsafe extern "C" fn fast_activate(
    image: *const c_char,
    type_name: *const c_char,
    method: *const c_char,
    delegate_type: *const c_char,
    reserved: *const c_void,
    out_fn: *mut *const c_void,
) -> i32 {
    activate(find_loaded, image, type_name, method, delegate_type, reserved, out_fn)
}

/// Activate a component method through the installed strategy.
///
/// Returns `0` and writes the function pointer to `out_fn` on success,
/// otherwise an error code.
///
/// # Safety
///
/// As for [`default_activate`].
#[no_mangle]
pub unsafe extern "C" fn isobridge_activate_component(
    image: *const c_char,
    type_name: *const c_char,
    method: *const c_char,
    delegate_type: *const c_char,
    reserved: *const c_void,
    out_fn: *mut *const c_void,
) -> i32 {
    installed()(image, type_name, method, delegate_type, reserved, out_fn)
}

/// Install the activation fast path.
#[no_mangle]
pub extern "C" fn isobridge_deisolate() {
    guard((), || {
        runtime()?;
        if !is_deisolated() {
            install(fast_activate);
            info!("Component activation served from loaded exports");
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ExportTable {
        standard_exports("isobridge::exports").unwrap()
    }

    #[test]
    fn test_find() {
        let table = table();
        assert!(find(&table, "isobridge::exports", "is_image").is_ok());

        let err = find(&table, "other::Type", "is_image").unwrap_err();
        assert_eq!(err.hresult(), hresult::COR_E_TYPELOAD);

        let err = find(&table, "isobridge::exports", "nope").unwrap_err();
        assert_eq!(err.hresult(), hresult::COR_E_MISSINGMETHOD);
    }

    #[test]
    fn test_conventions() {
        let table = table();
        let main = table.get("component_main").unwrap();
        let plain = table.get("is_image").unwrap();
        let version = table.get("get_version").unwrap();

        assert!(check_convention(main, &Convention::Default).is_ok());
        assert!(check_convention(plain, &Convention::Unmanaged).is_ok());
        assert!(check_convention(
            version,
            &Convention::Named(crate::loader::STRING_WRITER.into())
        )
        .is_ok());

        let err = check_convention(plain, &Convention::Default).unwrap_err();
        assert_eq!(err.hresult(), hresult::COR_E_INVALIDOPERATION);
        assert!(check_convention(main, &Convention::Unmanaged).is_err());
        assert!(check_convention(version, &Convention::Named("other".into())).is_err());
    }
}
