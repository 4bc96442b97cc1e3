//! Bundle and object operations.
//!
//! Bundle and query handles are dispatched to their owning domain. Object
//! operations take the id of the domain whose engine should answer.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_char, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::LocalKey;

use isobridge_content::{Bundle, ObjectId, QueryCursor};
use isobridge_core::{DomainId, Error, HandleToken, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::debug;

use super::expect_target;
use crate::boundary::{
    guard, read_object_id, read_utf8, to_cbool, write_object_id, write_string, CBool, FALSE,
};
use crate::global::{engine, runtime};

type TypeCache = RefCell<Option<(DomainId, ObjectId, Option<String>)>>;

thread_local! {
    static OBJECT_TYPE_CACHE: TypeCache = const { RefCell::new(None) };
    static SIMPLIFIED_TYPE_CACHE: TypeCache = const { RefCell::new(None) };
}

// Source paths handed out by `try_get_object_offset` live for the process.
static SOURCE_PATHS: Lazy<Mutex<HashMap<PathBuf, CString>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub(crate) fn reset_type_caches() {
    OBJECT_TYPE_CACHE.with(|cache| cache.borrow_mut().take());
    SIMPLIFIED_TYPE_CACHE.with(|cache| cache.borrow_mut().take());
}

fn cached_type(
    cache: &'static LocalKey<TypeCache>,
    domain: DomainId,
    id: ObjectId,
    lookup: impl FnOnce() -> Result<Option<String>>,
) -> Result<Option<String>> {
    let hit = cache.with(|cache| {
        cache
            .borrow()
            .as_ref()
            .filter(|(d, i, _)| *d == domain && *i == id)
            .map(|(_, _, value)| value.clone())
    });
    if let Some(value) = hit {
        return Ok(value);
    }

    let value = lookup()?;
    cache.with(|cache| *cache.borrow_mut() = Some((domain, id, value.clone())));
    Ok(value)
}

fn interned_source(path: &Path) -> Result<*const c_char> {
    let mut paths = SOURCE_PATHS.lock();
    if let Some(existing) = paths.get(path) {
        return Ok(existing.as_ptr());
    }
    let text = CString::new(path.to_string_lossy().into_owned())
        .map_err(|e| Error::InvalidArgument(format!("source path contains NUL: {e}")))?;
    let ptr = text.as_ptr();
    paths.insert(path.to_path_buf(), text);
    Ok(ptr)
}

/// Load a bundle into the engine of `domain` and return a handle to it.
///
/// # Safety
///
/// `path` must be null or valid for reads of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_load_bundle(path: *const u8, len: i32, domain: i32) -> isize {
    guard(0, || {
        let rt = runtime()?;
        let handle = rt.qualified(
            DomainId::new(domain),
            "load_bundle",
            || {
                let manifest = read_utf8(path, len)?
                    .ok_or_else(|| Error::InvalidArgument("bundle path is empty".into()))?;
                let bundle = engine()?.load_bundle(Path::new(&manifest))?;
                Ok(rt.alloc_local(bundle).to_native())
            },
            |entry| call_entry!(entry, fn(*const u8, i32, i32) -> isize, (path, len, domain)),
        )?;
        Ok(handle.unwrap_or(0))
    })
}

/// Query the objects of a bundle by glob pattern.
///
/// Returns a query handle, or `0` when nothing matches. A null or empty
/// pattern matches everything.
///
/// # Safety
///
/// `pattern` must be null or valid for reads of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_query_bundle_objects(
    bundle: isize,
    pattern: *const u8,
    len: i32,
) -> isize {
    guard(0, || {
        let rt = runtime()?;
        let token = HandleToken::from_native(bundle);
        let handle = rt.dispatch(
            token,
            "query_bundle_objects",
            |object| {
                let bundle = expect_target::<Bundle>(object, token, "bundle")?;
                let pattern = read_utf8(pattern, len)?;
                let cursor = engine()?.query(&bundle, pattern.as_deref());
                Ok(cursor.map_or(0, |cursor| rt.alloc_local(Arc::new(cursor)).to_native()))
            },
            |entry| call_entry!(entry, fn(isize, *const u8, i32) -> isize, (bundle, pattern, len)),
        )?;
        Ok(handle.unwrap_or(0))
    })
}

/// Write the url under a query cursor and move past it.
///
/// The cursor only advances when the url was written. Once the last url has
/// been written the query handle is released, so later calls return `0`.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_read_queried_bundle_object(
    query: isize,
    buffer: *mut c_char,
    capacity: i32,
) -> i32 {
    guard(0, || {
        let rt = runtime()?;
        let token = HandleToken::from_native(query);
        let written = rt.dispatch(
            token,
            "read_queried_bundle_object",
            |object| {
                let cursor = expect_target::<QueryCursor>(object, token, "bundle query")?;
                let Some(url) = cursor.current() else {
                    rt.handles().release(token)?;
                    return Ok(0);
                };

                let written = write_string(Some(&url), buffer, capacity);
                if written > 0 && !cursor.advance() {
                    rt.handles().release(token)?;
                    debug!(%token, "Bundle query exhausted");
                }
                Ok(written)
            },
            |entry| call_entry!(entry, fn(isize, *mut c_char, i32) -> i32, (query, buffer, capacity)),
        )?;
        Ok(written.unwrap_or(0))
    })
}

/// Look up the id of the object at `path`.
///
/// # Safety
///
/// `path` must be null or valid for reads of `len` bytes and `out_id` must be
/// null or valid for writes of 16 bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_try_get_object_id(
    path: *const u8,
    len: i32,
    out_id: *mut u8,
    domain: i32,
) -> CBool {
    guard(FALSE, || {
        if out_id.is_null() {
            return Ok(FALSE);
        }
        let found = runtime()?.qualified(
            DomainId::new(domain),
            "try_get_object_id",
            || {
                let Some(url) = read_utf8(path, len)? else {
                    return Ok(FALSE);
                };
                Ok(match engine()?.object_id(&url) {
                    Some(id) => to_cbool(write_object_id(&id, out_id)),
                    None => FALSE,
                })
            },
            |entry| {
                call_entry!(entry, fn(*const u8, i32, *mut u8, i32) -> CBool, (path, len, out_id, domain))
            },
        )?;
        Ok(found.unwrap_or(FALSE))
    })
}

/// Look up the size of an object in bytes.
///
/// # Safety
///
/// `id` must be null or valid for reads of 16 bytes and `out_size` must be
/// null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_try_get_object_size(
    id: *const u8,
    out_size: *mut i64,
    domain: i32,
) -> CBool {
    guard(FALSE, || {
        let Some(object_id) = read_object_id(id) else {
            return Ok(FALSE);
        };
        let found = runtime()?.qualified(
            DomainId::new(domain),
            "try_get_object_size",
            || {
                let Some(size) = engine()?.object_size(&object_id) else {
                    return Ok(FALSE);
                };
                if !out_size.is_null() {
                    *out_size = i64::try_from(size).unwrap_or(i64::MAX);
                }
                Ok(to_cbool(true))
            },
            |entry| call_entry!(entry, fn(*const u8, *mut i64, i32) -> CBool, (id, out_size, domain)),
        )?;
        Ok(found.unwrap_or(FALSE))
    })
}

/// Look up where an object's bytes live.
///
/// The source path written to `out_source` stays valid for the life of the
/// process.
///
/// # Safety
///
/// `id` must be null or valid for reads of 16 bytes; every output pointer
/// must be null or valid for writes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_try_get_object_offset(
    id: *const u8,
    out_start: *mut i64,
    out_end: *mut i64,
    out_source: *mut *const c_char,
    domain: i32,
) -> CBool {
    guard(FALSE, || {
        let Some(object_id) = read_object_id(id) else {
            return Ok(FALSE);
        };
        let found = runtime()?.qualified(
            DomainId::new(domain),
            "try_get_object_offset",
            || {
                let Some(location) = engine()?.object_location(&object_id) else {
                    return Ok(FALSE);
                };
                if !out_start.is_null() {
                    *out_start = i64::try_from(location.start).unwrap_or(i64::MAX);
                }
                if !out_end.is_null() {
                    *out_end = i64::try_from(location.end).unwrap_or(i64::MAX);
                }
                if !out_source.is_null() {
                    *out_source = interned_source(&location.source)?;
                }
                Ok(to_cbool(true))
            },
            |entry| {
                call_entry!(
                    entry,
                    fn(*const u8, *mut i64, *mut i64, *mut *const c_char, i32) -> CBool,
                    (id, out_start, out_end, out_source, domain)
                )
            },
        )?;
        Ok(found.unwrap_or(FALSE))
    })
}

unsafe fn object_string(
    operation: &str,
    cache: &'static LocalKey<TypeCache>,
    id: *const u8,
    buffer: *mut c_char,
    capacity: i32,
    domain: i32,
    lookup: fn(&ObjectId) -> Result<Option<String>>,
) -> i32 {
    guard(0, || {
        let Some(object_id) = read_object_id(id) else {
            return Ok(0);
        };
        let domain_id = DomainId::new(domain);
        let written = runtime()?.qualified(
            domain_id,
            operation,
            || {
                let value = cached_type(cache, domain_id, object_id, || lookup(&object_id))?;
                Ok(write_string(value.as_deref(), buffer, capacity))
            },
            |entry| {
                call_entry!(
                    entry,
                    fn(*const u8, *mut c_char, i32, i32) -> i32,
                    (id, buffer, capacity, domain)
                )
            },
        )?;
        Ok(written.unwrap_or(0))
    })
}

/// Write the fully qualified type name of an object.
///
/// # Safety
///
/// `id` must be null or valid for reads of 16 bytes and `buffer` must be null
/// or valid for writes of `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_get_object_type(
    id: *const u8,
    buffer: *mut c_char,
    capacity: i32,
    domain: i32,
) -> i32 {
    object_string(
        "get_object_type",
        &OBJECT_TYPE_CACHE,
        id,
        buffer,
        capacity,
        domain,
        |id| Ok(engine()?.object_type(id)),
    )
}

/// Write the short type name of an object.
///
/// # Safety
///
/// `id` must be null or valid for reads of 16 bytes and `buffer` must be null
/// or valid for writes of `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_get_object_simplified_type(
    id: *const u8,
    buffer: *mut c_char,
    capacity: i32,
    domain: i32,
) -> i32 {
    object_string(
        "get_object_simplified_type",
        &SIMPLIFIED_TYPE_CACHE,
        id,
        buffer,
        capacity,
        domain,
        |id| Ok(engine()?.simplified_type(id)),
    )
}

/// Instantiate the object at `url` and return a handle to it.
///
/// # Safety
///
/// `url` must be null or valid for reads of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_instantiate_bundle_item(
    url: *const u8,
    len: i32,
    domain: i32,
) -> isize {
    guard(0, || {
        let rt = runtime()?;
        let handle = rt.qualified(
            DomainId::new(domain),
            "instantiate_bundle_item",
            || {
                let Some(url) = read_utf8(url, len)? else {
                    return Ok(0);
                };
                let object = engine()?.instantiate(&url)?;
                Ok(rt.alloc_local(object).to_native())
            },
            |entry| call_entry!(entry, fn(*const u8, i32, i32) -> isize, (url, len, domain)),
        )?;
        Ok(handle.unwrap_or(0))
    })
}

/// Instantiate an object by id and return a handle to it.
///
/// # Safety
///
/// `id` must be null or valid for reads of 16 bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_instantiate_bundle_item_by_object_id(
    id: *const u8,
    domain: i32,
) -> isize {
    guard(0, || {
        let rt = runtime()?;
        let handle = rt.qualified(
            DomainId::new(domain),
            "instantiate_bundle_item_by_object_id",
            || {
                let Some(object_id) = read_object_id(id) else {
                    return Ok(0);
                };
                let object = engine()?.instantiate_by_id(&object_id)?;
                Ok(rt.alloc_local(object).to_native())
            },
            |entry| call_entry!(entry, fn(*const u8, i32) -> isize, (id, domain)),
        )?;
        Ok(handle.unwrap_or(0))
    })
}

/// Write an object's bytes to a file.
///
/// # Safety
///
/// `id` must be null or valid for reads of 16 bytes and `path` must be null
/// or valid for reads of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_try_export_object(
    id: *const u8,
    path: *const u8,
    len: i32,
    domain: i32,
) -> CBool {
    guard(FALSE, || {
        let Some(object_id) = read_object_id(id) else {
            return Ok(FALSE);
        };
        let exported = runtime()?.qualified(
            DomainId::new(domain),
            "try_export_object",
            || {
                let Some(target) = read_utf8(path, len)? else {
                    return Ok(FALSE);
                };
                Ok(to_cbool(engine()?.export_object(&object_id, Path::new(&target))?))
            },
            |entry| {
                call_entry!(entry, fn(*const u8, *const u8, i32, i32) -> CBool, (id, path, len, domain))
            },
        )?;
        Ok(exported.unwrap_or(FALSE))
    })
}
