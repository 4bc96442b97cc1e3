//! Safe wrappers over the exported functions, used the way a native host
//! would use them.

use std::ffi::{c_char, CStr};
use std::ptr;

use anyhow::{anyhow, Result};
use isobridge_ffi::*;

/// Read a string through the buffer-size-query convention.
pub fn read_string(f: impl Fn(*mut c_char, i32) -> i32) -> Option<String> {
    let size = f(ptr::null_mut(), 0);
    if size >= 0 {
        return None;
    }

    let mut buffer = vec![0 as c_char; size.unsigned_abs() as usize];
    if f(buffer.as_mut_ptr(), -size) <= 0 {
        return None;
    }
    // SAFETY: a successful write always ends in a NUL terminator.
    let text = unsafe { CStr::from_ptr(buffer.as_ptr()) };
    Some(text.to_string_lossy().into_owned())
}

/// The error captured by the last failed call on this thread.
pub fn last_error(context: &str) -> anyhow::Error {
    let handle = isobridge_get_last_exception();
    if handle == 0 {
        return anyhow!("{context}");
    }
    let message = read_string(|buf, cap| unsafe { isobridge_handle_to_string(handle, buf, cap) });
    isobridge_release_handle(handle);
    match message {
        Some(message) => anyhow!("{context}: {message}"),
        None => anyhow!("{context}"),
    }
}

/// The library version.
pub fn version() -> Option<String> {
    read_string(|buf, cap| unsafe { isobridge_get_version(buf, cap) })
}

/// Create an isolated domain.
pub fn create_domain() -> Result<i32> {
    let id = isobridge_create_isolation_context();
    if id <= 0 {
        return Err(last_error("failed to create an isolation domain"));
    }
    Ok(id)
}

/// Load a bundle into a domain.
pub fn load_bundle(manifest: &str, domain: i32) -> Result<isize> {
    let len = i32::try_from(manifest.len())?;
    let handle = unsafe { isobridge_load_bundle(manifest.as_ptr(), len, domain) };
    if handle == 0 {
        return Err(last_error(&format!("failed to load bundle {manifest}")));
    }
    Ok(handle)
}

/// Every url of a bundle matching `pattern`.
pub fn query(bundle: isize, pattern: Option<&str>) -> Result<Vec<String>> {
    let (ptr, len) = match pattern {
        Some(pattern) => (pattern.as_ptr(), i32::try_from(pattern.len())?),
        None => (ptr::null(), 0),
    };
    let query = unsafe { isobridge_query_bundle_objects(bundle, ptr, len) };
    if query == 0 {
        return Ok(Vec::new());
    }

    let mut urls = Vec::new();
    while let Some(url) =
        read_string(|buf, cap| unsafe { isobridge_read_queried_bundle_object(query, buf, cap) })
    {
        urls.push(url);
    }
    Ok(urls)
}

/// The raw id of the object at `url`.
pub fn object_id(url: &str, domain: i32) -> Result<Option<[u8; 16]>> {
    let mut id = [0u8; 16];
    let len = i32::try_from(url.len())?;
    let found = unsafe { isobridge_try_get_object_id(url.as_ptr(), len, id.as_mut_ptr(), domain) };
    Ok((found == TRUE).then_some(id))
}

/// The size of an object.
pub fn object_size(id: &[u8; 16], domain: i32) -> Option<i64> {
    let mut size = 0i64;
    let found = unsafe { isobridge_try_get_object_size(id.as_ptr(), &mut size, domain) };
    (found == TRUE).then_some(size)
}

/// The type name of an object.
pub fn object_type(id: &[u8; 16], domain: i32) -> Option<String> {
    read_string(|buf, cap| unsafe { isobridge_get_object_type(id.as_ptr(), buf, cap, domain) })
}
