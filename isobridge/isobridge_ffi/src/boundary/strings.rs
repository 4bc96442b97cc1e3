//! String, byte span and object id marshalling.
//!
//! Output strings use the buffer-size-query convention: a null buffer or a
//! non-positive capacity returns `-(len + 1)`, a buffer of at least `len + 1`
//! bytes receives the string and a NUL terminator and `len + 1` is returned.
//! An undersized buffer is left untouched and also reports `-(len + 1)`.
//! An absent string reports `0`.

use std::ffi::{c_char, CStr};
use std::ptr;

use isobridge_content::ObjectId;
use isobridge_core::{Error, Result};

/// Write `value` to a caller buffer.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `capacity` bytes.
pub unsafe fn write_string(value: Option<&str>, buffer: *mut c_char, capacity: i32) -> i32 {
    let Some(value) = value else {
        return 0;
    };

    let bytes = value.as_bytes();
    let required = i32::try_from(bytes.len() + 1).unwrap_or(i32::MAX);
    let fits = usize::try_from(capacity).is_ok_and(|cap| cap > bytes.len());
    if buffer.is_null() || !fits {
        return -required;
    }

    ptr::copy_nonoverlapping(bytes.as_ptr(), buffer.cast::<u8>(), bytes.len());
    *buffer.add(bytes.len()) = 0;
    required
}

/// Write `bytes` to a caller buffer, reporting the required length.
///
/// The length is stored through `out_len` when it is not null. Returns
/// `false` without writing when the buffer is null or too small.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `capacity` bytes, and
/// `out_len` null or valid for a write.
pub unsafe fn write_bytes(
    bytes: &[u8],
    buffer: *mut u8,
    capacity: i32,
    out_len: *mut i32,
) -> Result<bool> {
    let required = i32::try_from(bytes.len())
        .map_err(|_| Error::InvalidArgument(format!("{} bytes do not fit a buffer", bytes.len())))?;
    if !out_len.is_null() {
        *out_len = required;
    }
    if buffer.is_null() || capacity < required {
        return Ok(false);
    }
    ptr::copy_nonoverlapping(bytes.as_ptr(), buffer, bytes.len());
    Ok(true)
}

/// Read a UTF-8 span.
///
/// A null pointer or a non-positive length is an absent string.
///
/// # Safety
///
/// `ptr` must be null or valid for reads of `len` bytes.
pub unsafe fn read_utf8(ptr: *const u8, len: i32) -> Result<Option<String>> {
    let Ok(len) = usize::try_from(len) else {
        return Ok(None);
    };
    if ptr.is_null() || len == 0 {
        return Ok(None);
    }

    let bytes = std::slice::from_raw_parts(ptr, len);
    std::str::from_utf8(bytes)
        .map(|s| Some(s.to_string()))
        .map_err(|e| Error::InvalidArgument(format!("string is not UTF-8: {e}")))
}

/// Read a NUL-terminated UTF-8 string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
pub unsafe fn read_cstr(ptr: *const c_char) -> Result<Option<String>> {
    if ptr.is_null() {
        return Ok(None);
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(|s| Some(s.to_string()))
        .map_err(|e| Error::InvalidArgument(format!("string is not UTF-8: {e}")))
}

/// Read a 16-byte object id.
///
/// # Safety
///
/// `ptr` must be null or valid for reads of 16 bytes.
pub unsafe fn read_object_id(ptr: *const u8) -> Option<ObjectId> {
    if ptr.is_null() {
        return None;
    }
    let mut bytes = [0u8; 16];
    ptr::copy_nonoverlapping(ptr, bytes.as_mut_ptr(), bytes.len());
    Some(ObjectId::from_bytes(bytes))
}

/// Write a 16-byte object id.
///
/// # Safety
///
/// `out` must be null or valid for writes of 16 bytes.
pub unsafe fn write_object_id(id: &ObjectId, out: *mut u8) -> bool {
    if out.is_null() {
        return false;
    }
    ptr::copy_nonoverlapping(id.as_bytes().as_ptr(), out, 16);
    true
}
