//! Image operations.
//!
//! All of them take an image handle and run in the domain that instantiated
//! the image. A handle to anything other than an image yields the failure
//! value without capturing an error. Encoding failures are captured.

use std::ffi::{c_char, c_void};
use std::path::Path;

use isobridge_content::{Image, MipLevel};
use isobridge_core::HandleToken;
use isobridge_isolation::ObjectRef;
use tracing::debug;

use crate::boundary::{guard, read_utf8, to_cbool, write_bytes, write_string, CBool, FALSE, TRUE};
use crate::global::runtime;

/// Native sink for encoded bytes: `(state, data, len)`.
pub type StreamWrite = unsafe extern "C" fn(state: *mut c_void, data: *const u8, len: usize);

fn mip_value(image: Option<&Image>, mip: i32, field: fn(&MipLevel) -> u32) -> i32 {
    image
        .and_then(|image| image.mip(mip))
        .map_or(-1, |level| i32::try_from(field(&level)).unwrap_or(i32::MAX))
}

/// Whether a handle refers to an image.
#[no_mangle]
pub extern "C" fn isobridge_is_image(handle: isize) -> CBool {
    guard(FALSE, || {
        let result = runtime()?.dispatch(
            HandleToken::from_native(handle),
            "is_image",
            |object| Ok(to_cbool(object.downcast_ref::<Image>().is_some())),
            |entry| unsafe { call_entry!(entry, fn(isize) -> CBool, (handle)) },
        )?;
        Ok(result.unwrap_or(FALSE))
    })
}

/// Number of mip levels of an image, or `0`.
#[no_mangle]
pub extern "C" fn isobridge_get_image_mip_levels(handle: isize) -> i32 {
    guard(0, || {
        let result = runtime()?.dispatch(
            HandleToken::from_native(handle),
            "get_image_mip_levels",
            |object| {
                Ok(object
                    .downcast_ref::<Image>()
                    .map_or(0, |image| i32::try_from(image.mip_levels()).unwrap_or(i32::MAX)))
            },
            |entry| unsafe { call_entry!(entry, fn(isize) -> i32, (handle)) },
        )?;
        Ok(result.unwrap_or(0))
    })
}

fn mip_dimension(handle: isize, mip: i32, operation: &str, field: fn(&MipLevel) -> u32) -> i32 {
    guard(-1, || {
        let result = runtime()?.dispatch(
            HandleToken::from_native(handle),
            operation,
            |object| Ok(mip_value(object.downcast_ref::<Image>(), mip, field)),
            |entry| unsafe { call_entry!(entry, fn(isize, i32) -> i32, (handle, mip)) },
        )?;
        Ok(result.unwrap_or(-1))
    })
}

/// Width of one mip level, or `-1`.
#[no_mangle]
pub extern "C" fn isobridge_get_image_width(handle: isize, mip: i32) -> i32 {
    mip_dimension(handle, mip, "get_image_width", |level| level.width)
}

/// Height of one mip level, or `-1`.
#[no_mangle]
pub extern "C" fn isobridge_get_image_height(handle: isize, mip: i32) -> i32 {
    mip_dimension(handle, mip, "get_image_height", |level| level.height)
}

/// Depth of one mip level, or `-1`.
#[no_mangle]
pub extern "C" fn isobridge_get_image_depth(handle: isize, mip: i32) -> i32 {
    mip_dimension(handle, mip, "get_image_depth", |level| level.depth)
}

/// Number of dimensions of an image (1, 2 or 3), or `-1`.
#[no_mangle]
pub extern "C" fn isobridge_get_image_dimensions(handle: isize) -> i32 {
    guard(-1, || {
        let result = runtime()?.dispatch(
            HandleToken::from_native(handle),
            "get_image_dimensions",
            |object| {
                Ok(object
                    .downcast_ref::<Image>()
                    .map_or(-1, |image| image.dimensions() as i32))
            },
            |entry| unsafe { call_entry!(entry, fn(isize) -> i32, (handle)) },
        )?;
        Ok(result.unwrap_or(-1))
    })
}

unsafe fn image_string(
    handle: isize,
    buffer: *mut c_char,
    capacity: i32,
    operation: &str,
    field: fn(&Image) -> &str,
) -> i32 {
    guard(0, || {
        let result = runtime()?.dispatch(
            HandleToken::from_native(handle),
            operation,
            |object| {
                let value = object.downcast_ref::<Image>().map(field);
                Ok(write_string(value, buffer, capacity))
            },
            |entry| {
                call_entry!(entry, fn(isize, *mut c_char, i32) -> i32, (handle, buffer, capacity))
            },
        )?;
        Ok(result.unwrap_or(0))
    })
}

/// Write the pixel format of an image.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_get_image_format(
    handle: isize,
    buffer: *mut c_char,
    capacity: i32,
) -> i32 {
    image_string(handle, buffer, capacity, "get_image_format", Image::format)
}

/// Write the texture type of an image.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_get_image_texture_type(
    handle: isize,
    buffer: *mut c_char,
    capacity: i32,
) -> i32 {
    image_string(handle, buffer, capacity, "get_image_texture_type", Image::texture_type)
}

/// DDS encoding of a handle's image. `mip < 0` selects the whole chain.
fn encode(object: &ObjectRef, mip: i32) -> isobridge_core::Result<Option<Vec<u8>>> {
    let Some(image) = object.downcast_ref::<Image>() else {
        return Ok(None);
    };
    let level = usize::try_from(mip).ok();
    image.encode_dds(level).map(Some)
}

/// Encode an image as DDS into a caller buffer.
///
/// The encoded length is stored through `out_len` even when the buffer is
/// too small, so a null buffer queries the size.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `capacity` bytes, and
/// `out_len` null or valid for a write.
#[no_mangle]
pub unsafe extern "C" fn isobridge_try_convert_image_to_buffer(
    handle: isize,
    mip: i32,
    buffer: *mut u8,
    capacity: i32,
    out_len: *mut i32,
) -> CBool {
    guard(FALSE, || {
        let result = runtime()?.dispatch(
            HandleToken::from_native(handle),
            "try_convert_image_to_buffer",
            |object| match encode(object, mip)? {
                Some(encoded) => Ok(to_cbool(write_bytes(&encoded, buffer, capacity, out_len)?)),
                None => Ok(FALSE),
            },
            |entry| {
                call_entry!(
                    entry,
                    fn(isize, i32, *mut u8, i32, *mut i32) -> CBool,
                    (handle, mip, buffer, capacity, out_len)
                )
            },
        )?;
        Ok(result.unwrap_or(FALSE))
    })
}

/// Encode an image as DDS and hand the bytes to `write` in one call.
///
/// # Safety
///
/// `write` must be null or a function that accepts `state`.
#[no_mangle]
pub unsafe extern "C" fn isobridge_try_convert_image_to_stream(
    handle: isize,
    mip: i32,
    write: Option<StreamWrite>,
    state: *mut c_void,
) -> CBool {
    guard(FALSE, || {
        let Some(write) = write else {
            return Ok(FALSE);
        };
        let result = runtime()?.dispatch(
            HandleToken::from_native(handle),
            "try_convert_image_to_stream",
            |object| {
                let Some(encoded) = encode(object, mip)? else {
                    return Ok(FALSE);
                };
                write(state, encoded.as_ptr(), encoded.len());
                Ok(TRUE)
            },
            |entry| {
                call_entry!(
                    entry,
                    fn(isize, i32, Option<StreamWrite>, *mut c_void) -> CBool,
                    (handle, mip, Some(write), state)
                )
            },
        )?;
        Ok(result.unwrap_or(FALSE))
    })
}

/// Write an image with its whole mip chain to a DDS file.
///
/// # Safety
///
/// `path` must be null or valid for reads of `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn isobridge_try_export_image(handle: isize, path: *const u8, len: i32) -> CBool {
    guard(FALSE, || {
        let result = runtime()?.dispatch(
            HandleToken::from_native(handle),
            "try_export_image",
            |object| {
                let Some(target) = read_utf8(path, len)? else {
                    return Ok(FALSE);
                };
                let Some(encoded) = encode(object, -1)? else {
                    return Ok(FALSE);
                };
                std::fs::write(Path::new(&target), &encoded)?;
                debug!(path = %target, bytes = encoded.len(), "Exported image");
                Ok(TRUE)
            },
            |entry| call_entry!(entry, fn(isize, *const u8, i32) -> CBool, (handle, path, len)),
        )?;
        Ok(result.unwrap_or(FALSE))
    })
}
