mod common;

use std::ptr;

use isobridge_ffi::*;

use common::read_string;

#[test]
fn test_version_round_trip() {
    let version = read_string(|buf, cap| unsafe { isobridge_get_version(buf, cap) }).unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));

    let size = unsafe { isobridge_get_version(ptr::null_mut(), 0) };
    assert_eq!(size, -(version.len() as i32 + 1));
}

#[test]
fn test_root_domain_id() {
    assert_eq!(isobridge_get_isolation_context_id(), 0);
    assert_eq!(isobridge_get_isolation_context_id(), 0);
}

#[test]
fn test_error_capture_and_take() {
    assert_eq!(isobridge_get_last_exception(), 0);

    // A path that does not exist fails inside the wrapper.
    isobridge_initialize();
    let path = "/nonexistent/bundle.json";
    let bundle = unsafe { isobridge_load_bundle(path.as_ptr(), path.len() as i32, 0) };
    assert_eq!(bundle, 0);

    let error = isobridge_get_last_exception();
    assert_ne!(error, 0);
    assert_eq!(isobridge_get_last_exception(), 0);

    let message =
        read_string(|buf, cap| unsafe { isobridge_handle_to_string(error, buf, cap) }).unwrap();
    assert!(message.contains("Bundle not found"), "{message}");

    isobridge_release_handle(error);
    assert_eq!(
        unsafe { isobridge_handle_to_string(error, ptr::null_mut(), 0) },
        0
    );
}

#[test]
fn test_release_unknown_handle_is_captured() {
    isobridge_release_handle(0x7fff_0000);
    let error = isobridge_get_last_exception();
    assert_ne!(error, 0);
    let message =
        read_string(|buf, cap| unsafe { isobridge_handle_to_string(error, buf, cap) }).unwrap();
    assert!(message.contains("Handle not allocated"), "{message}");
    isobridge_release_handle(error);
    assert_eq!(isobridge_get_last_exception(), 0);
}

#[test]
fn test_booleans_are_encoded() {
    for value in [
        isobridge_is_image(0),
        isobridge_is_image(0x7fff_0001),
        isobridge_unload_isolation_context(0),
        isobridge_unload_isolation_context(-4),
    ] {
        assert!(value == TRUE || value == FALSE);
        assert_eq!(value, FALSE);
    }

    let id = isobridge_create_isolation_context();
    assert_eq!(isobridge_unload_isolation_context(id), TRUE);
    assert_eq!(isobridge_unload_isolation_context(id), FALSE);
}

#[test]
fn test_get_export() {
    let name = c"is_image";
    let entry = unsafe { isobridge_get_export(0, name.as_ptr()) };
    assert_eq!(entry as usize, isobridge_is_image as usize);

    let missing = c"no_such_operation";
    assert!(unsafe { isobridge_get_export(0, missing.as_ptr()) }.is_null());
    assert!(unsafe { isobridge_get_export(-1, name.as_ptr()) }.is_null());
    assert!(unsafe { isobridge_get_export(0, ptr::null()) }.is_null());
    assert_eq!(isobridge_get_last_exception(), 0);
}

#[test]
fn test_component_main_initializes() {
    assert_eq!(isobridge_component_main(ptr::null_mut(), 0), 0);
}
