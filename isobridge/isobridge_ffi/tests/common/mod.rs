#![allow(dead_code)]

use std::ffi::{c_char, CStr};
use std::fs;
use std::path::PathBuf;
use std::ptr;

use isobridge_ffi::{isobridge_create_isolation_context, isobridge_initialize};
use tempfile::TempDir;

pub const MANIFEST: &str = r#"{
    "name": "core",
    "data": "core.bin",
    "assets": [
        {
            "url": "textures/logo.png",
            "type": "Engine.Graphics.Texture2D, Engine",
            "offset": 0,
            "size": 4,
            "image": { "format": "BC1", "width": 64, "height": 32, "mip_levels": 3 }
        },
        {
            "url": "textures/ui/button.png",
            "type": "Engine.Graphics.Texture2D, Engine",
            "offset": 4,
            "size": 4,
            "image": { "format": "R8G8B8A8", "width": 16, "height": 16 }
        },
        {
            "url": "data/config.json",
            "type": "Engine.TextAsset, Engine",
            "simplified_type": "Text",
            "offset": 8,
            "size": 5
        }
    ]
}"#;

pub fn fixture() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("core.json");
    fs::write(&manifest, MANIFEST).unwrap();
    fs::write(dir.path().join("core.bin"), b"AAAABBBBhello").unwrap();
    (dir, manifest)
}

pub const PIXEL_MANIFEST: &str = r#"{
    "name": "pixels",
    "data": "pixels.bin",
    "assets": [
        {
            "url": "icons/rgba.png",
            "type": "Engine.Graphics.Texture2D, Engine",
            "offset": 0,
            "size": 20,
            "image": { "format": "R8G8B8A8", "width": 2, "height": 2, "mip_levels": 2 }
        }
    ]
}"#;

/// A bundle holding one 2x2 RGBA image with a two-level mip chain. Texel
/// byte `i` has value `i`.
pub fn pixel_fixture() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let manifest = dir.path().join("pixels.json");
    fs::write(&manifest, PIXEL_MANIFEST).unwrap();
    fs::write(dir.path().join("pixels.bin"), (0u8..20).collect::<Vec<_>>()).unwrap();
    (dir, manifest)
}

/// Query a string with a null buffer, then read it with exactly the reported
/// size.
pub fn read_string(f: impl Fn(*mut c_char, i32) -> i32) -> Option<String> {
    let size = f(ptr::null_mut(), 0);
    if size == 0 {
        return None;
    }
    assert!(size < 0, "size query returned {size}");

    let mut buffer = vec![0x7f as c_char; (-size) as usize];
    let written = f(buffer.as_mut_ptr(), -size);
    assert_eq!(written, -size);
    assert_eq!(buffer[written as usize - 1], 0);
    let text = unsafe { CStr::from_ptr(buffer.as_ptr()) };
    Some(text.to_str().unwrap().to_string())
}

/// Initialize root and create an isolated domain.
pub fn initialized_domain() -> i32 {
    isobridge_initialize();
    let id = isobridge_create_isolation_context();
    assert!(id > 0, "domain creation returned {id}");
    id
}
