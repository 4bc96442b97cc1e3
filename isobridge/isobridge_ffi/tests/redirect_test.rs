mod common;

use std::ffi::{c_char, CStr};
use std::ptr;

use isobridge_content::ObjectId;
use isobridge_core::DomainId;
use isobridge_ffi::*;

use common::{fixture, initialized_domain, read_string};

fn load(manifest: &std::path::Path, domain: i32) -> isize {
    let path = manifest.to_str().unwrap();
    unsafe { isobridge_load_bundle(path.as_ptr(), path.len() as i32, domain) }
}

fn instantiate(url: &str, domain: i32) -> isize {
    unsafe { isobridge_instantiate_bundle_item(url.as_ptr(), url.len() as i32, domain) }
}

#[test]
fn test_created_ids_are_distinct() {
    let ids: Vec<i32> = (0..8).map(|_| isobridge_create_isolation_context()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), ids.len());
    assert!(ids.iter().all(|&id| id > 0));

    for id in ids {
        let domain = runtime().unwrap().lookup(DomainId::new(id)).unwrap();
        let seen = domain.enter(|| isobridge_get_isolation_context_id());
        assert_eq!(seen, id);
        assert_eq!(domain.enter(|| isobridge_get_isolation_context_id()), id);
        assert_eq!(isobridge_unload_isolation_context(id), TRUE);
    }
}

#[test]
fn test_query_is_redirected() {
    let (_dir, manifest) = fixture();
    let id = initialized_domain();

    let bundle = load(&manifest, id);
    assert_ne!(bundle, 0);

    let pattern = "textures/**";
    let query =
        unsafe { isobridge_query_bundle_objects(bundle, pattern.as_ptr(), pattern.len() as i32) };
    assert_ne!(query, 0);

    let mut urls = Vec::new();
    while let Some(url) =
        read_string(|buf, cap| unsafe { isobridge_read_queried_bundle_object(query, buf, cap) })
    {
        urls.push(url);
    }
    assert_eq!(urls, ["textures/logo.png", "textures/ui/button.png"]);
    assert_eq!(isobridge_get_last_exception(), 0);

    let none = "sounds/*";
    assert_eq!(
        unsafe { isobridge_query_bundle_objects(bundle, none.as_ptr(), none.len() as i32) },
        0
    );

    isobridge_release_handle(bundle);
    isobridge_unload_isolation_context(id);
}

#[test]
fn test_image_operations_match_owner() {
    let (_dir, manifest) = fixture();
    let id = initialized_domain();
    assert_ne!(load(&manifest, id), 0);

    let image = instantiate("textures/logo.png", id);
    assert_ne!(image, 0);

    // Called from the root domain, redirected into the owner.
    assert_eq!(isobridge_is_image(image), TRUE);
    assert_eq!(isobridge_get_image_mip_levels(image), 3);
    assert_eq!(isobridge_get_image_width(image, 0), 64);
    assert_eq!(isobridge_get_image_height(image, 1), 16);
    assert_eq!(isobridge_get_image_depth(image, 2), 1);
    assert_eq!(isobridge_get_image_width(image, 3), -1);
    assert_eq!(isobridge_get_image_dimensions(image), 2);

    let format = read_string(|buf, cap| unsafe { isobridge_get_image_format(image, buf, cap) });
    assert_eq!(format.as_deref(), Some("BC1"));
    let texture =
        read_string(|buf, cap| unsafe { isobridge_get_image_texture_type(image, buf, cap) });
    assert_eq!(texture.as_deref(), Some("Texture2D"));

    // The same calls made inside the owner give the same answers.
    let owner = runtime().unwrap().lookup(DomainId::new(id)).unwrap();
    let local = owner.enter(|| {
        (
            isobridge_is_image(image),
            isobridge_get_image_width(image, 1),
            isobridge_get_image_dimensions(image),
        )
    });
    assert_eq!(local, (TRUE, 32, 2));
    assert_eq!(isobridge_get_image_width(image, 1), 32);

    let text = read_string(|buf, cap| unsafe { isobridge_handle_to_string(image, buf, cap) });
    assert_eq!(text.as_deref(), Some("textures/logo.png (BC1 64x32, 3 mips)"));

    let config = instantiate("data/config.json", id);
    assert_eq!(isobridge_is_image(config), FALSE);
    assert_eq!(isobridge_get_image_width(config, 0), -1);

    isobridge_release_handle(image);
    isobridge_release_handle(config);
    assert_eq!(isobridge_is_image(image), FALSE);
    isobridge_unload_isolation_context(id);
}

#[test]
fn test_object_queries_are_domain_qualified() {
    let (_dir, manifest) = fixture();
    let id = initialized_domain();
    let empty = initialized_domain();
    assert_ne!(load(&manifest, id), 0);

    let url = "data/config.json";
    let mut raw = [0u8; 16];
    let found =
        unsafe { isobridge_try_get_object_id(url.as_ptr(), url.len() as i32, raw.as_mut_ptr(), id) };
    assert_eq!(found, TRUE);
    assert_eq!(raw, *ObjectId::for_url(url).as_bytes());

    let mut other = [0u8; 16];
    let found = unsafe {
        isobridge_try_get_object_id(url.as_ptr(), url.len() as i32, other.as_mut_ptr(), empty)
    };
    assert_eq!(found, FALSE);

    let mut size = 0i64;
    assert_eq!(
        unsafe { isobridge_try_get_object_size(raw.as_ptr(), &mut size, id) },
        TRUE
    );
    assert_eq!(size, 5);

    let (mut start, mut end) = (0i64, 0i64);
    let mut source: *const c_char = ptr::null();
    assert_eq!(
        unsafe { isobridge_try_get_object_offset(raw.as_ptr(), &mut start, &mut end, &mut source, id) },
        TRUE
    );
    assert_eq!((start, end), (8, 13));
    let source = unsafe { CStr::from_ptr(source) }.to_str().unwrap();
    assert!(source.ends_with("core.bin"), "{source}");

    let type_name = read_string(|buf, cap| unsafe {
        isobridge_get_object_type(raw.as_ptr(), buf, cap, id)
    });
    assert_eq!(type_name.as_deref(), Some("Engine.TextAsset, Engine"));
    let simple = read_string(|buf, cap| unsafe {
        isobridge_get_object_simplified_type(raw.as_ptr(), buf, cap, id)
    });
    assert_eq!(simple.as_deref(), Some("Text"));
    let missing = read_string(|buf, cap| unsafe {
        isobridge_get_object_type(raw.as_ptr(), buf, cap, empty)
    });
    assert!(missing.is_none());

    let by_id = unsafe { isobridge_instantiate_bundle_item_by_object_id(raw.as_ptr(), id) };
    assert_ne!(by_id, 0);
    let text = read_string(|buf, cap| unsafe { isobridge_handle_to_string(by_id, buf, cap) });
    assert_eq!(text.as_deref(), Some("data/config.json (Engine.TextAsset, Engine, 5 bytes)"));
    isobridge_release_handle(by_id);

    isobridge_unload_isolation_context(id);
    isobridge_unload_isolation_context(empty);
}

#[test]
fn test_export_object_into_domain() {
    let (dir, manifest) = fixture();
    let id = initialized_domain();
    assert_ne!(load(&manifest, id), 0);

    let object = ObjectId::for_url("textures/ui/button.png");
    let out = dir.path().join("button.out");
    let out = out.to_str().unwrap();
    let exported = unsafe {
        isobridge_try_export_object(object.as_bytes().as_ptr(), out.as_ptr(), out.len() as i32, id)
    };
    assert_eq!(exported, TRUE);
    assert_eq!(std::fs::read(out).unwrap(), b"BBBB");
    isobridge_unload_isolation_context(id);
}

#[test]
fn test_unloaded_owner_yields_sentinels() {
    let (_dir, manifest) = fixture();
    let id = initialized_domain();
    assert_ne!(load(&manifest, id), 0);
    let image = instantiate("textures/logo.png", id);
    assert_ne!(image, 0);

    assert_eq!(isobridge_unload_isolation_context(id), TRUE);
    assert_eq!(isobridge_unload_isolation_context(id), FALSE);

    assert_eq!(isobridge_is_image(image), FALSE);
    assert_eq!(isobridge_get_image_width(image, 0), -1);
    assert_eq!(instantiate("textures/logo.png", id), 0);
    assert_eq!(isobridge_get_last_exception(), 0);

    isobridge_release_handle(image);
    assert_eq!(isobridge_get_last_exception(), 0);
}
