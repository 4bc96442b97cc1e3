//! The component image every domain is loaded from.
//!
//! All domains publish the same operations, but each load produces a fresh
//! content engine so domains never share content state.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use isobridge_content::ContentEngine;
use isobridge_core::Result;
use isobridge_core::error::ContentError;
use isobridge_isolation::{Domain, DomainImage, DomainLoader, Export, ExportTable, Signature};
use tracing::debug;

use crate::activation::isobridge_deisolate;
use crate::exports::content::*;
use crate::exports::core::*;
use crate::exports::image::*;

/// Delegate type name `get_version` is published with.
pub const STRING_WRITER: &str = "isobridge::StringWriter";

static TABLE_LOADS: AtomicUsize = AtomicUsize::new(0);

/// Number of export tables built so far in this process.
pub fn table_loads() -> usize {
    TABLE_LOADS.load(Ordering::SeqCst)
}

macro_rules! export {
    ($name:literal, $f:path) => {
        Export::new($name, $f as usize, Signature::Unmanaged)
    };
    ($name:literal, $f:path, $signature:expr) => {
        Export::new($name, $f as usize, $signature)
    };
}

/// Build the export table of the component.
///
/// # Arguments
///
/// * `component_type` - The type name activation requests must name.
pub fn standard_exports(component_type: &str) -> Result<ExportTable> {
    TABLE_LOADS.fetch_add(1, Ordering::SeqCst);

    let exports = [
        export!("initialize", isobridge_initialize),
        export!("create_isolation_context", isobridge_create_isolation_context),
        export!("unload_isolation_context", isobridge_unload_isolation_context),
        export!("get_isolation_context_id", isobridge_get_isolation_context_id),
        export!("get_export", isobridge_get_export),
        export!("release_handle", isobridge_release_handle),
        export!("handle_to_string", isobridge_handle_to_string),
        export!("get_last_exception", isobridge_get_last_exception),
        export!("get_version", isobridge_get_version, Signature::Named(STRING_WRITER)),
        export!("deisolate", isobridge_deisolate),
        export!("component_main", isobridge_component_main, Signature::ComponentEntryPoint),
        export!("load_bundle", isobridge_load_bundle),
        export!("query_bundle_objects", isobridge_query_bundle_objects),
        export!("read_queried_bundle_object", isobridge_read_queried_bundle_object),
        export!("try_get_object_id", isobridge_try_get_object_id),
        export!("try_get_object_size", isobridge_try_get_object_size),
        export!("try_get_object_offset", isobridge_try_get_object_offset),
        export!("get_object_type", isobridge_get_object_type),
        export!("get_object_simplified_type", isobridge_get_object_simplified_type),
        export!("instantiate_bundle_item", isobridge_instantiate_bundle_item),
        export!(
            "instantiate_bundle_item_by_object_id",
            isobridge_instantiate_bundle_item_by_object_id
        ),
        export!("try_export_object", isobridge_try_export_object),
        export!("is_image", isobridge_is_image),
        export!("get_image_mip_levels", isobridge_get_image_mip_levels),
        export!("get_image_width", isobridge_get_image_width),
        export!("get_image_height", isobridge_get_image_height),
        export!("get_image_depth", isobridge_get_image_depth),
        export!("get_image_dimensions", isobridge_get_image_dimensions),
        export!("get_image_format", isobridge_get_image_format),
        export!("get_image_texture_type", isobridge_get_image_texture_type),
        export!("try_convert_image_to_buffer", isobridge_try_convert_image_to_buffer),
        export!("try_convert_image_to_stream", isobridge_try_convert_image_to_stream),
        export!("try_export_image", isobridge_try_export_image),
    ];

    let mut table = ExportTable::new(component_type);
    for export in exports {
        table.publish(export)?;
    }
    Ok(table)
}

/// Loads the component into a domain.
#[derive(Debug, Clone)]
pub struct BridgeLoader {
    component_type: String,
}

impl BridgeLoader {
    /// Create a loader publishing under `component_type`.
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
        }
    }
}

impl DomainLoader for BridgeLoader {
    fn load(&self, image: &Path) -> Result<DomainImage> {
        let exports = standard_exports(&self.component_type)?;
        debug!(image = %image.display(), exports = exports.len(), "Loaded component image");
        Ok(DomainImage::new(exports).with_services(ContentEngine::new()))
    }

    /// Isolated domains start with their engine initialized.
    fn started(&self, domain: &Arc<Domain>) -> Result<()> {
        let engine = domain
            .services::<ContentEngine>()
            .ok_or(ContentError::NotInitialized)?;
        engine.initialize();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_exports() {
        let table = standard_exports("isobridge::exports").unwrap();
        assert_eq!(table.component_type(), "isobridge::exports");
        assert_eq!(table.len(), 33);
        assert_eq!(
            table.get("component_main").unwrap().signature(),
            Signature::ComponentEntryPoint
        );
        assert_eq!(
            table.get("load_bundle").unwrap().addr(),
            isobridge_load_bundle as usize
        );
        assert!(table.get("activate_component").is_none());
    }

    #[test]
    fn test_loads_are_independent() {
        let loader = BridgeLoader::new("isobridge::exports");
        let first = loader.load(Path::new("component")).unwrap();
        let second = loader.load(Path::new("component")).unwrap();
        let first = first.services.unwrap();
        let second = second.services.unwrap();
        assert!(!std::sync::Arc::ptr_eq(&first, &second));
        assert!(first.downcast_ref::<ContentEngine>().is_some());
    }
}
