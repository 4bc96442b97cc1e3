//! The content engine.
//!
//! Each isolation domain owns one engine. Engines keep every loaded bundle
//! and an index from object ids and urls to the assets that define them.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use isobridge_core::error::{ContentError, Result};
use isobridge_core::HandleTarget;

use crate::bundle::Bundle;
use crate::glob::Pattern;
use crate::image::{BundleObject, Image};
use crate::manifest::AssetEntry;
use crate::object_id::ObjectId;
use crate::query::QueryCursor;

/// Where an object's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    /// Offset of the first byte.
    pub start: u64,

    /// Offset one past the last byte.
    pub end: u64,

    /// The file the offsets refer to.
    pub source: PathBuf,
}

#[derive(Clone)]
struct IndexEntry {
    bundle: Arc<Bundle>,
    index: usize,
}

impl IndexEntry {
    fn asset(&self) -> &AssetEntry {
        &self.bundle.assets()[self.index]
    }
}

/// A content engine instance.
#[derive(Default)]
pub struct ContentEngine {
    initialized: AtomicBool,
    bundles: RwLock<Vec<Arc<Bundle>>>,
    objects: DashMap<ObjectId, IndexEntry>,
    urls: DashMap<String, ObjectId>,
}

impl ContentEngine {
    /// Create an uninitialized engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize the engine. Repeated calls are no-ops.
    pub fn initialize(&self) {
        if !self.initialized.swap(true, Ordering::SeqCst) {
            debug!("Content engine initialized");
        }
    }

    /// Whether [`initialize`](Self::initialize) has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(ContentError::NotInitialized.into())
        }
    }

    /// Load a bundle, or return it if it is already loaded.
    pub fn load_bundle(&self, path: &Path) -> Result<Arc<Bundle>> {
        self.ensure_initialized()?;

        let manifest_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(existing) = self
            .bundles
            .read()
            .iter()
            .find(|b| b.manifest_path() == manifest_path)
        {
            return Ok(Arc::clone(existing));
        }

        let bundle = Arc::new(Bundle::open(&manifest_path)?);

        let mut bundles = self.bundles.write();
        if let Some(existing) = bundles
            .iter()
            .find(|b| b.manifest_path() == bundle.manifest_path())
        {
            return Ok(Arc::clone(existing));
        }

        for (index, asset) in bundle.assets().iter().enumerate() {
            let id = asset.object_id();
            if self.objects.contains_key(&id) {
                debug!(url = %asset.url, %id, "Object already provided by another bundle");
                continue;
            }
            self.objects.insert(
                id,
                IndexEntry {
                    bundle: Arc::clone(&bundle),
                    index,
                },
            );
            self.urls.insert(asset.url.clone(), id);
        }

        bundles.push(Arc::clone(&bundle));
        info!(bundle = bundle.name(), assets = bundle.assets().len(), "Loaded bundle");
        Ok(bundle)
    }

    /// The loaded bundles in load order.
    pub fn bundles(&self) -> Vec<Arc<Bundle>> {
        self.bundles.read().clone()
    }

    /// Query the urls of a bundle's objects.
    ///
    /// `None` and `**` match everything. Returns `None` when nothing matches.
    pub fn query(&self, bundle: &Bundle, pattern: Option<&str>) -> Option<QueryCursor> {
        let pattern = Pattern::new(pattern.unwrap_or("**"));
        let urls: Vec<String> = bundle
            .assets()
            .iter()
            .filter(|asset| pattern.matches(&asset.url))
            .map(|asset| asset.url.clone())
            .collect();

        if urls.is_empty() {
            return None;
        }
        Some(QueryCursor::new(pattern.as_str().to_string(), urls))
    }

    fn entry(&self, id: &ObjectId) -> Option<IndexEntry> {
        self.objects.get(id).map(|entry| entry.value().clone())
    }

    /// The id of the object at `url`.
    pub fn object_id(&self, url: &str) -> Option<ObjectId> {
        self.urls.get(url).map(|id| *id.value())
    }

    /// The size of an object in bytes.
    pub fn object_size(&self, id: &ObjectId) -> Option<u64> {
        self.entry(id).map(|entry| entry.asset().size)
    }

    /// Where an object's bytes live.
    pub fn object_location(&self, id: &ObjectId) -> Option<ObjectLocation> {
        let entry = self.entry(id)?;
        let asset = entry.asset();
        Some(ObjectLocation {
            start: asset.offset,
            end: asset.offset + asset.size,
            source: entry.bundle.source_path().to_path_buf(),
        })
    }

    /// The fully qualified type name of an object.
    pub fn object_type(&self, id: &ObjectId) -> Option<String> {
        self.entry(id).map(|entry| entry.asset().type_name.clone())
    }

    /// The short type name of an object.
    pub fn simplified_type(&self, id: &ObjectId) -> Option<String> {
        self.entry(id)
            .map(|entry| entry.asset().simplified_type().to_string())
    }

    /// Instantiate the object at `url`.
    pub fn instantiate(&self, url: &str) -> Result<Arc<dyn HandleTarget>> {
        let id = self
            .object_id(url)
            .ok_or_else(|| ContentError::ObjectNotFound(url.to_string()))?;
        self.instantiate_by_id(&id)
    }

    /// Instantiate an object by id.
    ///
    /// Image assets become [`Image`]s carrying their texels; everything else
    /// becomes a [`BundleObject`] holding the asset bytes.
    pub fn instantiate_by_id(&self, id: &ObjectId) -> Result<Arc<dyn HandleTarget>> {
        self.ensure_initialized()?;
        let entry = self
            .entry(id)
            .ok_or_else(|| ContentError::ObjectNotFound(id.to_string()))?;
        let asset = entry.asset();

        if let Some(info) = &asset.image {
            let texels = entry.bundle.read_bytes(asset)?;
            return Ok(Arc::new(Image::from_info(&asset.url, info).with_texels(texels)));
        }

        Ok(Arc::new(BundleObject {
            url: asset.url.clone(),
            type_name: asset.type_name.clone(),
            bytes: entry.bundle.read_bytes(asset)?,
        }))
    }

    /// Write an object's bytes to `path`.
    ///
    /// Returns `false` if the object is unknown.
    pub fn export_object(&self, id: &ObjectId, path: &Path) -> Result<bool> {
        self.ensure_initialized()?;
        let Some(entry) = self.entry(id) else {
            return Ok(false);
        };
        let bytes = entry.bundle.read_bytes(entry.asset())?;
        std::fs::write(path, bytes)?;
        debug!(%id, path = %path.display(), "Exported object");
        Ok(true)
    }
}
