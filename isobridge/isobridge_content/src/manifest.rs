//! Bundle manifests.
//!
//! A bundle is described by a JSON manifest listing its assets. Asset bytes
//! live in an optional data file next to the manifest, addressed by offset
//! and size.

use serde::{Deserialize, Serialize};
use std::path::Path;

use isobridge_core::error::{ContentError, Result};

use crate::object_id::ObjectId;

/// Image metadata for image assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Pixel format name, e.g. `BC1` or `R8G8B8A8`.
    pub format: String,

    /// Texture type name.
    #[serde(default = "default_texture_type")]
    pub texture_type: String,

    /// Width of the top mip level.
    pub width: u32,

    /// Height of the top mip level.
    pub height: u32,

    /// Depth of the top mip level.
    #[serde(default = "default_one")]
    pub depth: u32,

    /// Number of mip levels.
    #[serde(default = "default_one")]
    pub mip_levels: u32,
}

impl ImageInfo {
    /// The most mip levels the top level's dimensions allow.
    pub fn max_mip_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth).max(1);
        u32::BITS - largest.leading_zeros()
    }
}

fn default_texture_type() -> String {
    "Texture2D".to_string()
}

fn default_one() -> u32 {
    1
}

/// One asset entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// The asset url, unique within the bundle.
    pub url: String,

    /// Explicit object id; derived from the url when absent.
    #[serde(default)]
    pub id: Option<ObjectId>,

    /// Fully qualified type name.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Short type name; the last segment of `type` when absent.
    #[serde(default)]
    pub simplified_type: Option<String>,

    /// Offset of the asset bytes in the data file.
    #[serde(default)]
    pub offset: u64,

    /// Size of the asset bytes.
    #[serde(default)]
    pub size: u64,

    /// Image metadata, for image assets.
    #[serde(default)]
    pub image: Option<ImageInfo>,
}

impl AssetEntry {
    /// The asset's object id.
    pub fn object_id(&self) -> ObjectId {
        self.id.unwrap_or_else(|| ObjectId::for_url(&self.url))
    }

    /// The short type name.
    pub fn simplified_type(&self) -> &str {
        match &self.simplified_type {
            Some(simple) => simple,
            None => {
                let base = self.type_name.split(',').next().unwrap_or(&self.type_name);
                base.rsplit(['.', ':']).next().unwrap_or(base).trim()
            }
        }
    }
}

/// A parsed bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    /// The bundle name.
    pub name: String,

    /// Data file, relative to the manifest.
    #[serde(default)]
    pub data: Option<String>,

    /// The assets, in query order.
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
}

impl BundleManifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let manifest: BundleManifest = serde_json::from_str(text)
            .map_err(|e| ContentError::InvalidBundle(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ContentError::BundleNotFound(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ContentError::InvalidBundle("bundle name is empty".into()).into());
        }

        let mut urls = std::collections::HashSet::new();
        for asset in &self.assets {
            if asset.url.is_empty() {
                return Err(ContentError::InvalidBundle("asset url is empty".into()).into());
            }
            if !urls.insert(asset.url.as_str()) {
                return Err(ContentError::InvalidBundle(format!(
                    "duplicate asset url '{}'",
                    asset.url
                ))
                .into());
            }
            if let Some(image) = &asset.image {
                if image.mip_levels > image.max_mip_levels() {
                    return Err(ContentError::InvalidBundle(format!(
                        "asset '{}' declares {} mip levels, at most {} fit {}x{}x{}",
                        asset.url,
                        image.mip_levels,
                        image.max_mip_levels(),
                        image.width,
                        image.height,
                        image.depth
                    ))
                    .into());
                }
            }
            if asset.offset.checked_add(asset.size).is_none() {
                return Err(ContentError::InvalidBundle(format!(
                    "asset '{}' extends past the addressable range",
                    asset.url
                ))
                .into());
            }
        }
        Ok(())
    }
}
