//! Loaded bundles.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use isobridge_core::error::{ContentError, Result};

use crate::manifest::{AssetEntry, BundleManifest};

/// A bundle loaded from a manifest.
#[derive(Debug)]
pub struct Bundle {
    name: String,
    manifest_path: PathBuf,
    data_path: Option<PathBuf>,
    assets: Vec<AssetEntry>,
}

impl Bundle {
    /// Open a bundle manifest.
    pub fn open(path: &Path) -> Result<Self> {
        let manifest = BundleManifest::read(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let data_path = manifest.data.as_ref().map(|data| base.join(data));

        Ok(Self {
            name: manifest.name,
            manifest_path: path.to_path_buf(),
            data_path,
            assets: manifest.assets,
        })
    }

    /// The bundle name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The manifest the bundle was loaded from.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// The data file holding asset bytes, if any.
    pub fn data_path(&self) -> Option<&Path> {
        self.data_path.as_deref()
    }

    /// The file asset offsets refer to.
    pub fn source_path(&self) -> &Path {
        self.data_path.as_deref().unwrap_or(&self.manifest_path)
    }

    /// The assets in manifest order.
    pub fn assets(&self) -> &[AssetEntry] {
        &self.assets
    }

    /// Read an asset's bytes from the data file.
    pub fn read_bytes(&self, asset: &AssetEntry) -> Result<Vec<u8>> {
        if asset.size == 0 {
            return Ok(Vec::new());
        }

        let data_path = self.data_path.as_ref().ok_or_else(|| {
            ContentError::ObjectNotFound(format!("bundle '{}' has no data file", self.name))
        })?;

        let mut file = File::open(data_path)?;
        let available = file.metadata()?.len();
        let end = asset.offset.checked_add(asset.size);
        if end.map_or(true, |end| end > available) {
            return Err(ContentError::InvalidBundle(format!(
                "asset '{}' extends past the end of {} ({} bytes)",
                asset.url,
                data_path.display(),
                available
            ))
            .into());
        }

        file.seek(SeekFrom::Start(asset.offset))?;
        let mut bytes = Vec::new();
        file.take(asset.size).read_to_end(&mut bytes)?;
        if bytes.len() as u64 != asset.size {
            return Err(ContentError::InvalidBundle(format!(
                "asset '{}' was truncated while reading",
                asset.url
            ))
            .into());
        }
        Ok(bytes)
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bundle {} ({} assets)", self.name, self.assets.len())
    }
}
