//! Image objects.

use std::fmt;

use isobridge_core::error::{ContentError, Result};

use crate::dds::{self, PixelFormat};
use crate::manifest::ImageInfo;

/// Dimensions of one mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipLevel {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Depth in pixels.
    pub depth: u32,
}

/// An instantiated image asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    url: String,
    format: String,
    texture_type: String,
    mips: Vec<MipLevel>,
    texels: Vec<u8>,
}

impl Image {
    /// Build an image from its manifest metadata.
    ///
    /// Each mip level halves the previous one, never going below one pixel.
    /// Levels beyond the 1x1x1 level are dropped.
    pub fn from_info(url: &str, info: &ImageInfo) -> Self {
        let levels = info.mip_levels.clamp(1, info.max_mip_levels());
        let mut mips = Vec::with_capacity(levels as usize);
        let (mut width, mut height, mut depth) =
            (info.width.max(1), info.height.max(1), info.depth.max(1));
        for _ in 0..levels {
            mips.push(MipLevel {
                width,
                height,
                depth,
            });
            width = (width / 2).max(1);
            height = (height / 2).max(1);
            depth = (depth / 2).max(1);
        }

        Self {
            url: url.to_string(),
            format: info.format.clone(),
            texture_type: info.texture_type.clone(),
            mips,
            texels: Vec::new(),
        }
    }

    /// Attach the texel bytes of the whole mip chain, largest level first.
    pub fn with_texels(mut self, texels: Vec<u8>) -> Self {
        self.texels = texels;
        self
    }

    /// The url the image was instantiated from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pixel format name.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Texture type name.
    pub fn texture_type(&self) -> &str {
        &self.texture_type
    }

    /// Number of mip levels.
    pub fn mip_levels(&self) -> usize {
        self.mips.len()
    }

    /// One mip level, if it exists.
    pub fn mip(&self, level: i32) -> Option<MipLevel> {
        usize::try_from(level).ok().and_then(|i| self.mips.get(i).copied())
    }

    /// Encode the image as a DDS file.
    ///
    /// `None` encodes the whole mip chain; `Some(level)` encodes that level
    /// alone.
    pub fn encode_dds(&self, mip: Option<usize>) -> Result<Vec<u8>> {
        let format = PixelFormat::from_name(&self.format)
            .ok_or_else(|| ContentError::UnsupportedFormat(self.format.clone()))?;

        let lengths = dds::chain_lengths(format, &self.mips);
        let needed = dds::chain_len(&lengths);
        if (self.texels.len() as u64) < needed {
            return Err(ContentError::IncompleteImage(format!(
                "{} holds {} texel bytes, its mip chain needs {}",
                self.url,
                self.texels.len(),
                needed
            ))
            .into());
        }

        let Some(level) = mip else {
            return dds::encode(format, &self.mips, &self.texels[..needed as usize]);
        };

        let top = self.mips.get(level).ok_or_else(|| {
            ContentError::IncompleteImage(format!("{} has no mip level {}", self.url, level))
        })?;
        let start = dds::chain_len(&lengths[..level]);
        let end = start + lengths[level];
        dds::encode(format, &[*top], &self.texels[start as usize..end as usize])
    }

    /// Number of dimensions: 1, 2 or 3.
    pub fn dimensions(&self) -> u32 {
        match self.mips.first() {
            Some(top) if top.depth > 1 => 3,
            Some(top) if top.height > 1 => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mips.first() {
            Some(top) => write!(
                f,
                "{} ({} {}x{}, {} mips)",
                self.url,
                self.format,
                top.width,
                top.height,
                self.mips.len()
            ),
            None => write!(f, "{} ({})", self.url, self.format),
        }
    }
}

/// An instantiated non-image asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleObject {
    /// The object url.
    pub url: String,

    /// Fully qualified type name.
    pub type_name: String,

    /// The object bytes.
    pub bytes: Vec<u8>,
}

impl fmt::Display for BundleObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {} bytes)", self.url, self.type_name, self.bytes.len())
    }
}
