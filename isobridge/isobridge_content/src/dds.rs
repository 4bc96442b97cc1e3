//! DDS encoding of images.
//!
//! Texel data is written as stored in the bundle behind a legacy DDS header,
//! so block-compressed formats stay compressed.

use isobridge_core::error::{ContentError, Result};

use crate::image::MipLevel;

const MAGIC: &[u8; 4] = b"DDS ";
const HEADER_SIZE: u32 = 124;
const PIXEL_FORMAT_SIZE: u32 = 32;

const DDSD_CAPS: u32 = 0x1;
const DDSD_HEIGHT: u32 = 0x2;
const DDSD_WIDTH: u32 = 0x4;
const DDSD_PITCH: u32 = 0x8;
const DDSD_PIXELFORMAT: u32 = 0x1000;
const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;
const DDSD_LINEARSIZE: u32 = 0x8_0000;
const DDSD_DEPTH: u32 = 0x80_0000;

const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;

const DDSCAPS_COMPLEX: u32 = 0x8;
const DDSCAPS_TEXTURE: u32 = 0x1000;
const DDSCAPS_MIPMAP: u32 = 0x40_0000;
const DDSCAPS2_VOLUME: u32 = 0x20_0000;

/// Pixel formats that can be written to a DDS container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit RGBA, one byte per channel.
    Rgba8,
    /// 32-bit BGRA, one byte per channel.
    Bgra8,
    /// BC1 / DXT1.
    Bc1,
    /// BC2 / DXT3.
    Bc2,
    /// BC3 / DXT5.
    Bc3,
    /// BC4, one channel.
    Bc4,
    /// BC5, two channels.
    Bc5,
}

impl PixelFormat {
    /// Parse a bundle format name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "R8G8B8A8" | "R8G8B8A8_UNORM" | "RGBA32" => Some(Self::Rgba8),
            "B8G8R8A8" | "B8G8R8A8_UNORM" | "BGRA32" => Some(Self::Bgra8),
            "BC1" | "BC1_UNORM" | "DXT1" => Some(Self::Bc1),
            "BC2" | "BC2_UNORM" | "DXT3" => Some(Self::Bc2),
            "BC3" | "BC3_UNORM" | "DXT5" => Some(Self::Bc3),
            "BC4" | "BC4_UNORM" => Some(Self::Bc4),
            "BC5" | "BC5_UNORM" => Some(Self::Bc5),
            _ => None,
        }
    }

    /// Bytes per 4x4 block, for block-compressed formats.
    fn block_size(self) -> Option<u64> {
        match self {
            Self::Rgba8 | Self::Bgra8 => None,
            Self::Bc1 | Self::Bc4 => Some(8),
            Self::Bc2 | Self::Bc3 | Self::Bc5 => Some(16),
        }
    }

    /// Number of bytes one mip level occupies.
    pub fn level_len(self, level: &MipLevel) -> u64 {
        let (width, height, depth) = (
            u64::from(level.width),
            u64::from(level.height),
            u64::from(level.depth),
        );
        let (columns, rows, unit) = match self.block_size() {
            Some(block) => (width.div_ceil(4).max(1), height.div_ceil(4).max(1), block),
            None => (width, height, 4),
        };
        columns
            .saturating_mul(rows)
            .saturating_mul(depth)
            .saturating_mul(unit)
    }

    fn four_cc(self) -> Option<[u8; 4]> {
        match self {
            Self::Rgba8 | Self::Bgra8 => None,
            Self::Bc1 => Some(*b"DXT1"),
            Self::Bc2 => Some(*b"DXT3"),
            Self::Bc3 => Some(*b"DXT5"),
            Self::Bc4 => Some(*b"ATI1"),
            Self::Bc5 => Some(*b"ATI2"),
        }
    }

    fn channel_masks(self) -> [u32; 4] {
        match self {
            Self::Rgba8 => [0x0000_00ff, 0x0000_ff00, 0x00ff_0000, 0xff00_0000],
            Self::Bgra8 => [0x00ff_0000, 0x0000_ff00, 0x0000_00ff, 0xff00_0000],
            _ => [0; 4],
        }
    }
}

/// Total byte length of a mip chain.
pub(crate) fn chain_len(lengths: &[u64]) -> u64 {
    lengths.iter().fold(0u64, |total, len| total.saturating_add(*len))
}

/// The byte length of every level of a mip chain.
pub(crate) fn chain_lengths(format: PixelFormat, mips: &[MipLevel]) -> Vec<u64> {
    mips.iter().map(|level| format.level_len(level)).collect()
}

/// Encode `levels` (the first one being the largest) as a DDS file.
///
/// `texels` must hold exactly the concatenated bytes of the levels.
pub fn encode(format: PixelFormat, levels: &[MipLevel], texels: &[u8]) -> Result<Vec<u8>> {
    let top = levels
        .first()
        .ok_or_else(|| ContentError::IncompleteImage("image has no mip levels".into()))?;

    let expected = chain_len(&chain_lengths(format, levels));
    if expected != texels.len() as u64 {
        return Err(ContentError::IncompleteImage(format!(
            "{} texel bytes for a chain of {} bytes",
            texels.len(),
            expected
        ))
        .into());
    }

    let mip_count = u32::try_from(levels.len()).unwrap_or(u32::MAX);
    let compressed = format.block_size().is_some();
    let pitch = if compressed {
        format.level_len(top)
    } else {
        u64::from(top.width) * 4
    };

    let mut flags = DDSD_CAPS | DDSD_HEIGHT | DDSD_WIDTH | DDSD_PIXELFORMAT;
    flags |= if compressed { DDSD_LINEARSIZE } else { DDSD_PITCH };
    let mut caps = DDSCAPS_TEXTURE;
    let mut caps2 = 0;
    if mip_count > 1 {
        flags |= DDSD_MIPMAPCOUNT;
        caps |= DDSCAPS_COMPLEX | DDSCAPS_MIPMAP;
    }
    if top.depth > 1 {
        flags |= DDSD_DEPTH;
        caps |= DDSCAPS_COMPLEX;
        caps2 |= DDSCAPS2_VOLUME;
    }

    let mut out = Vec::with_capacity(4 + HEADER_SIZE as usize + texels.len());
    out.extend_from_slice(MAGIC);
    let mut put = |value: u32| out.extend_from_slice(&value.to_le_bytes());

    put(HEADER_SIZE);
    put(flags);
    put(top.height);
    put(top.width);
    put(u32::try_from(pitch).unwrap_or(u32::MAX));
    put(top.depth);
    put(mip_count);
    for _ in 0..11 {
        put(0);
    }

    put(PIXEL_FORMAT_SIZE);
    match format.four_cc() {
        Some(four_cc) => {
            put(DDPF_FOURCC);
            put(u32::from_le_bytes(four_cc));
            for _ in 0..5 {
                put(0);
            }
        }
        None => {
            put(DDPF_RGB | DDPF_ALPHAPIXELS);
            put(0);
            put(32);
            for mask in format.channel_masks() {
                put(mask);
            }
        }
    }

    put(caps);
    put(caps2);
    for _ in 0..3 {
        put(0);
    }

    out.extend_from_slice(texels);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(width: u32, height: u32) -> MipLevel {
        MipLevel {
            width,
            height,
            depth: 1,
        }
    }

    fn word(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_level_lengths() {
        assert_eq!(PixelFormat::Bc1.level_len(&level(64, 32)), 1024);
        assert_eq!(PixelFormat::Bc1.level_len(&level(1, 1)), 8);
        assert_eq!(PixelFormat::Bc3.level_len(&level(8, 8)), 64);
        assert_eq!(PixelFormat::Rgba8.level_len(&level(2, 2)), 16);
        assert_eq!(PixelFormat::from_name("dxt5"), Some(PixelFormat::Bc3));
        assert_eq!(PixelFormat::from_name("ASTC_4x4"), None);
    }

    #[test]
    fn test_uncompressed_header() {
        let texels: Vec<u8> = (0..20).collect();
        let dds = encode(PixelFormat::Rgba8, &[level(2, 2), level(1, 1)], &texels).unwrap();

        assert_eq!(&dds[..4], b"DDS ");
        assert_eq!(dds.len(), 128 + 20);
        assert_eq!(word(&dds, 4), 124);
        assert_eq!((word(&dds, 12), word(&dds, 16)), (2, 2));
        assert_eq!(word(&dds, 20), 8);
        assert_eq!(word(&dds, 28), 2);
        assert_eq!(word(&dds, 76), 32);
        assert_eq!(word(&dds, 80), DDPF_RGB | DDPF_ALPHAPIXELS);
        assert_eq!(word(&dds, 88), 32);
        assert_eq!(word(&dds, 92), 0xff);
        assert_ne!(word(&dds, 8) & DDSD_MIPMAPCOUNT, 0);
        assert_eq!(&dds[128..], texels.as_slice());
    }

    #[test]
    fn test_compressed_header() {
        let texels = vec![0u8; 8];
        let dds = encode(PixelFormat::Bc1, &[level(4, 4)], &texels).unwrap();
        assert_eq!(&dds[84..88], b"DXT1");
        assert_eq!(word(&dds, 20), 8);
        assert_eq!(word(&dds, 8) & DDSD_MIPMAPCOUNT, 0);
        assert_ne!(word(&dds, 8) & DDSD_LINEARSIZE, 0);
    }

    #[test]
    fn test_length_mismatch() {
        let err = encode(PixelFormat::Bc1, &[level(64, 32)], &[0; 4]).unwrap_err();
        assert!(err.to_string().contains("Incomplete image data"));
        assert!(encode(PixelFormat::Bc1, &[], &[]).is_err());
    }
}
