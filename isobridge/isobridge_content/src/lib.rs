//! # Isobridge Content
//!
//! The content engine each isolation domain hosts. Bundles are described by
//! JSON manifests; their objects can be queried by glob, identified, located
//! and instantiated as images or raw objects.

pub mod bundle;
pub mod dds;
pub mod engine;
pub mod glob;
pub mod image;
pub mod manifest;
pub mod object_id;
pub mod query;

pub use bundle::Bundle;
pub use dds::PixelFormat;
pub use engine::{ContentEngine, ObjectLocation};
pub use image::{BundleObject, Image, MipLevel};
pub use manifest::{AssetEntry, BundleManifest, ImageInfo};
pub use object_id::ObjectId;
pub use query::QueryCursor;
