//! Asset loading for kiln.
//!
//! This crate provides:
//! - Explicit asset path resolution
//! - Mesh import (OBJ via tobj, glTF via the gltf crate) driven by a
//!   caller-supplied vertex layout
//! - Texture loading from KTX2 and DDS containers
//! - Offline PNG → KTX2 conversion glue
//!
//! All loaders take the [`kiln_gpu::GpuContext`] (or nothing, for the
//! CPU-side intermediates) explicitly; there is no global state.

pub mod convert;
mod dds;
pub mod error;
mod gltf_import;
mod ktx;
pub mod model;
mod obj;
pub mod resolver;
pub mod texture;

pub use convert::png_to_ktx2;
pub use error::{AssetError, Result};
pub use model::{ImportFlags, ImportTransform, Model, ModelData, ModelPart, SourceVertex};
pub use resolver::AssetResolver;
pub use texture::{
    format_block_info, image_byte_size, BlockInfo, Texture, TextureData, TextureKind,
};
