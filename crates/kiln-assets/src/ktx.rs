//! KTX2 container parsing.
//!
//! KTX2 stores mip levels outermost, each level holding all array layers
//! and faces. The parser reorders into the layer-outer, mip-inner packing
//! [`TextureData`] requires. Supercompressed containers are rejected.

use crate::error::{AssetError, Result};
use crate::texture::{image_byte_size, TextureData, TextureKind};
use ash::vk;
use kiln_core::ByteStorage;
use std::path::Path;

/// Parse a KTX2 file from disk.
pub(crate) fn parse_file(path: &Path) -> Result<TextureData> {
    let storage = ByteStorage::from_file(path)?;
    parse(&storage)
}

/// Parse KTX2 bytes.
pub(crate) fn parse(storage: &ByteStorage) -> Result<TextureData> {
    let reader = ktx2::Reader::new(storage.data())
        .map_err(|e| AssetError::InvalidData(format!("KTX2: {e:?}")))?;
    let header = reader.header();

    if header.supercompression_scheme.is_some() {
        return Err(AssetError::UnsupportedFormat(
            "supercompressed KTX2".to_string(),
        ));
    }
    if header.pixel_depth > 1 {
        return Err(AssetError::UnsupportedFormat(
            "3D KTX2 texture".to_string(),
        ));
    }

    let format = header
        .format
        .ok_or_else(|| AssetError::UnsupportedFormat("KTX2 without an explicit format".to_string()))?;
    let format = map_format(format)
        .ok_or_else(|| AssetError::UnsupportedFormat(format!("KTX2 format {format:?}")))?;

    let mip_levels = header.level_count.max(1);
    let array_layers = header.layer_count.max(1);
    let faces = header.face_count.max(1);
    let layer_count = array_layers * faces;

    let kind = if faces == 6 {
        TextureKind::Cube
    } else if array_layers > 1 {
        TextureKind::D2Array
    } else {
        TextureKind::D2
    };

    let extent = vk::Extent2D {
        width: header.pixel_width,
        height: header.pixel_height.max(1),
    };

    let levels: Vec<&[u8]> = reader.levels().collect();
    if levels.len() != mip_levels as usize {
        return Err(AssetError::InvalidData(format!(
            "KTX2 declares {mip_levels} levels but stores {}",
            levels.len()
        )));
    }

    // Per-mip sub-image sizes; each stored level holds `layer_count` of them.
    let mut sub_sizes = Vec::with_capacity(mip_levels as usize);
    for mip in 0..mip_levels {
        let mip_extent = vk::Extent2D {
            width: (extent.width >> mip).max(1),
            height: (extent.height >> mip).max(1),
        };
        let size = image_byte_size(format, mip_extent)
            .ok_or_else(|| AssetError::UnsupportedFormat(format!("pixel format {format:?}")))?;
        sub_sizes.push(size as usize);
    }

    // Reorder mip-outer (container) into layer-outer (upload packing).
    let total: usize = sub_sizes.iter().sum::<usize>() * layer_count as usize;
    let mut data = Vec::with_capacity(total);
    for layer in 0..layer_count as usize {
        for (mip, &size) in sub_sizes.iter().enumerate() {
            let start = layer * size;
            let slice = levels[mip].get(start..start + size).ok_or_else(|| {
                AssetError::InvalidData(format!(
                    "KTX2 level {mip} holds {} bytes, expected at least {}",
                    levels[mip].len(),
                    (layer + 1) * size
                ))
            })?;
            data.extend_from_slice(slice);
        }
    }

    TextureData::new(kind, format, extent, mip_levels, layer_count, data)
}

/// Map the KTX2 formats the loader accepts onto Vulkan formats.
pub(crate) fn map_format(format: ktx2::Format) -> Option<vk::Format> {
    match format {
        ktx2::Format::R8_UNORM => Some(vk::Format::R8_UNORM),
        ktx2::Format::R8G8_UNORM => Some(vk::Format::R8G8_UNORM),
        ktx2::Format::R8G8B8A8_UNORM => Some(vk::Format::R8G8B8A8_UNORM),
        ktx2::Format::R8G8B8A8_SRGB => Some(vk::Format::R8G8B8A8_SRGB),
        ktx2::Format::B8G8R8A8_UNORM => Some(vk::Format::B8G8R8A8_UNORM),
        ktx2::Format::B8G8R8A8_SRGB => Some(vk::Format::B8G8R8A8_SRGB),
        ktx2::Format::R16G16B16A16_SFLOAT => Some(vk::Format::R16G16B16A16_SFLOAT),
        ktx2::Format::R32G32B32A32_SFLOAT => Some(vk::Format::R32G32B32A32_SFLOAT),
        ktx2::Format::BC1_RGB_UNORM_BLOCK => Some(vk::Format::BC1_RGB_UNORM_BLOCK),
        ktx2::Format::BC1_RGB_SRGB_BLOCK => Some(vk::Format::BC1_RGB_SRGB_BLOCK),
        ktx2::Format::BC1_RGBA_UNORM_BLOCK => Some(vk::Format::BC1_RGBA_UNORM_BLOCK),
        ktx2::Format::BC1_RGBA_SRGB_BLOCK => Some(vk::Format::BC1_RGBA_SRGB_BLOCK),
        ktx2::Format::BC2_UNORM_BLOCK => Some(vk::Format::BC2_UNORM_BLOCK),
        ktx2::Format::BC2_SRGB_BLOCK => Some(vk::Format::BC2_SRGB_BLOCK),
        ktx2::Format::BC3_UNORM_BLOCK => Some(vk::Format::BC3_UNORM_BLOCK),
        ktx2::Format::BC3_SRGB_BLOCK => Some(vk::Format::BC3_SRGB_BLOCK),
        ktx2::Format::BC4_UNORM_BLOCK => Some(vk::Format::BC4_UNORM_BLOCK),
        ktx2::Format::BC4_SNORM_BLOCK => Some(vk::Format::BC4_SNORM_BLOCK),
        ktx2::Format::BC5_UNORM_BLOCK => Some(vk::Format::BC5_UNORM_BLOCK),
        ktx2::Format::BC5_SNORM_BLOCK => Some(vk::Format::BC5_SNORM_BLOCK),
        ktx2::Format::BC6H_UFLOAT_BLOCK => Some(vk::Format::BC6H_UFLOAT_BLOCK),
        ktx2::Format::BC6H_SFLOAT_BLOCK => Some(vk::Format::BC6H_SFLOAT_BLOCK),
        ktx2::Format::BC7_UNORM_BLOCK => Some(vk::Format::BC7_UNORM_BLOCK),
        ktx2::Format::BC7_SRGB_BLOCK => Some(vk::Format::BC7_SRGB_BLOCK),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_formats_map_to_vulkan() {
        assert_eq!(
            map_format(ktx2::Format::R8G8B8A8_SRGB),
            Some(vk::Format::R8G8B8A8_SRGB)
        );
        assert_eq!(
            map_format(ktx2::Format::BC7_UNORM_BLOCK),
            Some(vk::Format::BC7_UNORM_BLOCK)
        );
        assert_eq!(map_format(ktx2::Format::R64_SFLOAT), None);
    }

    #[test]
    fn truncated_input_is_invalid() {
        let storage = ByteStorage::from_vec(vec![0u8; 16]);
        assert!(matches!(
            parse(&storage),
            Err(AssetError::InvalidData(_))
        ));
    }
}
