//! DDS container parsing.
//!
//! DDS already stores its data layer-outer (array element or cube face),
//! mip-inner, so the blob is validated and handed to [`TextureData`]
//! unchanged.

use crate::error::{AssetError, Result};
use crate::texture::{TextureData, TextureKind};
use ash::vk;
use kiln_core::ByteStorage;
use std::path::Path;

/// Parse a DDS file from disk.
pub(crate) fn parse_file(path: &Path) -> Result<TextureData> {
    let storage = ByteStorage::from_file(path)?;
    parse(&storage)
}

/// Parse DDS bytes.
pub(crate) fn parse(storage: &ByteStorage) -> Result<TextureData> {
    let dds = ddsfile::Dds::read(storage.data())
        .map_err(|e| AssetError::InvalidData(format!("DDS: {e}")))?;

    let format = dds
        .get_dxgi_format()
        .and_then(map_dxgi_format)
        .or_else(|| dds.get_d3d_format().and_then(map_d3d_format))
        .ok_or_else(|| {
            AssetError::UnsupportedFormat(format!(
                "DDS format (dxgi: {:?}, d3d: {:?})",
                dds.get_dxgi_format(),
                dds.get_d3d_format()
            ))
        })?;

    let extent = vk::Extent2D {
        width: dds.get_width(),
        height: dds.get_height(),
    };
    let mip_levels = dds.get_num_mipmap_levels().max(1);
    let array_layers = dds.get_num_array_layers().max(1);

    let is_cube = dds.header.caps2.contains(ddsfile::Caps2::CUBEMAP);
    let (kind, layer_count) = if is_cube {
        (TextureKind::Cube, 6 * array_layers)
    } else if array_layers > 1 {
        (TextureKind::D2Array, array_layers)
    } else {
        (TextureKind::D2, 1)
    };

    TextureData::new(kind, format, extent, mip_levels, layer_count, dds.data)
}

/// Map the DXGI formats the loader accepts onto Vulkan formats.
pub(crate) fn map_dxgi_format(format: ddsfile::DxgiFormat) -> Option<vk::Format> {
    use ddsfile::DxgiFormat as Dxgi;
    match format {
        Dxgi::R8_UNorm => Some(vk::Format::R8_UNORM),
        Dxgi::R8G8_UNorm => Some(vk::Format::R8G8_UNORM),
        Dxgi::R8G8B8A8_UNorm => Some(vk::Format::R8G8B8A8_UNORM),
        Dxgi::R8G8B8A8_UNorm_sRGB => Some(vk::Format::R8G8B8A8_SRGB),
        Dxgi::B8G8R8A8_UNorm => Some(vk::Format::B8G8R8A8_UNORM),
        Dxgi::B8G8R8A8_UNorm_sRGB => Some(vk::Format::B8G8R8A8_SRGB),
        Dxgi::R16G16B16A16_Float => Some(vk::Format::R16G16B16A16_SFLOAT),
        Dxgi::R32G32B32A32_Float => Some(vk::Format::R32G32B32A32_SFLOAT),
        Dxgi::BC1_UNorm => Some(vk::Format::BC1_RGBA_UNORM_BLOCK),
        Dxgi::BC1_UNorm_sRGB => Some(vk::Format::BC1_RGBA_SRGB_BLOCK),
        Dxgi::BC2_UNorm => Some(vk::Format::BC2_UNORM_BLOCK),
        Dxgi::BC2_UNorm_sRGB => Some(vk::Format::BC2_SRGB_BLOCK),
        Dxgi::BC3_UNorm => Some(vk::Format::BC3_UNORM_BLOCK),
        Dxgi::BC3_UNorm_sRGB => Some(vk::Format::BC3_SRGB_BLOCK),
        Dxgi::BC4_UNorm => Some(vk::Format::BC4_UNORM_BLOCK),
        Dxgi::BC4_SNorm => Some(vk::Format::BC4_SNORM_BLOCK),
        Dxgi::BC5_UNorm => Some(vk::Format::BC5_UNORM_BLOCK),
        Dxgi::BC5_SNorm => Some(vk::Format::BC5_SNORM_BLOCK),
        Dxgi::BC6H_UF16 => Some(vk::Format::BC6H_UFLOAT_BLOCK),
        Dxgi::BC6H_SF16 => Some(vk::Format::BC6H_SFLOAT_BLOCK),
        Dxgi::BC7_UNorm => Some(vk::Format::BC7_UNORM_BLOCK),
        Dxgi::BC7_UNorm_sRGB => Some(vk::Format::BC7_SRGB_BLOCK),
        _ => None,
    }
}

/// Map the legacy (non-DX10) header formats the loader accepts.
pub(crate) fn map_d3d_format(format: ddsfile::D3DFormat) -> Option<vk::Format> {
    use ddsfile::D3DFormat as D3d;
    match format {
        D3d::A8B8G8R8 => Some(vk::Format::R8G8B8A8_UNORM),
        D3d::A8R8G8B8 => Some(vk::Format::B8G8R8A8_UNORM),
        D3d::DXT1 => Some(vk::Format::BC1_RGBA_UNORM_BLOCK),
        D3d::DXT3 => Some(vk::Format::BC2_UNORM_BLOCK),
        D3d::DXT5 => Some(vk::Format::BC3_UNORM_BLOCK),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dxgi_formats_map_to_vulkan() {
        assert_eq!(
            map_dxgi_format(ddsfile::DxgiFormat::BC3_UNorm),
            Some(vk::Format::BC3_UNORM_BLOCK)
        );
        assert_eq!(
            map_dxgi_format(ddsfile::DxgiFormat::R8G8B8A8_UNorm_sRGB),
            Some(vk::Format::R8G8B8A8_SRGB)
        );
        assert_eq!(map_dxgi_format(ddsfile::DxgiFormat::R1_UNorm), None);
    }

    #[test]
    fn legacy_fourcc_formats_map_to_block_compression() {
        assert_eq!(
            map_d3d_format(ddsfile::D3DFormat::DXT1),
            Some(vk::Format::BC1_RGBA_UNORM_BLOCK)
        );
        assert_eq!(
            map_d3d_format(ddsfile::D3DFormat::DXT5),
            Some(vk::Format::BC3_UNORM_BLOCK)
        );
        assert_eq!(map_d3d_format(ddsfile::D3DFormat::R8G8B8), None);
    }

    #[test]
    fn garbage_bytes_are_invalid() {
        let storage = ByteStorage::from_vec(vec![0u8; 64]);
        assert!(matches!(
            parse(&storage),
            Err(AssetError::InvalidData(_))
        ));
    }
}
