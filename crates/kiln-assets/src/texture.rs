//! Texture loading and upload.
//!
//! Container parsers (KTX2, DDS) normalize their contents into a
//! [`TextureData`]: one tightly-packed byte blob ordered layer-outer,
//! mip-inner, plus enough metadata to derive every copy region. Upload goes
//! through the staged transfer layer, after which a view and sampler are
//! created to match the texture kind.

use crate::error::{AssetError, Result};
use crate::{dds, ktx};
use ash::vk;
use kiln_gpu::{GpuContext, GpuImage};
use std::path::Path;

/// Texture dimensionality tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// Single 2D image.
    D2,
    /// Array of 2D layers.
    D2Array,
    /// Cube map (6 faces per array element).
    Cube,
}

impl TextureKind {
    /// Matching image view type.
    pub fn view_type(self) -> vk::ImageViewType {
        match self {
            Self::D2 => vk::ImageViewType::TYPE_2D,
            Self::D2Array => vk::ImageViewType::TYPE_2D_ARRAY,
            Self::Cube => vk::ImageViewType::CUBE,
        }
    }

    /// Sampler address mode: repeat for plain 2D, clamp for array/cube.
    pub fn address_mode(self) -> vk::SamplerAddressMode {
        match self {
            Self::D2 => vk::SamplerAddressMode::REPEAT,
            Self::D2Array | Self::Cube => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        }
    }
}

/// Block dimensions and byte size for a pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub width: u32,
    pub height: u32,
    pub bytes: u32,
}

/// Block layout for the formats the loaders handle.
///
/// Covers the uncompressed 8/16/32-bit families and BC1–BC7; anything else
/// is rejected rather than negotiated down.
pub fn format_block_info(format: vk::Format) -> Option<BlockInfo> {
    let linear = |bytes| {
        Some(BlockInfo {
            width: 1,
            height: 1,
            bytes,
        })
    };
    let compressed = |bytes| {
        Some(BlockInfo {
            width: 4,
            height: 4,
            bytes,
        })
    };

    match format {
        vk::Format::R8_UNORM => linear(1),
        vk::Format::R8G8_UNORM => linear(2),
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SRGB
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::B8G8R8A8_SRGB => linear(4),
        vk::Format::R16G16B16A16_SFLOAT => linear(8),
        vk::Format::R32G32B32A32_SFLOAT => linear(16),
        vk::Format::BC1_RGB_UNORM_BLOCK
        | vk::Format::BC1_RGB_SRGB_BLOCK
        | vk::Format::BC1_RGBA_UNORM_BLOCK
        | vk::Format::BC1_RGBA_SRGB_BLOCK
        | vk::Format::BC4_UNORM_BLOCK
        | vk::Format::BC4_SNORM_BLOCK => compressed(8),
        vk::Format::BC2_UNORM_BLOCK
        | vk::Format::BC2_SRGB_BLOCK
        | vk::Format::BC3_UNORM_BLOCK
        | vk::Format::BC3_SRGB_BLOCK
        | vk::Format::BC5_UNORM_BLOCK
        | vk::Format::BC5_SNORM_BLOCK
        | vk::Format::BC6H_UFLOAT_BLOCK
        | vk::Format::BC6H_SFLOAT_BLOCK
        | vk::Format::BC7_UNORM_BLOCK
        | vk::Format::BC7_SRGB_BLOCK => compressed(16),
        _ => None,
    }
}

/// Byte size of one sub-image of `extent` in `format`.
pub fn image_byte_size(format: vk::Format, extent: vk::Extent2D) -> Option<u64> {
    let block = format_block_info(format)?;
    let blocks_x = u64::from(extent.width.div_ceil(block.width));
    let blocks_y = u64::from(extent.height.div_ceil(block.height));
    Some(blocks_x * blocks_y * u64::from(block.bytes))
}

/// Normalized, container-agnostic texture contents.
///
/// `data` holds every sub-image tightly packed in layer-outer, mip-inner
/// order; cube faces count as layers (6 per array element).
#[derive(Debug, Clone)]
pub struct TextureData {
    pub kind: TextureKind,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub mip_levels: u32,
    pub layer_count: u32,
    pub data: Vec<u8>,
}

impl TextureData {
    /// Construct, validating format support and total data size.
    pub fn new(
        kind: TextureKind,
        format: vk::Format,
        extent: vk::Extent2D,
        mip_levels: u32,
        layer_count: u32,
        data: Vec<u8>,
    ) -> Result<Self> {
        if format_block_info(format).is_none() {
            return Err(AssetError::UnsupportedFormat(format!(
                "pixel format {format:?}"
            )));
        }
        if mip_levels == 0 || layer_count == 0 || extent.width == 0 || extent.height == 0 {
            return Err(AssetError::InvalidData(
                "texture with zero extent, mips, or layers".to_string(),
            ));
        }
        if kind == TextureKind::Cube && layer_count % 6 != 0 {
            return Err(AssetError::InvalidData(format!(
                "cube map layer count {layer_count} is not a multiple of 6"
            )));
        }

        let texture = Self {
            kind,
            format,
            extent,
            mip_levels,
            layer_count,
            data,
        };
        let expected = texture.total_byte_size();
        if texture.data.len() as u64 != expected {
            return Err(AssetError::InvalidData(format!(
                "texture data is {} bytes, layout requires {expected}",
                texture.data.len()
            )));
        }
        Ok(texture)
    }

    /// Parse a texture container from disk without touching the GPU.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "ktx2" => ktx::parse_file(path),
            "dds" => dds::parse_file(path),
            "png" => Err(AssetError::UnsupportedFormat(format!(
                "PNG is not uploaded directly; convert {} to KTX2 offline first",
                path.display()
            ))),
            other => Err(AssetError::UnsupportedFormat(format!(
                "texture container '{other}' ({})",
                path.display()
            ))),
        }
    }

    /// Extent of mip level `mip`, clamped to 1.
    pub fn mip_extent(&self, mip: u32) -> vk::Extent2D {
        vk::Extent2D {
            width: (self.extent.width >> mip).max(1),
            height: (self.extent.height >> mip).max(1),
        }
    }

    /// Byte size of one layer (all of its mips).
    pub fn layer_byte_size(&self) -> u64 {
        (0..self.mip_levels)
            .map(|mip| {
                image_byte_size(self.format, self.mip_extent(mip))
                    .expect("format validated at construction")
            })
            .sum()
    }

    /// Total byte size of all layers and mips.
    pub fn total_byte_size(&self) -> u64 {
        self.layer_byte_size() * u64::from(self.layer_count)
    }

    /// One copy region per (layer, mip) pair.
    ///
    /// `buffer_offset` of region `(layer, mip)` is the sum of the byte
    /// sizes of every region preceding it in layer-outer, mip-inner order,
    /// matching the packing of [`Self::data`].
    pub fn copy_regions(&self) -> Vec<vk::BufferImageCopy> {
        let mut regions = Vec::with_capacity((self.layer_count * self.mip_levels) as usize);
        let mut offset = 0u64;

        for layer in 0..self.layer_count {
            for mip in 0..self.mip_levels {
                let extent = self.mip_extent(mip);
                regions.push(
                    vk::BufferImageCopy::default()
                        .buffer_offset(offset)
                        .buffer_row_length(0)
                        .buffer_image_height(0)
                        .image_subresource(
                            vk::ImageSubresourceLayers::default()
                                .aspect_mask(vk::ImageAspectFlags::COLOR)
                                .mip_level(mip)
                                .base_array_layer(layer)
                                .layer_count(1),
                        )
                        .image_extent(vk::Extent3D {
                            width: extent.width,
                            height: extent.height,
                            depth: 1,
                        }),
                );
                offset += image_byte_size(self.format, extent)
                    .expect("format validated at construction");
            }
        }

        regions
    }
}

/// A sampled texture on the device: image, view, and sampler.
pub struct Texture {
    pub image: GpuImage,
    pub view: vk::ImageView,
    pub sampler: vk::Sampler,
    pub kind: TextureKind,
    pub extent: vk::Extent2D,
    pub mip_levels: u32,
    pub layer_count: u32,
}

impl Texture {
    /// Resolve a relative path through the resolver, parse, and upload.
    pub fn load(
        ctx: &GpuContext,
        resolver: &crate::resolver::AssetResolver,
        relative: impl AsRef<Path>,
        usage: vk::ImageUsageFlags,
        final_layout: vk::ImageLayout,
    ) -> Result<Self> {
        let path = resolver.resolve(relative)?;
        Self::load_from_file(ctx, path, usage, final_layout)
    }

    /// Parse a container file and upload it.
    ///
    /// `usage` should include `SAMPLED`; `TRANSFER_DST` is added by the
    /// transfer layer. On return the image is in `final_layout` and safe to
    /// bind.
    pub fn load_from_file(
        ctx: &GpuContext,
        path: impl AsRef<Path>,
        usage: vk::ImageUsageFlags,
        final_layout: vk::ImageLayout,
    ) -> Result<Self> {
        let path = path.as_ref();
        let data = TextureData::load_from_file(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("texture");
        let texture = Self::from_data(ctx, &data, usage, final_layout, name)?;
        tracing::info!(
            path = %path.display(),
            kind = ?data.kind,
            format = ?data.format,
            mips = data.mip_levels,
            layers = data.layer_count,
            "loaded texture"
        );
        Ok(texture)
    }

    /// Upload parsed texture data.
    pub fn from_data(
        ctx: &GpuContext,
        data: &TextureData,
        usage: vk::ImageUsageFlags,
        final_layout: vk::ImageLayout,
        name: &str,
    ) -> Result<Self> {
        let regions = data.copy_regions();

        let flags = if data.kind == TextureKind::Cube {
            vk::ImageCreateFlags::CUBE_COMPATIBLE
        } else {
            vk::ImageCreateFlags::empty()
        };

        let create_info = vk::ImageCreateInfo::default()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(data.format)
            .extent(vk::Extent3D {
                width: data.extent.width,
                height: data.extent.height,
                depth: 1,
            })
            .mip_levels(data.mip_levels)
            .array_layers(data.layer_count)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = ctx.stage_to_device_image(&create_info, &data.data, &regions, final_layout, name)?;

        let device = ctx.device();
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image.image)
            .view_type(data.kind.view_type())
            .format(data.format)
            .subresource_range(image.full_subresource_range(vk::ImageAspectFlags::COLOR));

        let view = match unsafe { device.create_image_view(&view_info, None) } {
            Ok(view) => view,
            Err(e) => {
                let mut image = image;
                let _ = ctx.allocator().lock().free_image(&mut image);
                return Err(kiln_gpu::GpuError::from(e).into());
            }
        };

        let sampler = match create_sampler(ctx, data.kind, data.mip_levels) {
            Ok(sampler) => sampler,
            Err(e) => {
                let mut image = image;
                unsafe { device.destroy_image_view(view, None) };
                let _ = ctx.allocator().lock().free_image(&mut image);
                return Err(e);
            }
        };

        Ok(Self {
            image,
            view,
            sampler,
            kind: data.kind,
            extent: data.extent,
            mip_levels: data.mip_levels,
            layer_count: data.layer_count,
        })
    }

    /// Destroy sampler and view, then free the image.
    pub fn destroy(mut self, ctx: &GpuContext) -> Result<()> {
        unsafe {
            ctx.device().destroy_sampler(self.sampler, None);
            ctx.device().destroy_image_view(self.view, None);
        }
        ctx.allocator().lock().free_image(&mut self.image)?;
        Ok(())
    }
}

/// Linear-filtered sampler matching the texture kind; anisotropy only when
/// the device reports support.
fn create_sampler(ctx: &GpuContext, kind: TextureKind, mip_levels: u32) -> Result<vk::Sampler> {
    let caps = ctx.capabilities();
    let anisotropy = caps.supports_sampler_anisotropy;
    let address_mode = kind.address_mode();

    let create_info = vk::SamplerCreateInfo::default()
        .mag_filter(vk::Filter::LINEAR)
        .min_filter(vk::Filter::LINEAR)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .address_mode_u(address_mode)
        .address_mode_v(address_mode)
        .address_mode_w(address_mode)
        .mip_lod_bias(0.0)
        .anisotropy_enable(anisotropy)
        .max_anisotropy(if anisotropy {
            caps.max_sampler_anisotropy
        } else {
            1.0
        })
        .compare_enable(false)
        .min_lod(0.0)
        .max_lod(mip_levels as f32)
        .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE);

    let sampler = unsafe { ctx.device().create_sampler(&create_info, None) }
        .map_err(kiln_gpu::GpuError::from)?;
    Ok(sampler)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_data(extent: vk::Extent2D, mips: u32, layers: u32) -> TextureData {
        let mut size = 0;
        for _ in 0..layers {
            for mip in 0..mips {
                let w = (extent.width >> mip).max(1) as usize;
                let h = (extent.height >> mip).max(1) as usize;
                size += w * h * 4;
            }
        }
        let kind = if layers == 6 {
            TextureKind::Cube
        } else if layers > 1 {
            TextureKind::D2Array
        } else {
            TextureKind::D2
        };
        TextureData::new(
            kind,
            vk::Format::R8G8B8A8_UNORM,
            extent,
            mips,
            layers,
            vec![0xAB; size],
        )
        .unwrap()
    }

    #[test]
    fn block_sizes() {
        assert_eq!(
            format_block_info(vk::Format::R8G8B8A8_UNORM),
            Some(BlockInfo {
                width: 1,
                height: 1,
                bytes: 4
            })
        );
        assert_eq!(
            format_block_info(vk::Format::BC1_RGBA_UNORM_BLOCK),
            Some(BlockInfo {
                width: 4,
                height: 4,
                bytes: 8
            })
        );
        assert_eq!(format_block_info(vk::Format::D32_SFLOAT), None);
    }

    #[test]
    fn compressed_sizes_round_up_to_blocks() {
        // One BC1 block is 8 bytes; a 4x4 image is exactly one block.
        let extent = vk::Extent2D {
            width: 4,
            height: 4,
        };
        assert_eq!(
            image_byte_size(vk::Format::BC1_RGBA_UNORM_BLOCK, extent),
            Some(8)
        );
        // 1x1 mip of a compressed format still occupies a whole block.
        let tiny = vk::Extent2D {
            width: 1,
            height: 1,
        };
        assert_eq!(
            image_byte_size(vk::Format::BC7_UNORM_BLOCK, tiny),
            Some(16)
        );
        // 5 pixels spill into a second block along that axis.
        let spill = vk::Extent2D {
            width: 5,
            height: 4,
        };
        assert_eq!(
            image_byte_size(vk::Format::BC1_RGBA_UNORM_BLOCK, spill),
            Some(16)
        );
    }

    #[test]
    fn mip_extent_clamps_to_one() {
        let data = rgba_data(
            vk::Extent2D {
                width: 8,
                height: 2,
            },
            4,
            1,
        );
        assert_eq!(data.mip_extent(0).width, 8);
        assert_eq!(data.mip_extent(2).height, 1);
        assert_eq!(data.mip_extent(3).width, 1);
    }

    #[test]
    fn cube_produces_layers_times_mips_regions() {
        let extent = vk::Extent2D {
            width: 4,
            height: 4,
        };
        let data = rgba_data(extent, 3, 6);
        let regions = data.copy_regions();
        assert_eq!(regions.len(), 18);

        // Per-layer size: 4x4 + 2x2 + 1x1 RGBA8 = 64 + 16 + 4 bytes.
        let layer_size = 84;
        assert_eq!(data.layer_byte_size(), layer_size);

        let mut expected_offset = 0u64;
        for layer in 0..6u32 {
            for mip in 0..3u32 {
                let region = &regions[(layer * 3 + mip) as usize];
                assert_eq!(region.buffer_offset, expected_offset);
                assert_eq!(region.image_subresource.mip_level, mip);
                assert_eq!(region.image_subresource.base_array_layer, layer);
                assert_eq!(region.image_subresource.layer_count, 1);
                assert_eq!(region.image_extent.width, data.mip_extent(mip).width);
                expected_offset +=
                    image_byte_size(data.format, data.mip_extent(mip)).unwrap();
            }
        }
        assert_eq!(expected_offset, data.total_byte_size());
    }

    #[test]
    fn data_size_is_validated() {
        let extent = vk::Extent2D {
            width: 2,
            height: 2,
        };
        let result = TextureData::new(
            TextureKind::D2,
            vk::Format::R8G8B8A8_UNORM,
            extent,
            1,
            1,
            vec![0; 15],
        );
        assert!(matches!(result, Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn cube_layer_count_must_be_multiple_of_six() {
        let extent = vk::Extent2D {
            width: 1,
            height: 1,
        };
        let result = TextureData::new(
            TextureKind::Cube,
            vk::Format::R8G8B8A8_UNORM,
            extent,
            1,
            5,
            vec![0; 20],
        );
        assert!(matches!(result, Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn unsupported_formats_are_rejected() {
        let result = TextureData::new(
            TextureKind::D2,
            vk::Format::ASTC_4X4_UNORM_BLOCK,
            vk::Extent2D {
                width: 4,
                height: 4,
            },
            1,
            1,
            vec![0; 16],
        );
        assert!(matches!(result, Err(AssetError::UnsupportedFormat(_))));
    }

    #[test]
    fn png_is_directed_to_offline_conversion() {
        let err = TextureData::load_from_file("albedo.png").unwrap_err();
        assert!(err.to_string().contains("KTX2"));
    }

    #[test]
    fn unknown_container_is_unsupported() {
        let err = TextureData::load_from_file("albedo.tga").unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedFormat(_)));
    }

    #[test]
    fn address_modes_follow_kind() {
        assert_eq!(
            TextureKind::D2.address_mode(),
            vk::SamplerAddressMode::REPEAT
        );
        assert_eq!(
            TextureKind::Cube.address_mode(),
            vk::SamplerAddressMode::CLAMP_TO_EDGE
        );
        assert_eq!(TextureKind::Cube.view_type(), vk::ImageViewType::CUBE);
    }
}
