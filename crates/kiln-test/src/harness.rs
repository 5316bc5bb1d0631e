//! Headless GPU harness and synthetic asset builders.

use ash::vk;
use kiln_assets::{Texture, TextureData, TextureKind};
use kiln_gpu::{GpuContext, GpuContextBuilder};

use crate::{Result, TestError};

/// Headless GPU context for upload verification.
///
/// Construction fails with a descriptive error on machines without a
/// Vulkan 1.3 device; callers should treat that as a skip, not a failure.
pub struct HeadlessGpu {
    context: GpuContext,
}

impl HeadlessGpu {
    /// Bring up a validation-enabled context with no surface.
    pub fn new() -> Result<Self> {
        let context = GpuContextBuilder::new()
            .app_name("kiln-test")
            .validation(true)
            .build()
            .map_err(|e| TestError::Gpu(e.to_string()))?;
        Ok(Self { context })
    }

    /// The wrapped context.
    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Stage `bytes` to a device-local buffer, read them back, and compare.
    pub fn upload_round_trip(&self, bytes: &[u8]) -> Result<()> {
        let buffer = self
            .context
            .stage_to_device_buffer(
                vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC,
                bytes,
                "round_trip",
            )
            .map_err(|e| TestError::Gpu(e.to_string()))?;

        let read = self.context.read_back_buffer(&buffer);

        let mut buffer = buffer;
        let _ = self.context.allocator().lock().free_buffer(&mut buffer);

        let read = read.map_err(|e| TestError::Gpu(e.to_string()))?;
        if read.len() != bytes.len() {
            return Err(TestError::Mismatch(format!(
                "read back {} bytes, uploaded {}",
                read.len(),
                bytes.len()
            )));
        }
        if let Some(index) = (0..bytes.len()).find(|&i| read[i] != bytes[i]) {
            return Err(TestError::Mismatch(format!(
                "byte {index} differs: wrote {:#04x}, read {:#04x}",
                bytes[index], read[index]
            )));
        }
        Ok(())
    }

    /// Drive the full texture upload path on synthetic data, then tear the
    /// texture down again.
    pub fn upload_texture(&self, data: &TextureData) -> Result<()> {
        let texture = Texture::from_data(
            &self.context,
            data,
            vk::ImageUsageFlags::SAMPLED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            "test_texture",
        )
        .map_err(|e| TestError::Asset(e.to_string()))?;

        texture
            .destroy(&self.context)
            .map_err(|e| TestError::Asset(e.to_string()))
    }
}

/// Build an RGBA8 checkerboard with the given mip/layer configuration.
///
/// Each sub-image is filled with a pattern derived from its (layer, mip)
/// coordinates so region-offset mistakes show up as wrong colors.
pub fn checkerboard_texture(
    kind: TextureKind,
    extent: vk::Extent2D,
    mip_levels: u32,
    layer_count: u32,
) -> TextureData {
    let mut data = Vec::new();

    for layer in 0..layer_count {
        for mip in 0..mip_levels {
            let width = (extent.width >> mip).max(1);
            let height = (extent.height >> mip).max(1);
            for y in 0..height {
                for x in 0..width {
                    let on = (x + y) % 2 == 0;
                    data.push(if on { 0xFF } else { 0x00 });
                    data.push((layer * 32) as u8);
                    data.push((mip * 32) as u8);
                    data.push(0xFF);
                }
            }
        }
    }

    TextureData::new(
        kind,
        vk::Format::R8G8B8A8_UNORM,
        extent,
        mip_levels,
        layer_count,
        data,
    )
    .expect("synthetic texture data is always consistent")
}

/// In-memory OBJ source for importer tests: a unit quad with normals and
/// texture coordinates.
pub fn quad_obj_source() -> &'static str {
    "\
o quad
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1 4/4/1
"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_matches_declared_layout() {
        let data = checkerboard_texture(
            TextureKind::Cube,
            vk::Extent2D {
                width: 8,
                height: 8,
            },
            4,
            6,
        );
        assert_eq!(data.copy_regions().len(), 24);
        assert_eq!(data.data.len() as u64, data.total_byte_size());
    }

    #[test]
    fn array_checkerboard_layers_differ() {
        let data = checkerboard_texture(
            TextureKind::D2Array,
            vk::Extent2D {
                width: 2,
                height: 2,
            },
            1,
            2,
        );
        let layer_size = data.layer_byte_size() as usize;
        // Green channel encodes the layer index.
        assert_ne!(data.data[1], data.data[layer_size + 1]);
    }
}
