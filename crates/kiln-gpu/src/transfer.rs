//! Staged host→device resource transfer.
//!
//! Every upload follows the same synchronous shape: copy host bytes into a
//! transient host-visible staging buffer, record a one-time command buffer
//! that copies into the device-local destination (transitioning image
//! layouts around the copy), submit with a fence, wait, and free the staging
//! buffer. On return the destination is safe to bind and read with no
//! further synchronization by the caller.

use crate::command::execute_single_time_commands;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::memory::{GpuBuffer, GpuImage};
use ash::vk;
use gpu_allocator::MemoryLocation;

/// Source access mask and stage for leaving `layout`.
fn src_barrier_masks(layout: vk::ImageLayout) -> Result<(vk::AccessFlags, vk::PipelineStageFlags)> {
    match layout {
        vk::ImageLayout::UNDEFINED => Ok((
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::TOP_OF_PIPE,
        )),
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => Ok((
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        )),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => Ok((
            vk::AccessFlags::TRANSFER_READ,
            vk::PipelineStageFlags::TRANSFER,
        )),
        other => Err(GpuError::UnsupportedTransition(format!(
            "cannot transition out of {other:?}"
        ))),
    }
}

/// Destination access mask and stage for entering `layout`.
fn dst_barrier_masks(layout: vk::ImageLayout) -> Result<(vk::AccessFlags, vk::PipelineStageFlags)> {
    match layout {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => Ok((
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
        )),
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => Ok((
            vk::AccessFlags::TRANSFER_READ,
            vk::PipelineStageFlags::TRANSFER,
        )),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => Ok((
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        )),
        vk::ImageLayout::GENERAL => Ok((
            vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            vk::PipelineStageFlags::ALL_COMMANDS,
        )),
        other => Err(GpuError::UnsupportedTransition(format!(
            "cannot transition into {other:?}"
        ))),
    }
}

/// Record an image layout transition covering `range`.
///
/// # Safety
/// The device and command buffer must be valid and recording.
pub unsafe fn cmd_transition_image_layout(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Result<()> {
    let (src_access, src_stage) = src_barrier_masks(old_layout)?;
    let (dst_access, dst_stage) = dst_barrier_masks(new_layout)?;

    let barrier = vk::ImageMemoryBarrier::default()
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range);

    device.cmd_pipeline_barrier(
        cmd,
        src_stage,
        dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        &[barrier],
    );

    Ok(())
}

impl GpuContext {
    /// Create a host-visible staging buffer holding an exact copy of `data`.
    ///
    /// The buffer is allocated from `CpuToGpu` memory (host-coherent; no
    /// explicit flush is required before the device reads it). The caller
    /// owns the buffer and must free it after the dependent copy command has
    /// completed.
    pub fn create_staging_buffer(&self, data: &[u8], name: &str) -> Result<GpuBuffer> {
        if data.is_empty() {
            return Err(GpuError::InvalidState(
                "staging upload of zero bytes".to_string(),
            ));
        }

        let buffer = self.allocator.lock().create_buffer(
            data.len() as u64,
            vk::BufferUsageFlags::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            name,
        )?;
        buffer.write_bytes(0, data)?;
        Ok(buffer)
    }

    /// Upload `data` into a new device-local buffer.
    ///
    /// `TRANSFER_DST` is added to `usage` automatically. The copy runs on
    /// the transfer queue and this call blocks until it has completed; the
    /// returned buffer is immediately safe to bind.
    pub fn stage_to_device_buffer(
        &self,
        usage: vk::BufferUsageFlags,
        data: &[u8],
        name: &str,
    ) -> Result<GpuBuffer> {
        let mut staging = self.create_staging_buffer(data, &format!("{name}.staging"))?;

        let dst = match self.allocator.lock().create_buffer(
            data.len() as u64,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
            name,
        ) {
            Ok(dst) => dst,
            Err(e) => {
                let _ = self.allocator.lock().free_buffer(&mut staging);
                return Err(e);
            }
        };

        let size = data.len() as u64;
        let device = &*self.device;
        let result = unsafe {
            execute_single_time_commands(
                device,
                &self.transfer_upload_pool,
                self.transfer_queue,
                |cmd| {
                    let region = vk::BufferCopy {
                        src_offset: 0,
                        dst_offset: 0,
                        size,
                    };
                    unsafe {
                        device.cmd_copy_buffer(cmd, staging.buffer, dst.buffer, &[region]);
                    }
                },
            )
        };

        let _ = self.allocator.lock().free_buffer(&mut staging);

        match result {
            Ok(()) => {
                tracing::debug!(bytes = size, name, "staged buffer upload");
                Ok(dst)
            }
            Err(e) => {
                let mut dst = dst;
                let _ = self.allocator.lock().free_buffer(&mut dst);
                Err(e)
            }
        }
    }

    /// Upload `data` into a new device-local image.
    ///
    /// The image is created from `create_info` (with `TRANSFER_DST` usage
    /// added), transitioned `UNDEFINED → TRANSFER_DST_OPTIMAL` across its
    /// whole subresource range, filled with one `copy_buffer_to_image` call
    /// per supplied region (each region names its mip level, array layer,
    /// and byte offset into `data`), then transitioned to `final_layout`.
    /// Runs on the graphics queue and blocks until complete; the returned
    /// image's tracked `layout` equals `final_layout` and the image is
    /// immediately safe to sample.
    pub fn stage_to_device_image(
        &self,
        create_info: &vk::ImageCreateInfo,
        data: &[u8],
        regions: &[vk::BufferImageCopy],
        final_layout: vk::ImageLayout,
        name: &str,
    ) -> Result<GpuImage> {
        if regions.is_empty() {
            return Err(GpuError::InvalidState(
                "image upload with no copy regions".to_string(),
            ));
        }

        // Reject unsupported transitions before any resource is allocated.
        src_barrier_masks(vk::ImageLayout::UNDEFINED)?;
        dst_barrier_masks(vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
        src_barrier_masks(vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
        dst_barrier_masks(final_layout)?;

        let mut staging = self.create_staging_buffer(data, &format!("{name}.staging"))?;

        let mut info = *create_info;
        info.usage |= vk::ImageUsageFlags::TRANSFER_DST;
        info.initial_layout = vk::ImageLayout::UNDEFINED;

        let dst = match self
            .allocator
            .lock()
            .create_image(&info, MemoryLocation::GpuOnly, name)
        {
            Ok(dst) => dst,
            Err(e) => {
                let _ = self.allocator.lock().free_buffer(&mut staging);
                return Err(e);
            }
        };

        let range = dst.full_subresource_range(vk::ImageAspectFlags::COLOR);
        let device = &*self.device;
        let result = unsafe {
            execute_single_time_commands(
                device,
                &self.graphics_upload_pool,
                self.graphics_queue,
                |cmd| unsafe {
                    // Transitions were validated above; recording cannot fail.
                    let _ = cmd_transition_image_layout(
                        device,
                        cmd,
                        dst.image,
                        range,
                        vk::ImageLayout::UNDEFINED,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    );
                    device.cmd_copy_buffer_to_image(
                        cmd,
                        staging.buffer,
                        dst.image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        regions,
                    );
                    let _ = cmd_transition_image_layout(
                        device,
                        cmd,
                        dst.image,
                        range,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        final_layout,
                    );
                },
            )
        };

        let _ = self.allocator.lock().free_buffer(&mut staging);

        match result {
            Ok(()) => {
                let mut dst = dst;
                dst.layout = final_layout;
                tracing::debug!(
                    bytes = data.len(),
                    regions = regions.len(),
                    name,
                    "staged image upload"
                );
                Ok(dst)
            }
            Err(e) => {
                let mut dst = dst;
                let _ = self.allocator.lock().free_image(&mut dst);
                Err(e)
            }
        }
    }

    /// Copy a device-local buffer back to host memory.
    ///
    /// `src` must have been created with `TRANSFER_SRC` usage. Used to
    /// verify round-trip fidelity of staged uploads.
    pub fn read_back_buffer(&self, src: &GpuBuffer) -> Result<Vec<u8>> {
        let mut readback = self.allocator.lock().create_buffer(
            src.size,
            vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuToCpu,
            "readback",
        )?;

        let size = src.size;
        let device = &*self.device;
        let result = unsafe {
            execute_single_time_commands(
                device,
                &self.transfer_upload_pool,
                self.transfer_queue,
                |cmd| {
                    let region = vk::BufferCopy {
                        src_offset: 0,
                        dst_offset: 0,
                        size,
                    };
                    unsafe {
                        device.cmd_copy_buffer(cmd, src.buffer, readback.buffer, &[region]);
                    }
                },
            )
        };

        let bytes = result.and_then(|()| readback.read_bytes(size as usize));
        let _ = self.allocator.lock().free_buffer(&mut readback);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_has_no_source_access() {
        let (access, stage) = src_barrier_masks(vk::ImageLayout::UNDEFINED).unwrap();
        assert_eq!(access, vk::AccessFlags::empty());
        assert_eq!(stage, vk::PipelineStageFlags::TOP_OF_PIPE);
    }

    #[test]
    fn shader_read_destination() {
        let (access, stage) =
            dst_barrier_masks(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL).unwrap();
        assert_eq!(access, vk::AccessFlags::SHADER_READ);
        assert_eq!(stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn unknown_transitions_are_rejected() {
        assert!(src_barrier_masks(vk::ImageLayout::PRESENT_SRC_KHR).is_err());
        assert!(dst_barrier_masks(vk::ImageLayout::UNDEFINED).is_err());
        assert!(dst_barrier_masks(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL).is_err());
    }
}
