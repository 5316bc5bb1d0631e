//! Vulkan abstraction layer for kiln.
//!
//! This crate provides:
//! - Headless Vulkan instance and device management
//! - GPU capability detection
//! - Memory allocation via gpu-allocator
//! - Staged host→device buffer and image uploads
//! - Vertex layout description
//! - Graphics pipeline assembly
//! - Descriptor set helpers

pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod sync;
pub mod transfer;
pub mod vertex;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{
    write_combined_image_sampler, write_storage_buffer, write_uniform_buffer, DescriptorPool,
    DescriptorSetLayoutBuilder,
};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use pipeline::{load_spirv, GraphicsPipeline, GraphicsPipelineBuilder};
pub use sync::{create_fence, create_semaphore};
pub use transfer::cmd_transition_image_layout;
pub use vertex::{VertexComponent, VertexLayout};
