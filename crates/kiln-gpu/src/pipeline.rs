//! Graphics pipeline assembly.
//!
//! [`GraphicsPipelineBuilder`] accumulates fixed-function state with
//! sensible defaults and finalizes it in a single [`build`] call that
//! recomputes every derived count/pointer pair from the builder's current
//! state. Shader binaries are loaded pre-compiled (SPIR-V); compilation from
//! source happens offline.
//!
//! [`build`]: GraphicsPipelineBuilder::build

use crate::error::{GpuError, Result};
use crate::vertex::VertexLayout;
use ash::vk;
use kiln_core::ByteStorage;
use std::ffi::CString;
use std::path::Path;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Decode a SPIR-V binary into 32-bit words, validating size and magic.
pub fn load_spirv(storage: &ByteStorage) -> Result<Vec<u32>> {
    let bytes = storage.data();
    if bytes.len() < 4 || bytes.len() % 4 != 0 {
        return Err(GpuError::InvalidShader(format!(
            "binary size {} is not a multiple of 4",
            bytes.len()
        )));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()))
        .collect();

    if words[0] != SPIRV_MAGIC {
        return Err(GpuError::InvalidShader(format!(
            "missing SPIR-V magic, found {:#010x}",
            words[0]
        )));
    }

    Ok(words)
}

/// A shader stage owned by the builder until pipeline creation.
struct ShaderStage {
    module: vk::ShaderModule,
    stage: vk::ShaderStageFlags,
    entry: CString,
}

/// Compiled graphics pipeline with its layout.
pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Destroy the pipeline.
    ///
    /// # Safety
    /// The device must be valid and the pipeline must not be in use.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_pipeline_layout(self.layout, None);
    }
}

/// Builder for graphics pipelines using dynamic rendering (Vulkan 1.3).
///
/// Defaults: triangle-list topology, fill mode, back-face culling,
/// counter-clockwise front face, line width 1.0, one color attachment with
/// blending disabled, depth test and write enabled with less-or-equal
/// compare, dynamic viewport and scissor, single-sampled.
pub struct GraphicsPipelineBuilder {
    topology: vk::PrimitiveTopology,
    polygon_mode: vk::PolygonMode,
    cull_mode: vk::CullModeFlags,
    front_face: vk::FrontFace,
    line_width: f32,
    samples: vk::SampleCountFlags,
    depth_test: bool,
    depth_write: bool,
    depth_compare: vk::CompareOp,
    blend_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    dynamic_states: Vec<vk::DynamicState>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    color_formats: Vec<vk::Format>,
    depth_format: Option<vk::Format>,
    descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constant_ranges: Vec<vk::PushConstantRange>,
    stages: Vec<ShaderStage>,
}

impl Default for GraphicsPipelineBuilder {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            line_width: 1.0,
            samples: vk::SampleCountFlags::TYPE_1,
            depth_test: true,
            depth_write: true,
            depth_compare: vk::CompareOp::LESS_OR_EQUAL,
            blend_attachments: vec![default_blend_attachment()],
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            color_formats: vec![vk::Format::B8G8R8A8_SRGB],
            depth_format: Some(vk::Format::D32_SFLOAT),
            descriptor_set_layouts: Vec::new(),
            push_constant_ranges: Vec::new(),
            stages: Vec::new(),
        }
    }
}

/// One color attachment, blending disabled, full write mask.
fn default_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(false)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

impl GraphicsPipelineBuilder {
    /// Create a builder with the documented defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primitive topology.
    pub fn topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the polygon fill mode.
    pub fn polygon_mode(mut self, mode: vk::PolygonMode) -> Self {
        self.polygon_mode = mode;
        self
    }

    /// Set the cull mode.
    pub fn cull_mode(mut self, mode: vk::CullModeFlags) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Set the front face winding.
    pub fn front_face(mut self, front_face: vk::FrontFace) -> Self {
        self.front_face = front_face;
        self
    }

    /// Set the rasterization line width.
    pub fn line_width(mut self, width: f32) -> Self {
        self.line_width = width;
        self
    }

    /// Set the multisample count.
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.samples = samples;
        self
    }

    /// Enable or disable depth test and write.
    pub fn depth(mut self, test: bool, write: bool) -> Self {
        self.depth_test = test;
        self.depth_write = write;
        self
    }

    /// Set the depth compare operation.
    pub fn depth_compare(mut self, op: vk::CompareOp) -> Self {
        self.depth_compare = op;
        self
    }

    /// Replace the color-blend attachment list.
    pub fn blend_attachments(
        mut self,
        attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    ) -> Self {
        self.blend_attachments = attachments;
        self
    }

    /// Replace the dynamic state list.
    pub fn dynamic_states(mut self, states: Vec<vk::DynamicState>) -> Self {
        self.dynamic_states = states;
        self
    }

    /// Set the color attachment formats (dynamic rendering).
    pub fn color_formats(mut self, formats: Vec<vk::Format>) -> Self {
        self.color_formats = formats;
        self
    }

    /// Set or clear the depth attachment format (dynamic rendering).
    pub fn depth_format(mut self, format: Option<vk::Format>) -> Self {
        self.depth_format = format;
        self
    }

    /// Install binding and attribute descriptions from a vertex layout.
    pub fn vertex_layout(mut self, layout: &VertexLayout) -> Self {
        self.vertex_bindings = vec![layout.binding_description(0)];
        self.vertex_attributes = layout.attribute_descriptions(0);
        self
    }

    /// Set the descriptor set layouts for the pipeline layout.
    pub fn descriptor_set_layouts(mut self, layouts: Vec<vk::DescriptorSetLayout>) -> Self {
        self.descriptor_set_layouts = layouts;
        self
    }

    /// Set the push constant ranges for the pipeline layout.
    pub fn push_constant_ranges(mut self, ranges: Vec<vk::PushConstantRange>) -> Self {
        self.push_constant_ranges = ranges;
        self
    }

    /// Load a compiled SPIR-V binary from disk and append it as a stage.
    ///
    /// The entry point is `main`. The builder owns the shader module and
    /// destroys it once the pipeline has been created.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn load_shader(
        self,
        device: &ash::Device,
        path: impl AsRef<Path>,
        stage: vk::ShaderStageFlags,
    ) -> Result<Self> {
        let path = path.as_ref();
        let storage =
            ByteStorage::from_file(path).map_err(|e| GpuError::InvalidShader(e.to_string()))?;
        let words = load_spirv(&storage)?;
        tracing::debug!(path = %path.display(), words = words.len(), "loaded shader binary");
        self.shader_spirv(device, &words, stage)
    }

    /// Append a stage from in-memory SPIR-V words.
    ///
    /// # Safety
    /// The device must be valid and `words` must be valid SPIR-V.
    pub unsafe fn shader_spirv(
        mut self,
        device: &ash::Device,
        words: &[u32],
        stage: vk::ShaderStageFlags,
    ) -> Result<Self> {
        let shader_info = vk::ShaderModuleCreateInfo::default().code(words);
        let module = device
            .create_shader_module(&shader_info, None)
            .map_err(|e| GpuError::InvalidShader(e.to_string()))?;

        self.stages.push(ShaderStage {
            module,
            stage,
            entry: CString::new("main").unwrap(),
        });
        Ok(self)
    }

    /// Destroy shader modules without building.
    ///
    /// Only needed when a builder with loaded shaders is abandoned.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn destroy_shader_modules(&mut self, device: &ash::Device) {
        for stage in self.stages.drain(..) {
            device.destroy_shader_module(stage.module, None);
        }
    }

    /// Finalize the accumulated state into a pipeline.
    ///
    /// Every derived count/pointer pair is recomputed from the builder's
    /// fields here, immediately before the creation call. All shader modules
    /// the builder created are destroyed before returning, on success and on
    /// failure.
    ///
    /// # Safety
    /// The device must be valid and loaded shaders must be valid SPIR-V.
    pub unsafe fn build(
        self,
        device: &ash::Device,
        cache: vk::PipelineCache,
    ) -> Result<GraphicsPipeline> {
        if self.stages.is_empty() {
            return Err(GpuError::PipelineCreation(
                "no shader stages loaded".to_string(),
            ));
        }

        // Shader stages
        let shader_stages: Vec<vk::PipelineShaderStageCreateInfo> = self
            .stages
            .iter()
            .map(|s| {
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(s.stage)
                    .module(s.module)
                    .name(&s.entry)
            })
            .collect();

        // Vertex input
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        // Input assembly
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(self.topology)
            .primitive_restart_enable(false);

        // Viewport (dynamic)
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        // Rasterization
        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.polygon_mode)
            .cull_mode(self.cull_mode)
            .front_face(self.front_face)
            .depth_bias_enable(false)
            .line_width(self.line_width);

        // Multisampling
        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(self.samples)
            .sample_shading_enable(false);

        // Depth stencil
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(self.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        // Color blending
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&self.blend_attachments);

        // Dynamic state
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&self.dynamic_states);

        // Pipeline layout
        let layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(&self.descriptor_set_layouts)
            .push_constant_ranges(&self.push_constant_ranges);

        let layout = match device.create_pipeline_layout(&layout_info, None) {
            Ok(layout) => layout,
            Err(e) => {
                self.destroy_modules(device);
                return Err(GpuError::PipelineCreation(e.to_string()));
            }
        };

        // Dynamic rendering info (Vulkan 1.3)
        let mut rendering_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&self.color_formats);

        if let Some(depth_format) = self.depth_format {
            rendering_info = rendering_info.depth_attachment_format(depth_format);
        }

        // Create pipeline
        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .push_next(&mut rendering_info);

        let result = device.create_graphics_pipelines(cache, &[pipeline_info], None);

        // Modules are not needed once the pipeline exists
        self.destroy_modules(device);

        match result {
            Ok(pipelines) => Ok(GraphicsPipeline {
                pipeline: pipelines[0],
                layout,
            }),
            Err((_pipelines, e)) => {
                device.destroy_pipeline_layout(layout, None);
                Err(GpuError::PipelineCreation(e.to_string()))
            }
        }
    }

    unsafe fn destroy_modules(&self, device: &ash::Device) {
        for stage in &self.stages {
            device.destroy_shader_module(stage.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::VertexComponent;

    #[test]
    fn defaults_match_documentation() {
        let builder = GraphicsPipelineBuilder::new();
        assert_eq!(builder.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(builder.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(builder.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(builder.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(builder.line_width, 1.0);
        assert_eq!(builder.samples, vk::SampleCountFlags::TYPE_1);
        assert!(builder.depth_test);
        assert!(builder.depth_write);
        assert_eq!(builder.depth_compare, vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(builder.blend_attachments.len(), 1);
        assert!(builder.blend_attachments[0].blend_enable == vk::FALSE);
        assert_eq!(
            builder.blend_attachments[0].color_write_mask,
            vk::ColorComponentFlags::RGBA
        );
        assert_eq!(
            builder.dynamic_states,
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
        assert!(builder.stages.is_empty());
    }

    #[test]
    fn vertex_layout_installs_descriptions() {
        let layout = VertexLayout::new([
            VertexComponent::Position,
            VertexComponent::Normal,
            VertexComponent::Uv,
        ]);
        let builder = GraphicsPipelineBuilder::new().vertex_layout(&layout);
        assert_eq!(builder.vertex_bindings.len(), 1);
        assert_eq!(builder.vertex_bindings[0].stride, layout.stride());
        assert_eq!(builder.vertex_attributes.len(), 3);
    }

    #[test]
    fn spirv_magic_is_required() {
        let good = ByteStorage::from_vec(vec![0x03, 0x02, 0x23, 0x07, 0, 0, 0, 0]);
        assert!(load_spirv(&good).is_ok());

        let bad_magic = ByteStorage::from_vec(vec![0xFF; 8]);
        assert!(load_spirv(&bad_magic).is_err());
    }

    #[test]
    fn spirv_size_must_be_word_aligned() {
        let truncated = ByteStorage::from_vec(vec![0x03, 0x02, 0x23]);
        assert!(load_spirv(&truncated).is_err());
        let empty = ByteStorage::from_vec(Vec::new());
        assert!(load_spirv(&empty).is_err());
    }
}
