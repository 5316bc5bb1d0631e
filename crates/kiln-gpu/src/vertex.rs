//! Vertex layout description.
//!
//! A [`VertexLayout`] is the agreed-upon ordering, sizes, and byte offsets
//! of interleaved per-vertex attributes, shared between the mesh importer
//! (which emits vertex data in this order) and the pipeline builder (which
//! consumes the binding/attribute tables).

use ash::vk;

/// A semantic vertex component.
///
/// `PadFloat`/`PadVec4` reserve space in the stride without carrying data;
/// importers emit zeros for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexComponent {
    Position,
    Normal,
    Uv,
    Color,
    Tangent,
    Bitangent,
    PadFloat,
    PadVec4,
}

impl VertexComponent {
    /// Number of 32-bit floats this component occupies.
    pub fn float_count(self) -> u32 {
        match self {
            Self::Uv => 2,
            Self::PadFloat => 1,
            Self::PadVec4 => 4,
            _ => 3,
        }
    }

    /// Size of this component in bytes.
    pub fn byte_size(self) -> u32 {
        self.float_count() * std::mem::size_of::<f32>() as u32
    }

    /// Vulkan attribute format for this component.
    pub fn format(self) -> vk::Format {
        match self {
            Self::Uv => vk::Format::R32G32_SFLOAT,
            Self::PadFloat => vk::Format::R32_SFLOAT,
            Self::PadVec4 => vk::Format::R32G32B32A32_SFLOAT,
            _ => vk::Format::R32G32B32_SFLOAT,
        }
    }
}

/// An ordered, immutable sequence of vertex components.
///
/// Construct once and share; any number of meshes and pipelines may use the
/// same layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    components: Vec<VertexComponent>,
}

impl VertexLayout {
    /// Create a layout from an ordered component list.
    pub fn new(components: impl Into<Vec<VertexComponent>>) -> Self {
        Self {
            components: components.into(),
        }
    }

    /// The components in order.
    pub fn components(&self) -> &[VertexComponent] {
        &self.components
    }

    /// Total bytes per vertex.
    pub fn stride(&self) -> u32 {
        self.components.iter().map(|c| c.byte_size()).sum()
    }

    /// Total floats per vertex.
    pub fn float_count(&self) -> u32 {
        self.components.iter().map(|c| c.float_count()).sum()
    }

    /// Byte offset of component `index` within a vertex.
    pub fn offset(&self, index: usize) -> u32 {
        self.components[..index].iter().map(|c| c.byte_size()).sum()
    }

    /// Binding description for this layout at `binding`.
    pub fn binding_description(&self, binding: u32) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(binding)
            .stride(self.stride())
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// One attribute description per component, location = component index.
    pub fn attribute_descriptions(&self, binding: u32) -> Vec<vk::VertexInputAttributeDescription> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, component)| {
                vk::VertexInputAttributeDescription::default()
                    .location(i as u32)
                    .binding(binding)
                    .format(component.format())
                    .offset(self.offset(i))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_sum_of_component_sizes() {
        let layout = VertexLayout::new([
            VertexComponent::Position,
            VertexComponent::Normal,
            VertexComponent::Uv,
            VertexComponent::Color,
        ]);
        assert_eq!(layout.stride(), (3 + 3 + 2 + 3) * 4);
        assert_eq!(layout.float_count(), 11);
    }

    #[test]
    fn offsets_accumulate_preceding_sizes() {
        let layout = VertexLayout::new([
            VertexComponent::Position,
            VertexComponent::Uv,
            VertexComponent::PadFloat,
            VertexComponent::Tangent,
        ]);
        assert_eq!(layout.offset(0), 0);
        assert_eq!(layout.offset(1), 12);
        assert_eq!(layout.offset(2), 20);
        assert_eq!(layout.offset(3), 24);
        assert_eq!(layout.stride(), 36);
    }

    #[test]
    fn component_formats() {
        assert_eq!(VertexComponent::Uv.format(), vk::Format::R32G32_SFLOAT);
        assert_eq!(VertexComponent::PadFloat.format(), vk::Format::R32_SFLOAT);
        assert_eq!(
            VertexComponent::PadVec4.format(),
            vk::Format::R32G32B32A32_SFLOAT
        );
        assert_eq!(
            VertexComponent::Position.format(),
            vk::Format::R32G32B32_SFLOAT
        );
        assert_eq!(
            VertexComponent::Bitangent.format(),
            vk::Format::R32G32B32_SFLOAT
        );
    }

    #[test]
    fn attribute_locations_match_component_order() {
        let layout = VertexLayout::new([
            VertexComponent::Position,
            VertexComponent::Normal,
            VertexComponent::Uv,
        ]);
        let attributes = layout.attribute_descriptions(0);
        assert_eq!(attributes.len(), 3);
        for (i, attr) in attributes.iter().enumerate() {
            assert_eq!(attr.location, i as u32);
            assert_eq!(attr.offset, layout.offset(i));
        }
        assert_eq!(attributes[2].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn binding_description_carries_stride() {
        let layout = VertexLayout::new([VertexComponent::Position]);
        let binding = layout.binding_description(0);
        assert_eq!(binding.stride, 12);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }
}
