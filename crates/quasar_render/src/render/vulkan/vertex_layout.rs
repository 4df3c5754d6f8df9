//! Vulkan vertex input description for [`Vertex`]

use ash::vk;

use crate::assets::Vertex;

/// Binding 0, advancing per vertex
#[allow(clippy::cast_possible_truncation)]
pub const fn binding_description() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

/// Position at location 0, texture coordinate at location 1
pub const fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
    [
        vk::VertexInputAttributeDescription {
            binding: 0,
            location: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            binding: 0,
            location: 1,
            format: vk::Format::R32G32_SFLOAT,
            offset: 12,
        },
    ]
}

/// Owned descriptions that outlive a borrowed create-info
pub struct VertexInputLayout {
    bindings: [vk::VertexInputBindingDescription; 1],
    attributes: [vk::VertexInputAttributeDescription; 2],
}

impl VertexInputLayout {
    /// Layout for [`Vertex`]
    pub const fn for_vertex() -> Self {
        Self {
            bindings: [binding_description()],
            attributes: attribute_descriptions(),
        }
    }

    /// Create-info borrowing this layout
    pub fn create_info(&self) -> vk::PipelineVertexInputStateCreateInfoBuilder<'_> {
        vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&self.bindings)
            .vertex_attribute_descriptions(&self.attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_vertex() {
        assert_eq!(binding_description().stride, 20);

        let attributes = attribute_descriptions();
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[1].location, 1);
    }
}
