//! Vertex data structures and input descriptions.
//!
//! [`MeshVertex`] is the one vertex format the standard pipeline consumes.
//! The sky pipeline has no vertex input at all; its vertices are generated
//! in the shader.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Interleaved mesh vertex.
///
/// # Memory Layout
///
/// - Offset 0: position (12 bytes)
/// - Offset 12: color (12 bytes)
/// - Offset 24: tex_coord (8 bytes)
/// - Offset 32: normal (12 bytes)
/// - Total size: 44 bytes
///
/// # Shader Locations
///
/// - location 0: position (vec3)
/// - location 1: color (vec3)
/// - location 2: tex_coord (vec2)
/// - location 3: normal (vec3)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Position in model space.
    pub position: Vec3,
    /// Vertex color, multiplied with the material texture.
    pub color: Vec3,
    /// Texture coordinates.
    pub tex_coord: Vec2,
    /// Surface normal.
    pub normal: Vec3,
}

impl MeshVertex {
    /// Creates a vertex.
    #[inline]
    pub const fn new(position: Vec3, color: Vec3, tex_coord: Vec2, normal: Vec3) -> Self {
        Self {
            position,
            color,
            tex_coord,
            normal,
        }
    }

    /// Returns the size of the vertex in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Get the vertex input binding description.
    ///
    /// Returns a binding description for binding 0 with per-vertex input rate.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Get the vertex attribute descriptions.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Self, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Self, color) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32_SFLOAT,
                offset: std::mem::offset_of!(Self, tex_coord) as u32,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 3,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: std::mem::offset_of!(Self, normal) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_vertex_size() {
        // Vec3 (12) + Vec3 (12) + Vec2 (8) + Vec3 (12) = 44 bytes
        assert_eq!(std::mem::size_of::<MeshVertex>(), 44);
        assert_eq!(MeshVertex::size(), 44);
    }

    #[test]
    fn test_mesh_vertex_binding_description() {
        let binding = MeshVertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 44);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_mesh_vertex_attribute_descriptions() {
        let attrs = MeshVertex::attribute_descriptions();

        let expected = [
            (0, vk::Format::R32G32B32_SFLOAT, 0),
            (1, vk::Format::R32G32B32_SFLOAT, 12),
            (2, vk::Format::R32G32_SFLOAT, 24),
            (3, vk::Format::R32G32B32_SFLOAT, 32),
        ];
        for (attr, (location, format, offset)) in attrs.iter().zip(expected) {
            assert_eq!(attr.binding, 0);
            assert_eq!(attr.location, location);
            assert_eq!(attr.format, format);
            assert_eq!(attr.offset, offset);
        }
    }

    #[test]
    fn test_mesh_vertex_bytes() {
        let vertex = MeshVertex::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.5, 0.6, 0.7),
            Vec2::new(0.25, 0.75),
            Vec3::Z,
        );

        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 44);

        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(floats[0..3], [1.0, 2.0, 3.0]);
        assert_eq!(floats[6..8], [0.25, 0.75]);
        assert_eq!(floats[8..11], [0.0, 0.0, 1.0]);
    }
}
