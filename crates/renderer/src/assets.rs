//! GPU-side meshes and materials.
//!
//! Both stores are engine-scoped: they are built once at startup and live
//! until teardown, independent of swapchain recreation.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use engine_resources::{
    CubemapData, MaterialSource, MeshRange, MeshRegistry, MeshType, ResourceError, TextureData,
};
use engine_rhi::buffer::{Buffer, BufferUsage};
use engine_rhi::command::CommandPool;
use engine_rhi::descriptor::{DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout};
use engine_rhi::device::Device;
use engine_rhi::texture::Texture;
use engine_rhi::{RhiError, RhiResult};

use crate::pipeline_type::{PerPipeline, PipelineType};

/// Maps an asset error onto the renderer's error type.
pub fn asset_error(err: ResourceError) -> RhiError {
    match err {
        ResourceError::UnknownMesh(..) | ResourceError::IndexOutOfRange { .. } => {
            RhiError::InvalidHandle(err.to_string())
        }
        _ => RhiError::TextureError(err.to_string()),
    }
}

/// Extent of a decoded texture.
#[inline]
pub fn texture_extent(data: &TextureData) -> vk::Extent2D {
    vk::Extent2D {
        width: data.width,
        height: data.height,
    }
}

/// Set-1 layout binding: one sampled image at binding 0, read by the fragment stage.
pub fn material_set_binding() -> vk::DescriptorSetLayoutBinding<'static> {
    DescriptorBindingBuilder::combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT)
}

/// The vertex and index lump for every mesh type.
pub struct MeshBuffers {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    ranges: [MeshRange; MeshType::COUNT],
}

impl MeshBuffers {
    /// Uploads the registry through staging buffers into device-local memory.
    pub fn upload(
        device: Arc<Device>,
        command_pool: &CommandPool,
        registry: &MeshRegistry,
    ) -> RhiResult<Self> {
        let mut ranges = [MeshRange::default(); MeshType::COUNT];
        for mesh_type in MeshType::ALL {
            ranges[mesh_type.index()] = registry.range(mesh_type).map_err(asset_error)?;
        }

        let vertex_buffer = Buffer::new_device_local(
            device.clone(),
            command_pool,
            BufferUsage::Vertex,
            bytemuck::cast_slice(registry.vertices()),
        )?;
        let index_buffer = Buffer::new_device_local(
            device,
            command_pool,
            BufferUsage::Index,
            bytemuck::cast_slice(registry.indices()),
        )?;

        info!(
            "Mesh lump uploaded: {} vertices, {} indices",
            registry.vertices().len(),
            registry.indices().len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            ranges,
        })
    }

    #[inline]
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    #[inline]
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Where `mesh_type` lives in the index buffer.
    #[inline]
    pub fn range(&self, mesh_type: MeshType) -> MeshRange {
        self.ranges[mesh_type.index()]
    }
}

/// Per-mesh-type textures and the sky cube map, with their set-1 layouts.
///
/// Field order drops the textures before the pools their sets came from.
pub struct Materials {
    textures: Vec<Texture>,
    cubemap: Texture,
    _pools: PerPipeline<DescriptorPool>,
    layouts: PerPipeline<DescriptorSetLayout>,
}

impl Materials {
    /// Decodes or generates every material and uploads it.
    ///
    /// # Errors
    ///
    /// Any texture that fails to load is a hard error.
    pub fn load(
        device: Arc<Device>,
        command_pool: &CommandPool,
        sources: &[MaterialSource; MeshType::COUNT],
        sky: &CubemapData,
    ) -> RhiResult<Self> {
        let layouts = PerPipeline::try_from_fn(|_| {
            DescriptorSetLayout::new(device.clone(), &[material_set_binding()])
        })?;
        let pools = PerPipeline::try_from_fn(|pipeline| {
            let max_sets = match pipeline {
                PipelineType::Sky => 1,
                PipelineType::Standard => MeshType::COUNT as u32,
            };
            DescriptorPool::new(device.clone(), max_sets, &[material_set_binding()])
        })?;

        let mut textures = Vec::with_capacity(MeshType::COUNT);
        for mesh_type in MeshType::ALL {
            let data = sources[mesh_type.index()].load().map_err(asset_error)?;
            textures.push(Texture::from_rgba(
                device.clone(),
                command_pool,
                texture_extent(&data),
                &data.pixels,
                &pools[PipelineType::Standard],
                layouts[PipelineType::Standard].handle(),
            )?);
        }

        let faces = sky.faces();
        let face_pixels: [&[u8]; 6] = [
            &faces[0].pixels,
            &faces[1].pixels,
            &faces[2].pixels,
            &faces[3].pixels,
            &faces[4].pixels,
            &faces[5].pixels,
        ];
        let cubemap = Texture::cube_from_rgba(
            device,
            command_pool,
            texture_extent(&faces[0]),
            &face_pixels,
            &pools[PipelineType::Sky],
            layouts[PipelineType::Sky].handle(),
        )?;

        info!("Loaded {} materials and the sky cube map", textures.len());

        Ok(Self {
            textures,
            cubemap,
            _pools: pools,
            layouts,
        })
    }

    /// Set-1 layout of `pipeline`.
    #[inline]
    pub fn layout(&self, pipeline: PipelineType) -> vk::DescriptorSetLayout {
        self.layouts[pipeline].handle()
    }

    /// Descriptor set binding `mesh_type`'s texture.
    #[inline]
    pub fn material_set(&self, mesh_type: MeshType) -> vk::DescriptorSet {
        self.textures[mesh_type.index()].descriptor_set()
    }

    /// Descriptor set binding the sky cube map.
    #[inline]
    pub fn sky_set(&self) -> vk::DescriptorSet {
        self.cubemap.descriptor_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_errors_map_to_texture_error() {
        let err = asset_error(ResourceError::InvalidTexture("0x0".to_string()));
        assert!(matches!(err, RhiError::TextureError(msg) if msg.contains("0x0")));
    }

    #[test]
    fn test_mesh_errors_map_to_invalid_handle() {
        let err = asset_error(ResourceError::UnknownMesh(MeshType::Star, "not registered"));
        assert!(matches!(err, RhiError::InvalidHandle(_)));
    }

    #[test]
    fn test_texture_extent() {
        let data = TextureData::solid(16, [0, 0, 0, 255]);
        assert_eq!(
            texture_extent(&data),
            vk::Extent2D {
                width: 16,
                height: 16
            }
        );
    }

    #[test]
    fn test_material_binding() {
        let binding = material_set_binding();
        assert_eq!(binding.binding, 0);
        assert_eq!(
            binding.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }
}
