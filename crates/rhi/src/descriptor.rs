//! Descriptor set layouts, pools and writes.
//!
//! Descriptors come in logical groups: per-frame camera data and
//! per-mesh-type material. Each group is described once as a slice of
//! layout bindings; the same slice produces both the set layout and the
//! pool sizes of any pool that serves it.
//!
//! Pools are never freed set-by-set. A frame-scoped pool is dropped as a
//! whole on swapchain recreation, an engine-scoped pool at teardown.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error};

use crate::device::Device;
use crate::error::RhiResult;

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    /// Creates a set layout from a group's bindings.
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)
                .inspect_err(|e| error!("Failed to create descriptor set layout: {}", e))?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool sizes for `max_sets` sets of a group: one entry per binding, each
/// sized for every set.
pub fn pool_sizes(
    bindings: &[vk::DescriptorSetLayoutBinding],
    max_sets: u32,
) -> Vec<vk::DescriptorPoolSize> {
    bindings
        .iter()
        .map(|binding| {
            vk::DescriptorPoolSize::default()
                .ty(binding.descriptor_type)
                .descriptor_count(binding.descriptor_count * max_sets)
        })
        .collect()
}

/// Descriptor pool serving one group.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    /// Creates a pool with room for `max_sets` sets laid out as `bindings`.
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let sizes = pool_sizes(bindings, max_sets);
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(&sizes);

        let pool = unsafe {
            device
                .handle()
                .create_descriptor_pool(&create_info, None)
                .inspect_err(|e| error!("Failed to create descriptor pool: {}", e))?
        };

        debug!("Created descriptor pool: max_sets={}", max_sets);

        Ok(Self {
            device,
            pool,
            max_sets,
        })
    }

    /// Allocates one set with `layout`.
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            self.device
                .handle()
                .allocate_descriptor_sets(&alloc_info)
                .inspect_err(|e| error!("Failed to allocate descriptor set: {}", e))?
        };

        Ok(sets[0])
    }

    /// Returns the Vulkan descriptor pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Returns the set capacity.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool ({} sets)", self.max_sets);
    }
}

/// Applies all `writes` in a single update call.
pub fn update_descriptor_sets(device: &Device, writes: &[vk::WriteDescriptorSet]) {
    if writes.is_empty() {
        return;
    }

    unsafe {
        device.handle().update_descriptor_sets(writes, &[]);
    }
}

/// Describes a whole-buffer binding.
#[inline]
pub fn buffer_info(buffer: vk::Buffer, range: vk::DeviceSize) -> vk::DescriptorBufferInfo {
    vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(0)
        .range(range)
}

/// Describes a sampled image in `SHADER_READ_ONLY_OPTIMAL` layout.
#[inline]
pub fn sampled_image_info(sampler: vk::Sampler, view: vk::ImageView) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(view)
        .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
}

/// Shorthands for single-descriptor layout bindings.
pub struct DescriptorBindingBuilder;

impl DescriptorBindingBuilder {
    /// Uniform buffer binding.
    #[inline]
    pub fn uniform_buffer(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        Self::single(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Storage buffer binding.
    #[inline]
    pub fn storage_buffer(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        Self::single(binding, vk::DescriptorType::STORAGE_BUFFER, stage_flags)
    }

    /// Combined image sampler binding.
    #[inline]
    pub fn combined_image_sampler(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        Self::single(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stage_flags,
        )
    }

    fn single(
        binding: u32,
        ty: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(ty)
            .descriptor_count(1)
            .stage_flags(stage_flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_binding_builder_uniform_buffer() {
        let binding = DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn test_descriptor_binding_builder_combined_image_sampler() {
        let binding =
            DescriptorBindingBuilder::combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(
            binding.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_sizes_scale_with_set_count() {
        let bindings = [
            DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
            DescriptorBindingBuilder::storage_buffer(1, vk::ShaderStageFlags::VERTEX),
        ];

        let sizes = pool_sizes(&bindings, 3);

        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].ty, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(sizes[0].descriptor_count, 3);
        assert_eq!(sizes[1].ty, vk::DescriptorType::STORAGE_BUFFER);
        assert_eq!(sizes[1].descriptor_count, 3);
    }

    #[test]
    fn test_pool_sizes_empty_group() {
        assert!(pool_sizes(&[], 4).is_empty());
    }

    #[test]
    fn test_buffer_info_covers_whole_range() {
        let info = buffer_info(vk::Buffer::null(), 192);
        assert_eq!(info.offset, 0);
        assert_eq!(info.range, 192);
    }

    #[test]
    fn test_sampled_image_info_layout() {
        let info = sampled_image_info(vk::Sampler::null(), vk::ImageView::null());
        assert_eq!(info.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }
}
