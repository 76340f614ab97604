//! Sampled textures: 2D material textures and the sky cube map.
//!
//! A [`Texture`] is an [`Image`] plus a sampler and a descriptor set that
//! binds the pair at binding 0. Pixel data is RGBA8, uploaded through a
//! staging buffer with one blocking transfer:
//!
//! 1. `UNDEFINED -> TRANSFER_DST_OPTIMAL`
//! 2. buffer-to-image copy, one region per layer
//! 3. `TRANSFER_DST_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL`

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error};

use crate::buffer::{Buffer, BufferUsage};
use crate::command::CommandPool;
use crate::descriptor::{DescriptorPool, sampled_image_info, update_descriptor_sets};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageDesc};

/// Bytes per texel of the RGBA8 formats used for textures.
pub const BYTES_PER_TEXEL: u64 = 4;

/// Number of faces of a cube map.
pub const CUBE_FACES: usize = 6;

/// Number of bytes a full upload of `layers` layers of `extent` needs.
pub fn upload_size(extent: vk::Extent2D, layers: u32) -> u64 {
    extent.width as u64 * extent.height as u64 * BYTES_PER_TEXEL * layers as u64
}

/// One copy region per layer, tightly packed one after the other.
pub fn copy_regions(extent: vk::Extent2D, layers: u32) -> Vec<vk::BufferImageCopy> {
    let layer_size = upload_size(extent, 1);
    (0..layers)
        .map(|layer| {
            vk::BufferImageCopy::default()
                .buffer_offset(layer_size * layer as u64)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .mip_level(0)
                        .base_array_layer(layer)
                        .layer_count(1),
                )
                .image_offset(vk::Offset3D::default())
                .image_extent(vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                })
        })
        .collect()
}

/// Layout transition for every layer of a color image, with the stages the
/// barrier must sit between.
///
/// Only the two transitions an upload needs are supported.
pub fn layout_transition(
    image: vk::Image,
    layers: u32,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> RhiResult<(
    vk::ImageMemoryBarrier<'static>,
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
)> {
    let (src_access, dst_access, src_stage, dst_stage) = match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => (
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        ),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => (
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
        ),
        _ => {
            return Err(RhiError::TextureError(format!(
                "Unsupported layout transition {:?} -> {:?}",
                old_layout, new_layout
            )));
        }
    };

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(layers),
        )
        .src_access_mask(src_access)
        .dst_access_mask(dst_access);

    Ok((barrier, src_stage, dst_stage))
}

/// Sampler settings shared by all textures: nearest minification, linear
/// magnification, repeat addressing, no anisotropy.
pub fn sampler_create_info() -> vk::SamplerCreateInfo<'static> {
    vk::SamplerCreateInfo::default()
        .min_filter(vk::Filter::NEAREST)
        .mag_filter(vk::Filter::LINEAR)
        .address_mode_u(vk::SamplerAddressMode::REPEAT)
        .address_mode_v(vk::SamplerAddressMode::REPEAT)
        .address_mode_w(vk::SamplerAddressMode::REPEAT)
        .anisotropy_enable(false)
        .max_anisotropy(1.0)
        .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
        .unnormalized_coordinates(false)
        .compare_enable(false)
        .compare_op(vk::CompareOp::ALWAYS)
        .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
        .mip_lod_bias(0.0)
        .min_lod(0.0)
        .max_lod(0.0)
}

/// Device-resident sampled texture with its descriptor set.
pub struct Texture {
    image: Image,
    sampler: vk::Sampler,
    descriptor_set: vk::DescriptorSet,
}

impl Texture {
    /// Uploads a single RGBA8 image.
    pub fn from_rgba(
        device: Arc<Device>,
        command_pool: &CommandPool,
        extent: vk::Extent2D,
        pixels: &[u8],
        descriptor_pool: &DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RhiResult<Self> {
        Self::new(
            device,
            command_pool,
            ImageDesc::texture(extent),
            pixels,
            descriptor_pool,
            layout,
        )
    }

    /// Uploads six RGBA8 faces of equal size as a cube map.
    ///
    /// Faces are in Vulkan layer order: +X, -X, +Y, -Y, +Z, -Z.
    pub fn cube_from_rgba(
        device: Arc<Device>,
        command_pool: &CommandPool,
        extent: vk::Extent2D,
        faces: &[&[u8]; CUBE_FACES],
        descriptor_pool: &DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RhiResult<Self> {
        let pixels = faces.concat();
        Self::new(
            device,
            command_pool,
            ImageDesc::cube_map(extent),
            &pixels,
            descriptor_pool,
            layout,
        )
    }

    /// Creates the image described by `desc`, fills every layer from
    /// `pixels` and makes the descriptor set.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::TextureError`] if `pixels` does not hold exactly
    /// one RGBA8 image per layer, or any error from the GPU calls.
    pub fn new(
        device: Arc<Device>,
        command_pool: &CommandPool,
        desc: ImageDesc,
        pixels: &[u8],
        descriptor_pool: &DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RhiResult<Self> {
        let expected = upload_size(desc.extent, desc.array_layers);
        if pixels.len() as u64 != expected {
            return Err(RhiError::TextureError(format!(
                "{} expects {} bytes of pixel data, got {}",
                desc.name,
                expected,
                pixels.len()
            )));
        }

        let image = Image::new(device.clone(), desc)?;
        upload(&device, command_pool, &image, pixels)?;

        let sampler = unsafe {
            device
                .handle()
                .create_sampler(&sampler_create_info(), None)
                .inspect_err(|e| error!("Failed to create {} sampler: {}", desc.name, e))?
        };

        let mut texture = Self {
            image,
            sampler,
            descriptor_set: vk::DescriptorSet::null(),
        };

        texture.descriptor_set = descriptor_pool.allocate(layout)?;
        let image_infos = [sampled_image_info(texture.sampler, texture.image.view())];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(texture.descriptor_set)
            .dst_binding(0)
            .dst_array_element(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_infos);
        update_descriptor_sets(&device, &[write]);

        debug!(
            "Created {} {}x{} with {} layer(s)",
            desc.name, desc.extent.width, desc.extent.height, desc.array_layers
        );

        Ok(texture)
    }

    /// Returns the descriptor set binding this texture at binding 0.
    #[inline]
    pub fn descriptor_set(&self) -> vk::DescriptorSet {
        self.descriptor_set
    }

    /// Returns the underlying image.
    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Returns the sampler handle.
    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        // The descriptor set goes away with its pool.
        unsafe {
            self.image
                .device()
                .handle()
                .destroy_sampler(self.sampler, None);
        }
    }
}

fn upload(device: &Arc<Device>, pool: &CommandPool, image: &Image, pixels: &[u8]) -> RhiResult<()> {
    let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, pixels)?;
    let layers = image.layers();

    let (to_transfer, to_transfer_src, to_transfer_dst) = layout_transition(
        image.handle(),
        layers,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    )?;
    let (to_sampled, to_sampled_src, to_sampled_dst) = layout_transition(
        image.handle(),
        layers,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )?;
    let regions = copy_regions(image.extent(), layers);

    pool.one_time_submit(device.graphics_queue(), |cmd| {
        cmd.pipeline_barrier(to_transfer_src, to_transfer_dst, &[to_transfer]);
        cmd.copy_buffer_to_image(staging.handle(), image.handle(), &regions);
        cmd.pipeline_barrier(to_sampled_src, to_sampled_dst, &[to_sampled]);
    })
}
