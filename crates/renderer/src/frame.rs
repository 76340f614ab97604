//! Per-swapchain-image frame resources.
//!
//! A [`Frame`] owns everything one swapchain image needs to be drawn:
//!
//! - a color view of the (driver-owned) swapchain image
//! - a depth image with its memory and view
//! - one framebuffer per [`PipelineType`]
//! - a command buffer from the engine pool
//! - the image-available / render-finished semaphores and in-flight fence
//! - persistently mapped camera, sky and transform buffers
//! - one per-frame descriptor set per [`PipelineType`]
//!
//! Dropping a frame releases all of it. Field order makes the framebuffers
//! go before the views they reference. Callers drop frames only after the
//! device is idle.

use std::sync::Arc;

use ash::vk;
use glam::Mat4;
use tracing::debug;

use engine_rhi::buffer::{Buffer, BufferUsage};
use engine_rhi::command::{CommandBuffer, CommandPool};
use engine_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, buffer_info, update_descriptor_sets,
};
use engine_rhi::device::Device;
use engine_rhi::framebuffer::Framebuffer;
use engine_rhi::image::{Image, ImageDesc, ImageView};
use engine_rhi::sync::FrameSync;
use engine_rhi::{RhiError, RhiResult};

use crate::pipeline_type::{PerPipeline, PipelineType};
use crate::ubo::{CameraUbo, SkyUbo, TRANSFORM_BUFFER_SIZE, TRANSFORM_CAPACITY};

/// Binding of the camera UBO in the standard pipeline's set 0.
pub const CAMERA_BINDING: u32 = 0;
/// Binding of the transform SSBO in the standard pipeline's set 0.
pub const TRANSFORM_BINDING: u32 = 1;
/// Binding of the sky UBO in the sky pipeline's set 0.
pub const SKY_BINDING: u32 = 0;

/// Set-0 layout bindings for `pipeline`.
pub fn frame_set_bindings(pipeline: PipelineType) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    match pipeline {
        PipelineType::Sky => vec![DescriptorBindingBuilder::uniform_buffer(
            SKY_BINDING,
            vk::ShaderStageFlags::VERTEX,
        )],
        PipelineType::Standard => vec![
            DescriptorBindingBuilder::uniform_buffer(CAMERA_BINDING, vk::ShaderStageFlags::VERTEX),
            DescriptorBindingBuilder::storage_buffer(
                TRANSFORM_BINDING,
                vk::ShaderStageFlags::VERTEX,
            ),
        ],
    }
}

/// Engine-owned objects a frame is built against.
pub struct FrameContext<'a> {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    pub extent: vk::Extent2D,
    pub render_passes: PerPipeline<vk::RenderPass>,
    pub set_layouts: PerPipeline<vk::DescriptorSetLayout>,
    pub descriptor_pools: &'a PerPipeline<DescriptorPool>,
    pub command_pool: &'a CommandPool,
}

/// Host-visible buffers read by the shaders, each mapped for the frame's lifetime.
struct FrameBuffers {
    camera: Buffer,
    sky: Buffer,
    transforms: Buffer,
}

/// Resources for one swapchain image.
pub struct Frame {
    framebuffers: PerPipeline<Framebuffer>,
    _depth: Image,
    _view: ImageView,
    image: vk::Image,
    command_buffer: CommandBuffer,
    sync: FrameSync,
    buffers: FrameBuffers,
    descriptor_sets: PerPipeline<vk::DescriptorSet>,
    device: Arc<Device>,
}

impl Frame {
    /// Builds every resource for swapchain image `image`.
    pub fn new(device: Arc<Device>, image: vk::Image, ctx: &FrameContext<'_>) -> RhiResult<Self> {
        let view = ImageView::color_2d(device.clone(), image, ctx.color_format)?;
        let depth = Self::make_depth_resources(&device, ctx.extent, ctx.depth_format)?;

        let framebuffers = PerPipeline::try_from_fn(|pipeline| {
            let mut attachments = vec![view.handle()];
            if pipeline == PipelineType::Standard {
                attachments.push(depth.view());
            }
            Framebuffer::new(
                device.clone(),
                ctx.render_passes[pipeline],
                &attachments,
                ctx.extent,
            )
        })?;

        let buffers = Self::make_descriptor_resources(&device)?;
        let descriptor_sets = PerPipeline::try_from_fn(|pipeline| {
            ctx.descriptor_pools[pipeline].allocate(ctx.set_layouts[pipeline])
        })?;
        let sync = FrameSync::new(device.clone())?;
        let command_buffer = ctx.command_pool.allocate()?;

        let frame = Self {
            framebuffers,
            _depth: depth,
            _view: view,
            image,
            command_buffer,
            sync,
            buffers,
            descriptor_sets,
            device,
        };
        frame.write_descriptor_set();

        debug!(
            "Created frame for image {:?} ({}x{})",
            image, ctx.extent.width, ctx.extent.height
        );

        Ok(frame)
    }

    /// Creates the depth image, its memory and its view.
    fn make_depth_resources(
        device: &Arc<Device>,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> RhiResult<Image> {
        Image::new(device.clone(), ImageDesc::depth(extent, format))
    }

    /// Creates the mapped camera, sky and transform buffers. Transforms start
    /// as identity.
    fn make_descriptor_resources(device: &Arc<Device>) -> RhiResult<FrameBuffers> {
        let camera = Buffer::new(
            device.clone(),
            BufferUsage::Uniform,
            CameraUbo::SIZE as vk::DeviceSize,
        )?;
        let sky = Buffer::new(
            device.clone(),
            BufferUsage::Uniform,
            SkyUbo::SIZE as vk::DeviceSize,
        )?;
        let transforms = Buffer::new(
            device.clone(),
            BufferUsage::Storage,
            TRANSFORM_BUFFER_SIZE as vk::DeviceSize,
        )?;
        transforms.write_slice(0, &[Mat4::IDENTITY; TRANSFORM_CAPACITY])?;

        Ok(FrameBuffers {
            camera,
            sky,
            transforms,
        })
    }

    /// Points every per-frame descriptor at this frame's buffers in one
    /// update call.
    pub fn write_descriptor_set(&self) {
        let sky_info = [buffer_info(self.buffers.sky.handle(), SkyUbo::SIZE as u64)];
        let camera_info = [buffer_info(
            self.buffers.camera.handle(),
            CameraUbo::SIZE as u64,
        )];
        let transform_info = [buffer_info(
            self.buffers.transforms.handle(),
            TRANSFORM_BUFFER_SIZE as u64,
        )];

        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(self.descriptor_sets[PipelineType::Sky])
                .dst_binding(SKY_BINDING)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&sky_info),
            vk::WriteDescriptorSet::default()
                .dst_set(self.descriptor_sets[PipelineType::Standard])
                .dst_binding(CAMERA_BINDING)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&camera_info),
            vk::WriteDescriptorSet::default()
                .dst_set(self.descriptor_sets[PipelineType::Standard])
                .dst_binding(TRANSFORM_BINDING)
                .dst_array_element(0)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(&transform_info),
        ];
        update_descriptor_sets(&self.device, &writes);
    }

    pub fn write_camera(&self, camera: &CameraUbo) -> RhiResult<()> {
        self.buffers.camera.write_pod(0, camera)
    }

    pub fn write_sky(&self, sky: &SkyUbo) -> RhiResult<()> {
        self.buffers.sky.write_pod(0, sky)
    }

    /// Copies model matrices to the start of the transform buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::CapacityExceeded`] for more than
    /// [`TRANSFORM_CAPACITY`] matrices.
    pub fn write_transforms(&self, transforms: &[Mat4]) -> RhiResult<()> {
        if transforms.len() > TRANSFORM_CAPACITY {
            return Err(RhiError::CapacityExceeded {
                resource: "instance transforms",
                requested: transforms.len(),
                capacity: TRANSFORM_CAPACITY,
            });
        }
        self.buffers.transforms.write_slice(0, transforms)
    }

    /// The swapchain image this frame draws to.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    #[inline]
    pub fn framebuffer(&self, pipeline: PipelineType) -> vk::Framebuffer {
        self.framebuffers[pipeline].handle()
    }

    #[inline]
    pub fn descriptor_set(&self, pipeline: PipelineType) -> vk::DescriptorSet {
        self.descriptor_sets[pipeline]
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    #[inline]
    pub fn sync(&self) -> &FrameSync {
        &self.sync
    }
}
