//! The engine context.
//!
//! [`Renderer`] owns every Vulkan object and implements [`FrameBackend`], so
//! [`FrameLoop`](crate::frame_loop::FrameLoop) can drive it one frame at a time.
//!
//! # Overview
//!
//! ```text
//! Instance -> Surface -> Device -> CommandPool
//!                          |-> MeshBuffers, Materials        (engine-scoped)
//!                          |-> frame set layouts, pipelines  (engine-scoped)
//!                          '-> Swapchain -> frame pools -> FrameRing<Frame>
//!                                          (rebuilt on every recreation)
//! ```
//!
//! Each frame records two passes into the slot's command buffer: the sky pass
//! clears the image and draws the cube map, and the standard pass loads that
//! color and draws every mesh type's instances with depth testing.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use engine_core::EngineConfig;
use engine_platform::{Surface, Window};
use engine_resources::{CubemapData, MaterialSource, MeshRegistry, MeshType};
use engine_rhi::command::CommandPool;
use engine_rhi::descriptor::{DescriptorPool, DescriptorSetLayout};
use engine_rhi::device::Device;
use engine_rhi::instance::Instance;
use engine_rhi::physical_device::select_physical_device;
use engine_rhi::pipeline::{CullMode, FrontFace, GraphicsPipelineBuilder, PipelineBundle};
use engine_rhi::render_pass::ColorLoad;
use engine_rhi::swapchain::{AcquireOutcome, Swapchain};
use engine_rhi::vertex::MeshVertex;
use engine_rhi::{RhiError, RhiResult};
use engine_scene::{Camera, Scene, aspect_ratio};

use crate::assets::{Materials, MeshBuffers, asset_error};
use crate::draw::plan_draws;
use crate::frame::{Frame, FrameContext, frame_set_bindings};
use crate::frame_loop::{FrameBackend, wait_for_nonzero_extent};
use crate::frame_ring::FrameRing;
use crate::pipeline_type::{PerPipeline, PipelineType};
use crate::ubo::{CameraUbo, SkyUbo};

/// Edge length of the generated sky cube map faces.
const SKY_FACE_SIZE: u32 = 128;

/// Vertices of the full-screen sky triangle pair, generated in the shader.
const SKY_VERTEX_COUNT: u32 = 6;

/// Owns the whole Vulkan state for one window.
///
/// Fields drop top to bottom: frames before the pools, layouts and
/// swapchain they were built from, and everything before the device,
/// surface and instance.
pub struct Renderer {
    // Swapchain-scoped
    frames: FrameRing<Frame>,
    frame_pools: Option<PerPipeline<DescriptorPool>>,
    swapchain: Option<Swapchain>,

    // Engine-scoped
    pipelines: PerPipeline<PipelineBundle>,
    frame_layouts: PerPipeline<DescriptorSetLayout>,
    materials: Materials,
    meshes: MeshBuffers,
    command_pool: CommandPool,

    // Core Vulkan objects
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,
    window: Arc<Window>,

    // State
    config: EngineConfig,
    scene: Scene,
    camera: Camera,
    color_format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,
    resize_requested: bool,
}

impl Renderer {
    /// Creates a renderer drawing `scene` into `window`.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: no Vulkan loader, no suitable GPU, no
    /// swapchain support, no depth format, missing shaders or bad assets.
    pub fn new(window: Arc<Window>, config: EngineConfig, scene: Scene) -> RhiResult<Self> {
        let (width, height) = window.size();
        info!("Initializing renderer ({}x{})", width, height);

        let extensions = window
            .required_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Instance::new(&config.title, &extensions, config.debug)?;
        debug!("Validation layers enabled: {}", instance.has_validation());

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), instance.surface_loader())?;
        let device = Device::new(&instance, &physical_device_info)?;
        let depth_format = device.depth_format()?;

        let command_pool = CommandPool::new(device.clone(), device.queue_families().graphics)?;

        let registry = MeshRegistry::builtin().map_err(asset_error)?;
        let meshes = MeshBuffers::upload(device.clone(), &command_pool, &registry)?;

        let sources = MeshType::ALL.map(MaterialSource::default_for);
        let materials = Materials::load(
            device.clone(),
            &command_pool,
            &sources,
            &CubemapData::sky(SKY_FACE_SIZE),
        )?;

        let frame_layouts = PerPipeline::try_from_fn(|pipeline| {
            DescriptorSetLayout::new(device.clone(), &frame_set_bindings(pipeline))
        })?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;
        let color_format = swapchain.format();
        let extent = swapchain.extent();

        let pipelines = build_pipelines(
            &device,
            &config,
            color_format,
            depth_format,
            &frame_layouts,
            &materials,
        )?;

        let mut renderer = Self {
            frames: FrameRing::new(),
            frame_pools: None,
            swapchain: Some(swapchain),
            pipelines,
            frame_layouts,
            materials,
            meshes,
            command_pool,
            device,
            surface,
            instance,
            window,
            config,
            scene,
            camera: Camera::new(),
            color_format,
            depth_format,
            extent,
            resize_requested: false,
        };
        renderer.build_frames()?;

        info!(
            "Renderer initialized: {} frames, {} instances",
            renderer.frames.len(),
            renderer.scene.total_instances()
        );

        Ok(renderer)
    }

    /// Schedules swapchain recreation before the next frame.
    pub fn request_resize(&mut self) {
        debug!("Swapchain recreation requested");
        self.resize_requested = true;
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Blocks until the GPU has finished all submitted work.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }

    fn swapchain(&self) -> RhiResult<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("swapchain is not built".to_string()))
    }

    fn frame(&self, slot: usize) -> RhiResult<&Frame> {
        self.frames
            .get(slot)
            .ok_or_else(|| RhiError::InvalidHandle(format!("no frame in slot {}", slot)))
    }

    /// Creates the frame descriptor pools and one frame per swapchain image.
    fn build_frames(&mut self) -> RhiResult<()> {
        let swapchain = self
            .swapchain
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("swapchain is not built".to_string()))?;
        let count = swapchain.image_count();

        let pools = self.frame_pools.insert(PerPipeline::try_from_fn(|pipeline| {
            DescriptorPool::new(
                self.device.clone(),
                count as u32,
                &frame_set_bindings(pipeline),
            )
        })?);

        let ctx = FrameContext {
            color_format: self.color_format,
            depth_format: self.depth_format,
            extent: self.extent,
            render_passes: PerPipeline::from_fn(|p| self.pipelines[p].render_pass.handle()),
            set_layouts: PerPipeline::from_fn(|p| self.frame_layouts[p].handle()),
            descriptor_pools: pools,
            command_pool: &self.command_pool,
        };

        let images = swapchain.images();
        let device = &self.device;
        self.frames
            .rebuild(count, |slot| Frame::new(device.clone(), images[slot], &ctx))?;

        debug!("Built {} frames", count);
        Ok(())
    }

    /// Writes the slot's uniform and storage buffers.
    fn update_frame(&self, slot: usize) -> RhiResult<()> {
        let frame = self.frame(slot)?;
        let aspect = aspect_ratio(self.extent.width, self.extent.height);

        frame.write_camera(&CameraUbo::from_camera(&self.camera, aspect))?;
        frame.write_sky(&SkyUbo::from_camera(&self.camera, aspect))?;

        let transforms: Vec<_> = self.scene.model_transforms().collect();
        frame.write_transforms(&transforms)?;

        frame.write_descriptor_set();
        Ok(())
    }

    /// Records the sky and standard passes for `image_index` into the slot's
    /// command buffer.
    fn record_commands(&self, slot: usize, image_index: u32) -> RhiResult<()> {
        let frame = self.frame(slot)?;
        let target = self.frame(image_index as usize)?;
        let cmd = frame.command_buffer();
        let plan = plan_draws(&self.scene.instance_counts())?;

        cmd.begin()?;

        // Sky
        let sky = &self.pipelines[PipelineType::Sky];
        let clear_color = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.config.clear_color,
            },
        }];
        cmd.begin_render_pass(
            sky.render_pass.handle(),
            target.framebuffer(PipelineType::Sky),
            self.extent,
            &clear_color,
        );
        cmd.set_full_viewport(self.extent);
        cmd.bind_graphics_pipeline(sky.pipeline.handle());
        cmd.bind_descriptor_sets(
            sky.layout.handle(),
            0,
            &[frame.descriptor_set(PipelineType::Sky), self.materials.sky_set()],
        );
        cmd.draw(SKY_VERTEX_COUNT, 1, 0, 0);
        cmd.end_render_pass();

        // Standard
        let standard = &self.pipelines[PipelineType::Standard];
        let clear_values = [
            vk::ClearValue::default(),
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        cmd.begin_render_pass(
            standard.render_pass.handle(),
            target.framebuffer(PipelineType::Standard),
            self.extent,
            &clear_values,
        );
        cmd.set_full_viewport(self.extent);
        cmd.bind_graphics_pipeline(standard.pipeline.handle());
        cmd.bind_descriptor_sets(
            standard.layout.handle(),
            0,
            &[frame.descriptor_set(PipelineType::Standard)],
        );
        cmd.bind_vertex_buffers(0, &[self.meshes.vertex_buffer()], &[0]);
        cmd.bind_index_buffer(self.meshes.index_buffer(), 0, vk::IndexType::UINT32);

        for draw in &plan.commands {
            let range = self.meshes.range(draw.mesh_type);
            cmd.bind_descriptor_sets(
                standard.layout.handle(),
                1,
                &[self.materials.material_set(draw.mesh_type)],
            );
            cmd.draw_indexed(
                range.index_count,
                draw.instance_count,
                range.first_index,
                0,
                draw.first_instance,
            );
        }
        cmd.end_render_pass();

        cmd.end()
    }

    /// Waits for a drawable window, then rebuilds the swapchain, the
    /// pipelines if the surface format changed, and every frame.
    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        let (width, height) = wait_for_nonzero_extent(&*self.window);
        self.device.wait_idle()?;

        // Old frames go first: they reference the chain's images and the pools.
        self.frames.clear();
        self.frame_pools = None;
        self.swapchain = None;

        let swapchain = Swapchain::new(
            &self.instance,
            self.device.clone(),
            self.surface.handle(),
            width,
            height,
        )
        .inspect_err(|e| error!("Swapchain recreation failed: {}", e))?;

        if swapchain.format() != self.color_format {
            info!(
                "Surface format changed {:?} -> {:?}, rebuilding pipelines",
                self.color_format,
                swapchain.format()
            );
            self.pipelines = build_pipelines(
                &self.device,
                &self.config,
                swapchain.format(),
                self.depth_format,
                &self.frame_layouts,
                &self.materials,
            )?;
            self.color_format = swapchain.format();
        }

        self.extent = swapchain.extent();
        self.swapchain = Some(swapchain);
        self.build_frames()?;
        self.resize_requested = false;

        info!(
            "Swapchain recreated: {}x{}, {} frames",
            self.extent.width,
            self.extent.height,
            self.frames.len()
        );
        Ok(())
    }
}

impl FrameBackend for Renderer {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn take_resize_request(&mut self) -> bool {
        std::mem::take(&mut self.resize_requested)
    }

    fn wait_for_slot(&mut self, slot: usize) -> RhiResult<()> {
        self.frame(slot)?.sync().in_flight().wait(u64::MAX)
    }

    fn acquire(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
        let semaphore = self.frame(slot)?.sync().image_available();
        self.swapchain()?.acquire_next_image(semaphore)
    }

    fn reset_commands(&mut self, slot: usize) -> RhiResult<()> {
        self.frame(slot)?.command_buffer().reset()
    }

    fn update(&mut self, slot: usize, _image_index: u32) -> RhiResult<()> {
        self.update_frame(slot)
    }

    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        self.record_commands(slot, image_index)
    }

    fn submit(&mut self, slot: usize) -> RhiResult<()> {
        let frame = self.frame(slot)?;
        let sync = frame.sync();

        let wait_semaphores = [sync.image_available()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished()];
        let command_buffers = [frame.command_buffer().handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        sync.in_flight().reset()?;
        unsafe {
            self.device
                .handle()
                .queue_submit(
                    self.device.graphics_queue(),
                    &[submit_info],
                    sync.in_flight().handle(),
                )
                .inspect_err(|e| error!("Failed to submit frame {}: {}", slot, e))?;
        }
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<bool> {
        let render_finished = self.frame(slot)?.sync().render_finished();
        self.swapchain()?
            .present(self.device.present_queue(), image_index, render_finished)
    }

    fn recreate(&mut self) -> RhiResult<()> {
        self.recreate_swapchain()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during shutdown: {}", e);
        }
        debug!("Destroying renderer");
    }
}

/// Builds the sky and standard pipelines for `color_format`.
///
/// Viewport and scissor are dynamic, so the bundles survive resizes and only
/// need rebuilding when the surface format changes.
fn build_pipelines(
    device: &Arc<Device>,
    config: &EngineConfig,
    color_format: vk::Format,
    depth_format: vk::Format,
    frame_layouts: &PerPipeline<DescriptorSetLayout>,
    materials: &Materials,
) -> RhiResult<PerPipeline<PipelineBundle>> {
    PerPipeline::try_from_fn(|pipeline| {
        let builder = GraphicsPipelineBuilder::new()
            .descriptor_set_layout(frame_layouts[pipeline].handle())
            .descriptor_set_layout(materials.layout(pipeline))
            .front_face(FrontFace::CounterClockwise)
            .cull_mode(CullMode::None);

        let builder = match pipeline {
            PipelineType::Sky => builder
                .vertex_shader(config.shader_path("sky.vert.spv"))
                .fragment_shader(config.shader_path("sky.frag.spv"))
                .color_attachment(color_format, ColorLoad::Clear),
            PipelineType::Standard => builder
                .vertex_format(
                    MeshVertex::binding_description(),
                    &MeshVertex::attribute_descriptions(),
                )
                .vertex_shader(config.shader_path("shader.vert.spv"))
                .fragment_shader(config.shader_path("shader.frag.spv"))
                .color_attachment(color_format, ColorLoad::Preserve)
                .depth_attachment(depth_format),
        };

        let bundle = builder
            .build(device.clone())
            .inspect_err(|e| error!("Failed to build {} pipeline: {}", pipeline.name(), e))?;
        info!("Built {} pipeline", pipeline.name());
        Ok(bundle)
    })
}
