//! Graphics pipeline construction.
//!
//! [`GraphicsPipelineBuilder`] collects vertex format, shader paths,
//! attachments and descriptor set layouts, then [`GraphicsPipelineBuilder::build`]
//! produces a [`PipelineBundle`]: the pipeline layout, the render pass the
//! pipeline is compatible with, and the pipeline itself.
//!
//! Viewport and scissor are dynamic, so a bundle survives window resizes. It
//! only has to be rebuilt when the swapchain format changes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use engine_rhi::device::Device;
//! use engine_rhi::pipeline::GraphicsPipelineBuilder;
//! use engine_rhi::render_pass::ColorLoad;
//!
//! # fn example(device: Arc<Device>, set_layout: vk::DescriptorSetLayout) -> Result<(), engine_rhi::RhiError> {
//! let bundle = GraphicsPipelineBuilder::new()
//!     .vertex_shader("shaders/spirv/sky.vert.spv")
//!     .fragment_shader("shaders/spirv/sky.frag.spv")
//!     .color_attachment(vk::Format::B8G8R8A8_UNORM, ColorLoad::DontCare)
//!     .descriptor_set_layout(set_layout)
//!     .build(device)?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::render_pass::{ColorLoad, RenderPass};
use crate::shader::{Shader, ShaderStage};

/// Vulkan pipeline layout wrapper.
pub struct PipelineLayout {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
}

impl PipelineLayout {
    /// Creates a layout over `descriptor_set_layouts`, in set order.
    pub fn new(
        device: Arc<Device>,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Self> {
        let create_info =
            vk::PipelineLayoutCreateInfo::default().set_layouts(descriptor_set_layouts);

        let layout = unsafe {
            device
                .handle()
                .create_pipeline_layout(&create_info, None)
                .inspect_err(|e| error!("Failed to create pipeline layout: {}", e))?
        };

        debug!(
            "Created pipeline layout with {} descriptor set layout(s)",
            descriptor_set_layouts.len()
        );

        Ok(Self { device, layout })
    }

    /// Returns the Vulkan pipeline layout handle.
    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Vulkan graphics pipeline wrapper.
pub struct Pipeline {
    device: Arc<Device>,
    pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Returns the Vulkan pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_pipeline(self.pipeline, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}

/// Everything [`GraphicsPipelineBuilder::build`] produces.
///
/// Fields drop in declaration order: the pipeline before the render pass
/// and layout it was created against.
pub struct PipelineBundle {
    /// The graphics pipeline.
    pub pipeline: Pipeline,
    /// Render pass the pipeline draws into.
    pub render_pass: RenderPass,
    /// Layout describing the pipeline's descriptor sets.
    pub layout: PipelineLayout,
}

/// Face culling mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    /// Do not cull any faces.
    None,
    /// Cull back-facing triangles.
    #[default]
    Back,
}

impl CullMode {
    /// Converts to Vulkan cull mode flags.
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            CullMode::None => vk::CullModeFlags::NONE,
            CullMode::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Front face winding order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrontFace {
    /// Counter-clockwise winding is front-facing.
    #[default]
    CounterClockwise,
    /// Clockwise winding is front-facing.
    Clockwise,
}

impl FrontFace {
    /// Converts to Vulkan front face.
    pub fn to_vk(self) -> vk::FrontFace {
        match self {
            FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
            FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        }
    }
}

/// Builder for a [`PipelineBundle`].
///
/// Defaults: triangle list, fill, back-face culling with counter-clockwise
/// front faces, no blending, no vertex input, no depth.
#[derive(Clone, Debug, Default)]
pub struct GraphicsPipelineBuilder {
    vertex_shader: Option<PathBuf>,
    fragment_shader: Option<PathBuf>,
    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    cull_mode: CullMode,
    front_face: FrontFace,
    color: Option<(vk::Format, ColorLoad)>,
    depth_format: Option<vk::Format>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
}

impl GraphicsPipelineBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the vertex buffer format. Leave unset for pipelines that
    /// generate vertices in the shader.
    pub fn vertex_format(
        mut self,
        binding: vk::VertexInputBindingDescription,
        attributes: &[vk::VertexInputAttributeDescription],
    ) -> Self {
        self.vertex_bindings = vec![binding];
        self.vertex_attributes = attributes.to_vec();
        self
    }

    /// Sets the SPIR-V file for the vertex stage.
    pub fn vertex_shader(mut self, path: impl AsRef<Path>) -> Self {
        self.vertex_shader = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the SPIR-V file for the fragment stage.
    pub fn fragment_shader(mut self, path: impl AsRef<Path>) -> Self {
        self.fragment_shader = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the face culling mode.
    pub fn cull_mode(mut self, mode: CullMode) -> Self {
        self.cull_mode = mode;
        self
    }

    /// Sets the front face winding order.
    pub fn front_face(mut self, face: FrontFace) -> Self {
        self.front_face = face;
        self
    }

    /// Sets the color attachment (index 0) and its load policy.
    pub fn color_attachment(mut self, format: vk::Format, load: ColorLoad) -> Self {
        self.color = Some((format, load));
        self
    }

    /// Adds a depth attachment (index 1) and turns on depth test and write.
    pub fn depth_attachment(mut self, format: vk::Format) -> Self {
        self.depth_format = Some(format);
        self
    }

    /// Appends a descriptor set layout; sets are numbered in call order.
    pub fn descriptor_set_layout(mut self, layout: vk::DescriptorSetLayout) -> Self {
        self.set_layouts.push(layout);
        self
    }

    /// Returns true if the pipeline will be depth tested.
    pub fn has_depth_test(&self) -> bool {
        self.depth_format.is_some()
    }

    fn required(&self) -> RhiResult<(&Path, &Path, vk::Format, ColorLoad)> {
        let vertex = self
            .vertex_shader
            .as_deref()
            .ok_or_else(|| RhiError::PipelineError("Vertex shader is required".to_string()))?;
        let fragment = self
            .fragment_shader
            .as_deref()
            .ok_or_else(|| RhiError::PipelineError("Fragment shader is required".to_string()))?;
        let (format, load) = self.color.ok_or_else(|| {
            RhiError::PipelineError("A color attachment is required".to_string())
        })?;
        Ok((vertex, fragment, format, load))
    }

    /// Creates the layout, render pass and pipeline.
    ///
    /// Shader modules are loaded at the start of the call and destroyed
    /// before it returns.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::PipelineError`] if a shader or the color
    /// attachment is missing, or the underlying error of any failed step.
    pub fn build(self, device: Arc<Device>) -> RhiResult<PipelineBundle> {
        let (vertex_path, fragment_path, color_format, color_load) = self.required()?;

        let vertex_shader = Shader::from_spirv_file(device.clone(), vertex_path, ShaderStage::Vertex)?;
        let fragment_shader =
            Shader::from_spirv_file(device.clone(), fragment_path, ShaderStage::Fragment)?;

        let layout = PipelineLayout::new(device.clone(), &self.set_layouts)?;
        let render_pass = RenderPass::new(device.clone(), color_format, color_load, self.depth_format)?;

        let shader_stages = [
            vertex_shader.stage_create_info(),
            fragment_shader.stage_create_info(),
        ];

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&self.vertex_bindings)
            .vertex_attribute_descriptions(&self.vertex_attributes);

        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are set at record time.
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode.to_vk())
            .front_face(self.front_face.to_vk())
            .depth_bias_enable(false);

        let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_tested = self.has_depth_test();
        let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(depth_tested)
            .depth_write_enable(depth_tested)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let mut pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout.handle())
            .render_pass(render_pass.handle())
            .subpass(0);
        if depth_tested {
            pipeline_info = pipeline_info.depth_stencil_state(&depth_stencil_state);
        }

        let pipeline = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, result)| {
                    error!("Failed to create graphics pipeline: {}", result);
                    result
                })?[0]
        };

        info!(
            "Graphics pipeline created ({:?}, depth test: {})",
            vertex_path.file_name().unwrap_or_default(),
            depth_tested
        );

        Ok(PipelineBundle {
            pipeline: Pipeline { device, pipeline },
            render_pass,
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cull_mode_to_vk() {
        assert_eq!(CullMode::None.to_vk(), vk::CullModeFlags::NONE);
        assert_eq!(CullMode::Back.to_vk(), vk::CullModeFlags::BACK);
        assert_eq!(CullMode::default(), CullMode::Back);
    }

    #[test]
    fn test_front_face_to_vk() {
        assert_eq!(
            FrontFace::CounterClockwise.to_vk(),
            vk::FrontFace::COUNTER_CLOCKWISE
        );
        assert_eq!(FrontFace::Clockwise.to_vk(), vk::FrontFace::CLOCKWISE);
    }

    #[test]
    fn test_builder_requires_shaders_and_color() {
        let missing_vertex = GraphicsPipelineBuilder::new().fragment_shader("f.spv");
        assert!(matches!(
            missing_vertex.required(),
            Err(RhiError::PipelineError(_))
        ));

        let missing_color = GraphicsPipelineBuilder::new()
            .vertex_shader("v.spv")
            .fragment_shader("f.spv");
        assert!(matches!(
            missing_color.required(),
            Err(RhiError::PipelineError(_))
        ));

        let complete = missing_color.color_attachment(vk::Format::B8G8R8A8_UNORM, ColorLoad::Clear);
        let (vertex, fragment, format, load) = complete.required().unwrap();
        assert_eq!(vertex, Path::new("v.spv"));
        assert_eq!(fragment, Path::new("f.spv"));
        assert_eq!(format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(load, ColorLoad::Clear);
    }

    #[test]
    fn test_depth_attachment_enables_depth_test() {
        let builder = GraphicsPipelineBuilder::new();
        assert!(!builder.has_depth_test());
        assert!(
            builder
                .depth_attachment(vk::Format::D32_SFLOAT)
                .has_depth_test()
        );
    }

    #[test]
    fn test_set_layouts_keep_call_order() {
        let first = vk::DescriptorSetLayout::null();
        let builder = GraphicsPipelineBuilder::new()
            .descriptor_set_layout(first)
            .descriptor_set_layout(first);
        assert_eq!(builder.set_layouts.len(), 2);
    }

    #[test]
    fn test_vertex_format_replaces_previous() {
        let binding = vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(44);
        let attribute = vk::VertexInputAttributeDescription::default().location(0);
        let builder = GraphicsPipelineBuilder::new()
            .vertex_format(binding, &[attribute, attribute])
            .vertex_format(binding, &[attribute]);
        assert_eq!(builder.vertex_bindings.len(), 1);
        assert_eq!(builder.vertex_attributes.len(), 1);
    }
}
