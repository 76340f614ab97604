//! Single-subpass render passes.
//!
//! Every pass in the engine has exactly one subpass with the color
//! attachment at index 0 and, when depth testing is on, the depth attachment
//! at index 1. Color always ends in `PRESENT_SRC_KHR`; how it starts depends
//! on whether an earlier pass already wrote the image this frame.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error};

use crate::device::Device;
use crate::error::RhiResult;

/// Attachment index of the color target.
pub const COLOR_ATTACHMENT_INDEX: u32 = 0;
/// Attachment index of the depth target.
pub const DEPTH_ATTACHMENT_INDEX: u32 = 1;

/// How a pass treats color already in the swapchain image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorLoad {
    /// First writer that covers every pixel: contents are discarded.
    DontCare,
    /// First writer: the image is cleared to the begin-info clear value.
    Clear,
    /// Later writer: keeps what the earlier pass presented.
    Preserve,
}

/// Describes the color attachment for `policy`.
pub fn color_attachment_description(
    format: vk::Format,
    policy: ColorLoad,
) -> vk::AttachmentDescription {
    let (load_op, initial_layout) = match policy {
        ColorLoad::DontCare => (vk::AttachmentLoadOp::DONT_CARE, vk::ImageLayout::UNDEFINED),
        ColorLoad::Clear => (vk::AttachmentLoadOp::CLEAR, vk::ImageLayout::UNDEFINED),
        ColorLoad::Preserve => (vk::AttachmentLoadOp::LOAD, vk::ImageLayout::PRESENT_SRC_KHR),
    };

    vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(load_op)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(initial_layout)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
}

/// Describes a depth attachment that is cleared every frame and not kept.
pub fn depth_attachment_description(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
}

/// Dependency that holds color writes (and depth clears) until the
/// acquired image is actually available.
///
/// A preserving pass also waits on the color an earlier pass in the same
/// command buffer wrote, and reads it through its LOAD.
pub fn external_dependency(policy: ColorLoad, with_depth: bool) -> vk::SubpassDependency {
    let mut stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
    let mut src_access = vk::AccessFlags::empty();
    let mut dst_access = vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
    if policy == ColorLoad::Preserve {
        src_access |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
        dst_access |= vk::AccessFlags::COLOR_ATTACHMENT_READ;
    }
    if with_depth {
        stages |= vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        dst_access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    }

    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages)
        .src_access_mask(src_access)
        .dst_stage_mask(stages)
        .dst_access_mask(dst_access)
}

/// Attachment list for a pass: color first, then optional depth.
pub fn attachment_descriptions(
    color_format: vk::Format,
    policy: ColorLoad,
    depth_format: Option<vk::Format>,
) -> Vec<vk::AttachmentDescription> {
    let mut attachments = vec![color_attachment_description(color_format, policy)];
    if let Some(depth_format) = depth_format {
        attachments.push(depth_attachment_description(depth_format));
    }
    attachments
}

/// Owned VkRenderPass.
pub struct RenderPass {
    device: Arc<Device>,
    render_pass: vk::RenderPass,
    has_depth: bool,
}

impl RenderPass {
    /// Creates a single-subpass render pass.
    pub fn new(
        device: Arc<Device>,
        color_format: vk::Format,
        policy: ColorLoad,
        depth_format: Option<vk::Format>,
    ) -> RhiResult<Self> {
        let attachments = attachment_descriptions(color_format, policy, depth_format);
        let has_depth = depth_format.is_some();

        let color_refs = [vk::AttachmentReference::default()
            .attachment(COLOR_ATTACHMENT_INDEX)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
        let depth_ref = vk::AttachmentReference::default()
            .attachment(DEPTH_ATTACHMENT_INDEX)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if has_depth {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }

        let subpasses = [subpass];
        let dependencies = [external_dependency(policy, has_depth)];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            device
                .handle()
                .create_render_pass(&create_info, None)
                .inspect_err(|e| error!("Failed to create render pass: {}", e))?
        };

        debug!(
            "Created render pass: color {:?} ({:?}), depth {:?}",
            color_format, policy, depth_format
        );

        Ok(Self {
            device,
            render_pass,
            has_depth,
        })
    }

    /// Returns the Vulkan render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Returns true if the pass has a depth attachment.
    #[inline]
    pub fn has_depth(&self) -> bool {
        self.has_depth
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLOR: vk::Format = vk::Format::B8G8R8A8_UNORM;

    #[test]
    fn test_preserving_pass_loads_presented_image() {
        let attachment = color_attachment_description(COLOR, ColorLoad::Preserve);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::LOAD);
        assert_eq!(attachment.initial_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(attachment.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
    }

    #[test]
    fn test_first_writer_starts_undefined() {
        for policy in [ColorLoad::DontCare, ColorLoad::Clear] {
            let attachment = color_attachment_description(COLOR, policy);
            assert_eq!(attachment.initial_layout, vk::ImageLayout::UNDEFINED);
            assert_eq!(attachment.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        }
        assert_eq!(
            color_attachment_description(COLOR, ColorLoad::DontCare).load_op,
            vk::AttachmentLoadOp::DONT_CARE
        );
        assert_eq!(
            color_attachment_description(COLOR, ColorLoad::Clear).load_op,
            vk::AttachmentLoadOp::CLEAR
        );
    }

    #[test]
    fn test_depth_attachment_description() {
        let attachment = depth_attachment_description(vk::Format::D32_SFLOAT);
        assert_eq!(attachment.format, vk::Format::D32_SFLOAT);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(attachment.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(
            attachment.final_layout,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        );
    }

    #[test]
    fn test_attachment_order() {
        let with_depth =
            attachment_descriptions(COLOR, ColorLoad::Preserve, Some(vk::Format::D32_SFLOAT));
        assert_eq!(with_depth.len(), 2);
        assert_eq!(with_depth[COLOR_ATTACHMENT_INDEX as usize].format, COLOR);
        assert_eq!(
            with_depth[DEPTH_ATTACHMENT_INDEX as usize].format,
            vk::Format::D32_SFLOAT
        );

        let color_only = attachment_descriptions(COLOR, ColorLoad::DontCare, None);
        assert_eq!(color_only.len(), 1);
    }

    #[test]
    fn test_external_dependency_stages() {
        let color_only = external_dependency(ColorLoad::Clear, false);
        assert_eq!(color_only.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(color_only.dst_subpass, 0);
        assert_eq!(
            color_only.dst_stage_mask,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        );

        let with_depth = external_dependency(ColorLoad::Clear, true);
        assert!(
            with_depth
                .dst_stage_mask
                .contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
        );
        assert!(
            with_depth
                .dst_access_mask
                .contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        );
    }

    #[test]
    fn test_preserving_pass_waits_on_earlier_color_write() {
        let dependency = external_dependency(ColorLoad::Preserve, true);
        assert!(
            dependency
                .src_access_mask
                .contains(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        );
        assert!(
            dependency
                .src_stage_mask
                .contains(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        );
        assert!(dependency.dst_access_mask.contains(
            vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        ));
    }

    #[test]
    fn test_first_writer_has_no_prior_access() {
        for policy in [ColorLoad::DontCare, ColorLoad::Clear] {
            let dependency = external_dependency(policy, false);
            assert_eq!(dependency.src_access_mask, vk::AccessFlags::empty());
            assert!(
                !dependency
                    .dst_access_mask
                    .contains(vk::AccessFlags::COLOR_ATTACHMENT_READ)
            );
        }
    }
}
