//! GPU image management.
//!
//! - [`Image`] owns a VkImage, its gpu-allocator memory and one view
//! - [`ImageView`] owns a view over an image it does not own (swapchain images)
//! - [`find_supported_format`] picks the first candidate format with the wanted features
//!
//! Destruction always runs view, then image, then allocation.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::buffer::bind_owned;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: &[vk::Format] =
    &[vk::Format::D32_SFLOAT, vk::Format::D24_UNORM_S8_UINT];

/// Returns the first format in `candidates` whose properties for `tiling`
/// contain every bit of `features`.
///
/// `properties_of` is the physical device query, passed in so the search can
/// run against any source of format properties.
pub fn find_supported_format<F>(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    properties_of: F,
) -> RhiResult<vk::Format>
where
    F: Fn(vk::Format) -> vk::FormatProperties,
{
    candidates
        .iter()
        .copied()
        .find(|&format| {
            let properties = properties_of(format);
            match tiling {
                vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => properties.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
        .ok_or_else(|| RhiError::NoSupportedFormat(candidates.to_vec()))
}

/// Returns the aspect flags a view of `format` should cover.
pub fn aspect_for_format(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D32_SFLOAT | vk::Format::D16_UNORM => vk::ImageAspectFlags::DEPTH,
        vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT
        | vk::Format::D16_UNORM_S8_UINT => {
            // Depth views used as attachments only need the depth aspect.
            vk::ImageAspectFlags::DEPTH
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// Creates a raw image view. Used by [`Image`] and [`ImageView`].
pub fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    view_type: vk::ImageViewType,
    layer_count: u32,
) -> RhiResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(layer_count),
        );

    unsafe {
        device
            .handle()
            .create_image_view(&view_info, None)
            .inspect_err(|e| error!("Failed to create image view ({:?}): {}", format, e))
            .map_err(RhiError::from)
    }
}

/// Parameters for [`Image::new`].
#[derive(Clone, Copy, Debug)]
pub struct ImageDesc {
    /// Debug name passed to the allocator.
    pub name: &'static str,
    /// Width and height in pixels.
    pub extent: vk::Extent2D,
    /// Pixel format.
    pub format: vk::Format,
    /// Usage flags.
    pub usage: vk::ImageUsageFlags,
    /// Number of array layers (6 for cube maps).
    pub array_layers: u32,
    /// Creation flags (`CUBE_COMPATIBLE` for cube maps).
    pub flags: vk::ImageCreateFlags,
    /// View type for the owned view.
    pub view_type: vk::ImageViewType,
}

impl ImageDesc {
    /// Describes a depth attachment of the given size and format.
    pub fn depth(extent: vk::Extent2D, format: vk::Format) -> Self {
        Self {
            name: "depth_buffer",
            extent,
            format,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            array_layers: 1,
            flags: vk::ImageCreateFlags::empty(),
            view_type: vk::ImageViewType::TYPE_2D,
        }
    }

    /// Describes a sampled 2D RGBA texture.
    pub fn texture(extent: vk::Extent2D) -> Self {
        Self {
            name: "texture",
            extent,
            format: vk::Format::R8G8B8A8_UNORM,
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            array_layers: 1,
            flags: vk::ImageCreateFlags::empty(),
            view_type: vk::ImageViewType::TYPE_2D,
        }
    }

    /// Describes a sampled RGBA cube map with six faces of `extent`.
    pub fn cube_map(extent: vk::Extent2D) -> Self {
        Self {
            name: "cube_map",
            array_layers: 6,
            flags: vk::ImageCreateFlags::CUBE_COMPATIBLE,
            view_type: vk::ImageViewType::CUBE,
            ..Self::texture(extent)
        }
    }
}

/// Device-local image with its own memory and view.
pub struct Image {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    desc: ImageDesc,
}

impl Image {
    /// Creates the image, allocates GPU-only memory for it, binds it and
    /// creates a view covering every layer.
    ///
    /// # Errors
    ///
    /// Returns an error on zero extent, or if any Vulkan or allocator call fails.
    /// Partially created objects are released before returning.
    pub fn new(device: Arc<Device>, desc: ImageDesc) -> RhiResult<Self> {
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "{} dimensions must be greater than 0",
                desc.name
            )));
        }

        let image_info = vk::ImageCreateInfo::default()
            .flags(desc.flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(desc.array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            device
                .handle()
                .create_image(&image_info, None)
                .inspect_err(|e| error!("Failed to create {}: {}", desc.name, e))?
        };

        // From here on, `partial` releases whatever has been created if a later step fails.
        let mut partial = Self {
            device,
            image,
            view: vk::ImageView::null(),
            allocation: None,
            desc,
        };

        let requirements = unsafe {
            partial
                .device
                .handle()
                .get_image_memory_requirements(image)
        };

        let allocation = partial
            .device
            .allocator()?
            .allocate(&AllocationCreateDesc {
                name: desc.name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .inspect_err(|e| error!("Failed to allocate {} memory: {}", desc.name, e))?;

        let device = &partial.device;
        bind_owned(&mut partial.allocation, allocation, |allocation| unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())
                .inspect_err(|e| error!("Failed to bind {} memory: {}", desc.name, e))
        })?;

        partial.view = create_image_view(
            &partial.device,
            image,
            desc.format,
            aspect_for_format(desc.format),
            desc.view_type,
            desc.array_layers,
        )?;

        debug!(
            "Created {}: {}x{} ({:?}, {} layer(s))",
            desc.name, desc.extent.width, desc.extent.height, desc.format, desc.array_layers
        );

        Ok(partial)
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Returns the image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.desc.format
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.desc.extent
    }

    /// Returns the number of array layers.
    #[inline]
    pub fn layers(&self) -> u32 {
        self.desc.array_layers
    }

    /// Returns the device the image was created on.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.device.handle().destroy_image_view(self.view, None);
            }
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} allocation: {:?}", self.desc.name, e);
                    }
                }
                Err(e) => error!("Leaking {} allocation: {}", self.desc.name, e),
            }
        }

        debug!("Destroyed {}", self.desc.name);
    }
}

/// Owned view over an image owned elsewhere (e.g. by the swapchain).
pub struct ImageView {
    device: Arc<Device>,
    view: vk::ImageView,
}

impl ImageView {
    /// Creates a 2D color view of `image`.
    pub fn color_2d(device: Arc<Device>, image: vk::Image, format: vk::Format) -> RhiResult<Self> {
        let view = create_image_view(
            &device,
            image,
            format,
            vk::ImageAspectFlags::COLOR,
            vk::ImageViewType::TYPE_2D,
            1,
        )?;
        Ok(Self { device, view })
    }

    /// Returns the view handle.
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(optimal: vk::FormatFeatureFlags) -> vk::FormatProperties {
        vk::FormatProperties {
            optimal_tiling_features: optimal,
            ..Default::default()
        }
    }

    #[test]
    fn test_find_supported_format_prefers_first_candidate() {
        let format = find_supported_format(
            DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| props(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT),
        )
        .unwrap();
        assert_eq!(format, vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_find_supported_format_skips_unsupported() {
        let format = find_supported_format(
            DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |format| {
                if format == vk::Format::D24_UNORM_S8_UINT {
                    props(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
                } else {
                    props(vk::FormatFeatureFlags::SAMPLED_IMAGE)
                }
            },
        )
        .unwrap();
        assert_eq!(format, vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn test_find_supported_format_checks_requested_tiling() {
        // Supported only with optimal tiling, but linear is requested.
        let result = find_supported_format(
            DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::LINEAR,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| props(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT),
        );
        assert!(matches!(result, Err(RhiError::NoSupportedFormat(_))));
    }

    #[test]
    fn test_find_supported_format_none() {
        let result = find_supported_format(
            DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| vk::FormatProperties::default(),
        );
        match result {
            Err(RhiError::NoSupportedFormat(candidates)) => {
                assert_eq!(candidates, DEPTH_FORMAT_CANDIDATES.to_vec());
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_aspect_for_format() {
        assert_eq!(
            aspect_for_format(vk::Format::D32_SFLOAT),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            aspect_for_format(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            aspect_for_format(vk::Format::R8G8B8A8_UNORM),
            vk::ImageAspectFlags::COLOR
        );
    }

    #[test]
    fn test_cube_map_desc() {
        let desc = ImageDesc::cube_map(vk::Extent2D {
            width: 64,
            height: 64,
        });
        assert_eq!(desc.array_layers, 6);
        assert_eq!(desc.view_type, vk::ImageViewType::CUBE);
        assert!(desc.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE));
        assert!(desc.usage.contains(vk::ImageUsageFlags::SAMPLED));
    }

    #[test]
    fn test_depth_desc() {
        let desc = ImageDesc::depth(
            vk::Extent2D {
                width: 800,
                height: 600,
            },
            vk::Format::D32_SFLOAT,
        );
        assert_eq!(desc.array_layers, 1);
        assert_eq!(desc.usage, vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT);
    }
}
