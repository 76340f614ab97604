//! Swapchain management.
//!
//! This module handles VkSwapchainKHR creation, image acquisition, and presentation.
//!
//! # Overview
//!
//! The [`Swapchain`] owns only the chain itself. Views, framebuffers and
//! every other per-image resource belong to the renderer's frames, which are
//! rebuilt as a unit whenever the chain is. Selection of format, present
//! mode, extent and image count is done by the free functions below so the
//! rules can be checked without a GPU.
//!
//! A chain that can no longer be presented to is *stale*. Acquire and
//! present report staleness as a value rather than an error, since it is
//! the normal signal to recreate.
//!
//! # Example
//!
//! ```no_run
//! use engine_rhi::swapchain::{AcquireOutcome, Swapchain};
//! # fn frame(swapchain: &Swapchain, queue: ash::vk::Queue, available: ash::vk::Semaphore, finished: ash::vk::Semaphore) -> engine_rhi::RhiResult<()> {
//! match swapchain.acquire_next_image(available)? {
//!     AcquireOutcome::Acquired(index) => {
//!         // ... record and submit ...
//!         let stale = swapchain.present(queue, index, finished)?;
//!         if stale {
//!             // recreate
//!         }
//!     }
//!     AcquireOutcome::Stale => { /* recreate */ }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// Swapchain surface support details.
///
/// Contains information about what the surface supports for swapchain creation.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Returns true if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Result of asking the chain for the next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image index is ready to be rendered into.
    Acquired(u32),
    /// The chain no longer matches the surface and must be recreated.
    Stale,
}

/// Vulkan swapchain wrapper.
///
/// The chain images are owned by the driver; nothing here creates views of
/// them. Recreation is done by dropping this value and building a new one
/// once the frames that referenced the old images are gone.
pub struct Swapchain {
    _device: Arc<Device>,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::Format,
    color_space: vk::ColorSpaceKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
}

impl Swapchain {
    /// Creates a swapchain for `surface` sized as close to `width` x `height`
    /// as the surface allows.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if the surface has no usable
    /// formats or present modes, or if creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());

        let support = SwapchainSupportDetails::query(
            device.physical_device(),
            surface,
            instance.surface_loader(),
        )?;

        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = choose_image_count(&support.capabilities);

        info!(
            "Creating swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            image_count
        );

        let queue_families = device.queue_families();
        let (sharing_mode, family_indices) = queue_families.image_sharing();
        if queue_families.is_shared() {
            debug!("Using EXCLUSIVE sharing mode (same queue family for graphics and present)");
        } else {
            debug!(
                "Using CONCURRENT sharing mode between graphics ({}) and present ({}) queues",
                queue_families.graphics, queue_families.present
            );
        }

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    error!("Failed to create swapchain: {}", e);
                    RhiError::SwapchainError(format!("vkCreateSwapchainKHR failed: {}", e))
                })?
        };

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                error!("Failed to fetch swapchain images: {}", e);
                return Err(RhiError::SwapchainError(format!(
                    "vkGetSwapchainImagesKHR failed: {}",
                    e
                )));
            }
        };
        info!("Swapchain created with {} images", images.len());

        Ok(Self {
            _device: device,
            swapchain_loader,
            swapchain,
            images,
            format: surface_format.format,
            color_space: surface_format.color_space,
            extent,
            present_mode,
        })
    }

    /// Acquires the next image, signalling `semaphore` when it is ready.
    ///
    /// Waits without a timeout. A suboptimal acquire still yields an image;
    /// the matching present will report the chain as stale.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than an out-of-date chain.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RhiResult<AcquireOutcome> {
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, _suboptimal)) => Ok(AcquireOutcome::Acquired(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on acquire");
                Ok(AcquireOutcome::Stale)
            }
            Err(e) => {
                error!("Failed to acquire swapchain image: {}", e);
                Err(e.into())
            }
        }
    }

    /// Presents `image_index` once `wait_semaphore` is signalled.
    ///
    /// Returns true if the chain is out of date or suboptimal and should be
    /// recreated.
    ///
    /// # Errors
    ///
    /// Returns an error for any other presentation failure.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.swapchain_loader.queue_present(queue, &present_info) } {
            Ok(suboptimal) => {
                if suboptimal {
                    debug!("Swapchain suboptimal on present");
                }
                Ok(suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on present");
                Ok(true)
            }
            Err(e) => {
                error!("Failed to present swapchain image {}: {}", image_index, e);
                Err(e.into())
            }
        }
    }

    /// Returns the swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Returns the swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the swapchain color space.
    #[inline]
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.color_space
    }

    /// Returns the swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns the number of swapchain images.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Returns all swapchain images.
    #[inline]
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.swapchain_loader
                .destroy_swapchain(self.swapchain, None);
        }

        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}

/// Chooses the surface format.
///
/// Prefers B8G8R8A8_UNORM with SRGB_NONLINEAR color space, falling back to
/// the first format the surface lists. `formats` must not be empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_UNORM && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match preferred {
        Some(&format) => format,
        None => {
            let first = formats.first().copied().unwrap_or_default();
            warn!("Using first available surface format: {:?}", first.format);
            first
        }
    }
}

/// Chooses the present mode.
///
/// The first MAILBOX or IMMEDIATE entry in list order wins. Otherwise FIFO,
/// and if even that is missing, the first listed mode.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if let Some(&mode) = present_modes
        .iter()
        .find(|&&m| m == vk::PresentModeKHR::MAILBOX || m == vk::PresentModeKHR::IMMEDIATE)
    {
        debug!("Selected {:?} present mode", mode);
        return mode;
    }

    if present_modes.contains(&vk::PresentModeKHR::FIFO) {
        debug!("Selected FIFO present mode (vsync)");
        return vk::PresentModeKHR::FIFO;
    }

    present_modes
        .first()
        .copied()
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Chooses the swapchain extent.
///
/// A fixed current extent is used verbatim. When the surface leaves it to
/// the application (width is `u32::MAX`), the requested size is clamped
/// into the surface's min/max range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let extent = vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    debug!(
        "Calculated extent: {}x{} (requested: {}x{})",
        extent.width, extent.height, width, height
    );

    extent
}

/// Chooses the image count: one more than the minimum, capped by the
/// maximum when the surface has one (`max_image_count == 0` is unbounded).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}
