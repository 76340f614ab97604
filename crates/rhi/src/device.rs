//! Vulkan logical device and queue management.
//!
//! The [`Device`] is the engine's device resource pool: it owns the logical
//! device, the graphics and present queues, and the gpu-allocator used by
//! every buffer and image. Other components hold it through `Arc<Device>`.

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::image::{DEPTH_FORMAT_CANDIDATES, find_supported_format};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilies, REQUIRED_DEVICE_EXTENSIONS};

/// Vulkan logical device wrapper.
///
/// # Thread Safety
///
/// The engine drives the device from a single thread, but the allocator is
/// still kept behind a `Mutex` so `Device` can be shared through `Arc`.
pub struct Device {
    /// Instance dispatch table, used for physical device queries.
    instance: ash::Instance,
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Physical device handle.
    physical_device: vk::PhysicalDevice,
    /// GPU memory allocator. Dropped before the device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Graphics queue handle.
    graphics_queue: vk::Queue,
    /// Presentation queue handle.
    present_queue: vk::Queue,
    /// Resolved queue families.
    queue_families: QueueFamilies,
    /// Depth format, chosen on first request.
    depth_format: OnceLock<vk::Format>,
}

impl Device {
    /// Creates the logical device, its queues and the memory allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation or allocator initialization fails.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> RhiResult<Arc<Self>> {
        let queue_families = physical_device_info.queue_families;

        let unique_families = queue_families.unique();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let features = vk::PhysicalDeviceFeatures::default();

        let extension_names: Vec<*const std::ffi::c_char> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)
                .inspect_err(|e| error!("vkCreateDevice failed: {}", e))?
        };

        info!(
            "Logical device created with {} extension(s)",
            REQUIRED_DEVICE_EXTENSIONS.len()
        );

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };
        debug!(
            "Queues retrieved: graphics family {}, present family {}",
            queue_families.graphics, queue_families.present
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(e) => {
                error!("GPU allocator creation failed: {}", e);
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            instance: instance.handle().clone(),
            device,
            physical_device: physical_device_info.device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            queue_families,
            depth_format: OnceLock::new(),
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the instance dispatch table.
    #[inline]
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the resolved queue families.
    #[inline]
    pub fn queue_families(&self) -> QueueFamilies {
        self.queue_families
    }

    /// Locks the GPU memory allocator.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator
            .lock()
            .map_err(|_| RhiError::InvalidHandle("GPU allocator lock poisoned".to_string()))
    }

    /// Returns the depth attachment format for this device.
    ///
    /// The first call queries the physical device against
    /// [`DEPTH_FORMAT_CANDIDATES`]; later calls return the cached answer, so
    /// depth images and render passes always agree.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoSupportedFormat`] if no candidate supports
    /// depth-stencil attachments with optimal tiling.
    pub fn depth_format(&self) -> RhiResult<vk::Format> {
        if let Some(format) = self.depth_format.get() {
            return Ok(*format);
        }

        let format = find_supported_format(
            DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |format| unsafe {
                self.instance
                    .get_physical_device_format_properties(self.physical_device, format)
            },
        )?;

        info!("Depth format selected: {:?}", format);
        Ok(*self.depth_format.get_or_init(|| format))
    }

    /// Waits for the device to become idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // Allocator returns its memory blocks, so it must go first.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device and ash::Instance are Send+Sync, raw handles are Copy,
// and the allocator sits behind a Mutex.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swapchain_extension_required() {
        assert!(REQUIRED_DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn test_device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
