//! Synchronization primitives.
//!
//! - [`Semaphore`]: GPU-to-GPU ordering between acquire, submit and present
//! - [`Fence`]: the only primitive the CPU observes
//! - [`FrameSync`]: the three objects a frame slot needs
//!
//! Sync objects are never reused across swapchain recreation; every new
//! frame set creates fresh ones.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error};

use crate::device::Device;
use crate::error::RhiResult;

/// Vulkan semaphore, created unsignaled.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe {
            device
                .handle()
                .create_semaphore(&create_info, None)
                .inspect_err(|e| error!("Failed to create semaphore: {}", e))?
        };

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence, optionally already signaled.
    ///
    /// In-flight fences start signaled so the first wait on a fresh slot
    /// returns immediately.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe {
            device
                .handle()
                .create_fence(&create_info, None)
                .inspect_err(|e| error!("Failed to create fence: {}", e))?
        };

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence signals or `timeout` nanoseconds pass.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?
        };
        Ok(())
    }

    /// Resets the fence to unsignaled.
    ///
    /// Only call this right before a submit that will signal it again;
    /// resetting earlier risks a wait that never returns.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization for one frame slot.
///
/// ```text
/// wait(in_flight) -> acquire(signal image_available)
///   -> reset(in_flight) -> submit(wait image_available, signal render_finished + in_flight)
///   -> present(wait render_finished)
/// ```
pub struct FrameSync {
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

impl FrameSync {
    /// Creates the two semaphores and a signaled in-flight fence.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        debug!("Created frame synchronization primitives");

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// Semaphore signaled by image acquisition.
    #[inline]
    pub fn image_available(&self) -> vk::Semaphore {
        self.image_available.handle()
    }

    /// Semaphore signaled when the frame's commands finish.
    #[inline]
    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished.handle()
    }

    /// Fence signaled when the frame's submission completes.
    #[inline]
    pub fn in_flight(&self) -> &Fence {
        &self.in_flight
    }
}
