//! GPU buffer management.
//!
//! Buffers pair a VkBuffer with a gpu-allocator allocation. Where the memory
//! lives depends on [`BufferUsage`]:
//!
//! - vertex and index buffers are device-local and filled through a staging copy
//! - uniform, storage and staging buffers are host-visible, coherent and
//!   persistently mapped for the lifetime of the buffer
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use engine_rhi::device::Device;
//! use engine_rhi::buffer::{Buffer, BufferUsage};
//!
//! # fn example(device: Arc<Device>) -> Result<(), engine_rhi::RhiError> {
//! let camera = Buffer::new(device, BufferUsage::Uniform, 192)?;
//! camera.write_pod(0, &[0.0f32; 48])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use bytemuck::Pod;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::{debug, error};

use crate::command::CommandPool;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Buffer usage type.
///
/// Selects both the Vulkan usage flags and the memory location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex data, device-local.
    Vertex,
    /// Index data, device-local.
    Index,
    /// Shader uniform data, host-visible.
    Uniform,
    /// Shader storage data, host-visible.
    Storage,
    /// Upload source, host-visible.
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Storage => vk::BufferUsageFlags::STORAGE_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Returns the memory location for this buffer type.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            // Rewritten every frame through the persistent mapping.
            BufferUsage::Uniform | BufferUsage::Storage => MemoryLocation::CpuToGpu,
            BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    /// Returns true if buffers of this type are mapped for CPU writes.
    pub fn is_host_visible(self) -> bool {
        self.memory_location() == MemoryLocation::CpuToGpu
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Storage => "storage",
            BufferUsage::Staging => "staging",
        }
    }
}

/// Hands `allocation` to its owner, then binds it.
///
/// The owner holds the allocation before `bind` runs, so a failed bind
/// still frees it when the owner drops.
pub(crate) fn bind_owned<A, E>(
    slot: &mut Option<A>,
    allocation: A,
    bind: impl FnOnce(&A) -> Result<(), E>,
) -> Result<(), E> {
    let allocation = slot.insert(allocation);
    bind(allocation)
}

/// GPU buffer with its own allocation.
///
/// Dropping the buffer frees the allocation (which also ends the persistent
/// mapping) and then destroys the VkBuffer.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error on zero size or if buffer creation, allocation or
    /// binding fails. A buffer created before a later step fails is destroyed.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "{} buffer size must be greater than 0",
                usage.name()
            )));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .handle()
                .create_buffer(&buffer_info, None)
                .inspect_err(|e| error!("Failed to create {} buffer: {}", usage.name(), e))?
        };

        let mut partial = Self {
            device,
            buffer,
            allocation: None,
            size,
            usage,
        };

        let requirements = unsafe {
            partial
                .device
                .handle()
                .get_buffer_memory_requirements(buffer)
        };

        let allocation = partial
            .device
            .allocator()?
            .allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: usage.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .inspect_err(|e| error!("Failed to allocate {} buffer memory: {}", usage.name(), e))?;

        let device = &partial.device;
        bind_owned(&mut partial.allocation, allocation, |allocation| unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                .inspect_err(|e| error!("Failed to bind {} buffer memory: {}", usage.name(), e))
        })?;

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(partial)
    }

    /// Creates a host-visible buffer and copies `data` into it.
    pub fn new_with_data(device: Arc<Device>, usage: BufferUsage, data: &[u8]) -> RhiResult<Self> {
        if !usage.is_host_visible() {
            return Err(RhiError::InvalidHandle(format!(
                "{} buffers are not host visible; use new_device_local",
                usage.name()
            )));
        }
        let buffer = Self::new(device, usage, data.len() as vk::DeviceSize)?;
        buffer.write_data(0, data)?;
        Ok(buffer)
    }

    /// Creates a device-local buffer filled with `data`.
    ///
    /// The data goes through a temporary staging buffer and a one-time
    /// transfer on the graphics queue. The call blocks until the copy is done,
    /// after which the staging buffer is released.
    pub fn new_device_local(
        device: Arc<Device>,
        pool: &CommandPool,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        let size = data.len() as vk::DeviceSize;
        let staging = Self::new_with_data(device.clone(), BufferUsage::Staging, data)?;
        let buffer = Self::new(device.clone(), usage, size)?;

        pool.one_time_submit(device.graphics_queue(), |cmd| {
            let region = vk::BufferCopy::default().size(size);
            cmd.copy_buffer(staging.handle(), buffer.handle(), &[region]);
        })?;

        debug!("Uploaded {} bytes into {} buffer", size, usage.name());
        Ok(buffer)
    }

    /// Copies raw bytes into the mapped memory at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is not mapped or the write would run
    /// past the end of the buffer.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let end = offset + data.len() as vk::DeviceSize;
        if end > self.size {
            return Err(RhiError::InvalidHandle(format!(
                "Write exceeds {} buffer size: offset {} + data {} > buffer {}",
                self.usage.name(),
                offset,
                data.len(),
                self.size
            )));
        }

        let mapped_ptr = self
            .allocation
            .as_ref()
            .and_then(Allocation::mapped_ptr)
            .ok_or_else(|| {
                RhiError::InvalidHandle(format!("{} buffer is not mapped", self.usage.name()))
            })?;

        unsafe {
            let dst = mapped_ptr.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }

        Ok(())
    }

    /// Copies a plain-old-data value (or slice) into the mapped memory.
    pub fn write_pod<T: Pod>(&self, offset: vk::DeviceSize, value: &T) -> RhiResult<()> {
        self.write_data(offset, bytemuck::bytes_of(value))
    }

    /// Copies a slice of plain-old-data values into the mapped memory.
    pub fn write_slice<T: Pod>(&self, offset: vk::DeviceSize, values: &[T]) -> RhiResult<()> {
        self.write_data(offset, bytemuck::cast_slice(values))
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        error!("Failed to free {} buffer allocation: {:?}", self.usage.name(), e);
                    }
                }
                Err(e) => error!("Leaking {} buffer allocation: {}", self.usage.name(), e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_to_vk_usage() {
        assert!(
            BufferUsage::Vertex
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert!(
            BufferUsage::Index
                .to_vk_usage()
                .contains(vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST)
        );
        assert_eq!(
            BufferUsage::Uniform.to_vk_usage(),
            vk::BufferUsageFlags::UNIFORM_BUFFER
        );
        assert_eq!(
            BufferUsage::Storage.to_vk_usage(),
            vk::BufferUsageFlags::STORAGE_BUFFER
        );
        assert_eq!(
            BufferUsage::Staging.to_vk_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
    }

    #[test]
    fn test_per_frame_buffers_are_host_visible() {
        assert!(BufferUsage::Uniform.is_host_visible());
        assert!(BufferUsage::Storage.is_host_visible());
        assert!(BufferUsage::Staging.is_host_visible());
    }

    #[test]
    fn test_geometry_buffers_are_device_local() {
        assert_eq!(BufferUsage::Vertex.memory_location(), MemoryLocation::GpuOnly);
        assert_eq!(BufferUsage::Index.memory_location(), MemoryLocation::GpuOnly);
        assert!(!BufferUsage::Vertex.is_host_visible());
    }

    #[test]
    fn test_buffer_usage_name() {
        assert_eq!(BufferUsage::Vertex.name(), "vertex");
        assert_eq!(BufferUsage::Index.name(), "index");
        assert_eq!(BufferUsage::Uniform.name(), "uniform");
        assert_eq!(BufferUsage::Storage.name(), "storage");
        assert_eq!(BufferUsage::Staging.name(), "staging");
    }

    #[test]
    fn test_failed_bind_leaves_allocation_with_owner() {
        let mut slot = None;
        let result = bind_owned(&mut slot, 7u32, |_| Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        assert_eq!(result, Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        assert_eq!(slot, Some(7));
    }

    #[test]
    fn test_bind_sees_owned_allocation() {
        let mut slot = None;
        let mut seen = None;
        bind_owned(&mut slot, 3u32, |allocation| {
            seen = Some(*allocation);
            Ok::<(), vk::Result>(())
        })
        .unwrap();
        assert_eq!(seen, Some(3));
        assert_eq!(slot, Some(3));
    }
}
