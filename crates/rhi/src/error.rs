//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
///
/// Every resource-creation call in this crate reports failure through this
/// type instead of handing back a null handle.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// None of the candidate formats supports the requested features
    #[error("No supported format among {0:?}")]
    NoSupportedFormat(Vec<ash::vk::Format>),

    /// Shader module error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Invalid handle error
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Texture data could not be turned into a GPU image
    #[error("Texture error: {0}")]
    TextureError(String),

    /// A fixed-capacity resource was asked to hold more than it can
    #[error("{resource} capacity exceeded: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        /// Name of the resource.
        resource: &'static str,
        /// Requested element count.
        requested: usize,
        /// Maximum element count.
        capacity: usize,
    },
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[test]
    fn test_vulkan_result_conversion() {
        let err: RhiError = vk::Result::ERROR_DEVICE_LOST.into();
        assert!(matches!(
            err,
            RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST)
        ));
    }

    #[test]
    fn test_capacity_message() {
        let err = RhiError::CapacityExceeded {
            resource: "instance transforms",
            requested: 2000,
            capacity: 1024,
        };
        assert_eq!(
            err.to_string(),
            "instance transforms capacity exceeded: requested 2000, capacity 1024"
        );
    }
}
