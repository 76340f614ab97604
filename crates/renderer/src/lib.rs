//! Frame lifecycle and GPU resource orchestration.
//!
//! This crate ties the RHI wrappers together into a running renderer:
//! - Per-image frames and their rebuild on swapchain recreation
//! - The wait / acquire / record / submit / present protocol
//! - Sky and standard pipelines, instance batching and materials

pub mod assets;
pub mod draw;
pub mod frame;
pub mod frame_loop;
pub mod frame_ring;
pub mod pipeline_type;
pub mod renderer;
pub mod ubo;

pub use frame_loop::{FrameBackend, FrameLoop, FrameStatus};
pub use pipeline_type::{PerPipeline, PipelineType};
pub use renderer::Renderer;
