//! Platform layer for the engine.
//!
//! - Window creation via winit
//! - Vulkan surface creation from raw window handles
//! - Framebuffer size queries for swapchain recreation

mod window;

pub use window::{FramebufferSource, Surface, Window};

pub use winit::event::WindowEvent;
pub use winit::event_loop::{ActiveEventLoop, EventLoop};
