//! Scene description consumed by the renderer.
//!
//! This crate provides:
//! - The look-at camera
//! - Instance positions per mesh type

pub mod camera;
pub mod scene;

pub use camera::{Camera, aspect_ratio};
pub use scene::Scene;
