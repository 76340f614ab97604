//! Resource loading and management.
//!
//! This crate prepares CPU-side asset data for upload:
//! - Mesh types and the concatenated vertex/index lump
//! - RGBA8 texture and cube map data, decoded with `image` or generated
//! - Material sources per mesh type

mod error;

pub mod material;
pub mod mesh;
pub mod texture;

pub use error::{ResourceError, ResourceResult};
pub use material::MaterialSource;
pub use mesh::{MeshRange, MeshRegistry, MeshType};
pub use texture::{CubemapData, TextureData};
