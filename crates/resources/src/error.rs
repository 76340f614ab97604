//! Error types for resource loading.

use std::path::PathBuf;
use thiserror::Error;

use crate::mesh::MeshType;

/// Error type for resource loading operations.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Failed to decode image '{path}': {source}")]
    Image {
        /// Path to the file that failed to decode.
        path: PathBuf,
        /// Underlying decoder error.
        #[source]
        source: image::ImageError,
    },

    /// Pixel data that cannot be uploaded as a texture.
    #[error("Invalid texture: {0}")]
    InvalidTexture(String),

    /// Cube map faces of differing sizes.
    #[error("Cube map face {face} is {width}x{height}, expected {expected_width}x{expected_height}")]
    CubemapMismatch {
        /// Index of the offending face.
        face: usize,
        /// Width of the offending face.
        width: u32,
        /// Height of the offending face.
        height: u32,
        /// Width of face 0.
        expected_width: u32,
        /// Height of face 0.
        expected_height: u32,
    },

    /// Mesh data that was never registered, or registered twice.
    #[error("Mesh {0:?}: {1}")]
    UnknownMesh(MeshType, &'static str),

    /// Index referring past the end of its mesh's vertices.
    #[error("Mesh {mesh:?} index {index} out of range ({vertex_count} vertices)")]
    IndexOutOfRange {
        /// Mesh the index belongs to.
        mesh: MeshType,
        /// The offending index.
        index: u32,
        /// Number of vertices in the mesh.
        vertex_count: usize,
    },
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
