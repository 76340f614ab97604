//! Material definitions and loading.
//!
//! A material is the texture a mesh type is drawn with. Sources are either
//! image files or procedural checkerboards, so a default scene needs no
//! assets on disk.

use std::path::PathBuf;

use crate::error::ResourceResult;
use crate::mesh::MeshType;
use crate::texture::TextureData;

/// Edge length of procedural material textures.
pub const PROCEDURAL_TEXTURE_SIZE: u32 = 64;

/// Where a material's texture comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaterialSource {
    /// An image file decoded with the `image` crate.
    File(PathBuf),
    /// A procedural checkerboard.
    Checker {
        /// First cell color.
        a: [u8; 4],
        /// Second cell color.
        b: [u8; 4],
        /// Cells per side.
        cells: u32,
    },
}

impl MaterialSource {
    /// Produces the texture pixels.
    pub fn load(&self) -> ResourceResult<TextureData> {
        match self {
            MaterialSource::File(path) => TextureData::load(path),
            MaterialSource::Checker { a, b, cells } => Ok(TextureData::checker(
                PROCEDURAL_TEXTURE_SIZE,
                *cells,
                *a,
                *b,
            )),
        }
    }

    /// The material a mesh type uses when none is configured.
    pub fn default_for(mesh_type: MeshType) -> Self {
        let (a, b) = match mesh_type {
            MeshType::Triangle => ([96, 160, 64, 255], [64, 120, 40, 255]),
            MeshType::Square => ([60, 110, 200, 255], [30, 70, 160, 255]),
            MeshType::Star => ([220, 200, 140, 255], [190, 165, 110, 255]),
        };
        MaterialSource::Checker { a, b, cells: 8 }
    }
}
