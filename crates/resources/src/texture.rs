//! Decoded RGBA8 pixel data for textures and cube maps.

use std::path::Path;

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// Bytes per RGBA8 texel.
const BYTES_PER_TEXEL: usize = 4;

/// Tightly packed RGBA8 image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA8 pixels, `width * height * 4` bytes.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Wraps raw pixels, checking size and length.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidTexture`] for a zero dimension or a
    /// pixel buffer of the wrong length.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> ResourceResult<Self> {
        let texture = Self {
            width,
            height,
            pixels,
        };
        texture.validate()?;
        Ok(texture)
    }

    /// Checks that the image is non-empty and `pixels` matches the size.
    pub fn validate(&self) -> ResourceResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ResourceError::InvalidTexture(format!(
                "dimensions must be greater than 0, got {}x{}",
                self.width, self.height
            )));
        }

        let expected = self.width as usize * self.height as usize * BYTES_PER_TEXEL;
        if self.pixels.len() != expected {
            return Err(ResourceError::InvalidTexture(format!(
                "{}x{} RGBA image needs {} bytes, got {}",
                self.width,
                self.height,
                expected,
                self.pixels.len()
            )));
        }

        Ok(())
    }

    /// Decodes an image file into RGBA8.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::Io`] if the file cannot be read and
    /// [`ResourceError::Image`] if it cannot be decoded.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        let bytes = std::fs::read(path)?;
        let image = image::load_from_memory(&bytes)
            .map_err(|source| ResourceError::Image {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();

        let (width, height) = image.dimensions();
        debug!("Loaded texture {:?}: {}x{}", path, width, height);

        Self::new(width, height, image.into_raw())
    }

    /// A square checkerboard of `size` pixels with `cells` cells per side.
    pub fn checker(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let size = size.max(1);
        let cell = (size / cells.max(1)).max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * BYTES_PER_TEXEL);

        for y in 0..size {
            for x in 0..size {
                let color = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    /// A single-color square image.
    pub fn solid(size: u32, color: [u8; 4]) -> Self {
        Self::checker(size, 1, color, color)
    }

    /// A vertical gradient from `top` to `bottom`.
    pub fn vertical_gradient(size: u32, top: [u8; 4], bottom: [u8; 4]) -> Self {
        let size = size.max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * BYTES_PER_TEXEL);
        let span = (size - 1).max(1) as f32;

        for y in 0..size {
            let t = y as f32 / span;
            let row: [u8; 4] =
                std::array::from_fn(|c| (top[c] as f32 + (bottom[c] as f32 - top[c] as f32) * t).round() as u8);
            for _ in 0..size {
                pixels.extend_from_slice(&row);
            }
        }

        Self {
            width: size,
            height: size,
            pixels,
        }
    }
}

/// Six equally sized faces of a cube map, in layer order
/// +X, -X, +Y, -Y, +Z, -Z.
#[derive(Clone, Debug)]
pub struct CubemapData {
    faces: [TextureData; 6],
}

impl CubemapData {
    /// Validates each face and checks that all faces share face 0's size.
    pub fn new(faces: [TextureData; 6]) -> ResourceResult<Self> {
        for face in &faces {
            face.validate()?;
        }

        let (expected_width, expected_height) = (faces[0].width, faces[0].height);
        if let Some((index, face)) = faces
            .iter()
            .enumerate()
            .find(|(_, f)| f.width != expected_width || f.height != expected_height)
        {
            return Err(ResourceError::CubemapMismatch {
                face: index,
                width: face.width,
                height: face.height,
                expected_width,
                expected_height,
            });
        }

        Ok(Self { faces })
    }

    /// Loads six face images.
    pub fn load(paths: [&Path; 6]) -> ResourceResult<Self> {
        let mut faces = Vec::with_capacity(6);
        for path in paths {
            faces.push(TextureData::load(path)?);
        }
        let faces: [TextureData; 6] = faces
            .try_into()
            .map_err(|_| ResourceError::InvalidTexture("cube map needs six faces".to_string()))?;
        Self::new(faces)
    }

    /// Procedural sky: a horizon gradient on the sides, flat colors on the
    /// poles.
    pub fn sky(size: u32) -> Self {
        const ZENITH: [u8; 4] = [70, 120, 200, 255];
        const HORIZON: [u8; 4] = [190, 215, 240, 255];
        const GROUND: [u8; 4] = [80, 70, 60, 255];

        let side = TextureData::vertical_gradient(size, ZENITH, HORIZON);
        Self {
            faces: [
                side.clone(),
                side.clone(),
                TextureData::solid(size, ZENITH),
                TextureData::solid(size, GROUND),
                side.clone(),
                side,
            ],
        }
    }

    /// Edge length of every face.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.faces[0].width, self.faces[0].height)
    }

    /// Faces in layer order.
    #[inline]
    pub fn faces(&self) -> &[TextureData; 6] {
        &self.faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_length() {
        assert!(TextureData::new(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            TextureData::new(2, 2, vec![0; 15]),
            Err(ResourceError::InvalidTexture(_))
        ));
        assert!(matches!(
            TextureData::new(0, 2, vec![]),
            Err(ResourceError::InvalidTexture(_))
        ));
    }

    #[test]
    fn test_checker_pattern() {
        let white = [255; 4];
        let black = [0, 0, 0, 255];
        let texture = TextureData::checker(4, 2, white, black);
        texture.validate().unwrap();

        let pixel = |x: usize, y: usize| &texture.pixels[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(pixel(0, 0), white);
        assert_eq!(pixel(1, 1), white);
        assert_eq!(pixel(2, 0), black);
        assert_eq!(pixel(0, 2), black);
        assert_eq!(pixel(3, 3), white);
    }

    #[test]
    fn test_vertical_gradient_endpoints() {
        let texture = TextureData::vertical_gradient(3, [0, 0, 0, 255], [200, 100, 50, 255]);
        assert_eq!(&texture.pixels[0..4], &[0, 0, 0, 255]);
        let last_row = 2 * 3 * 4;
        assert_eq!(&texture.pixels[last_row..last_row + 4], &[200, 100, 50, 255]);
    }

    #[test]
    fn test_cubemap_size_mismatch() {
        let mut faces: [TextureData; 6] = std::array::from_fn(|_| TextureData::solid(4, [0; 4]));
        faces[3] = TextureData::solid(8, [0; 4]);

        match CubemapData::new(faces) {
            Err(ResourceError::CubemapMismatch {
                face,
                width,
                expected_width,
                ..
            }) => {
                assert_eq!(face, 3);
                assert_eq!(width, 8);
                assert_eq!(expected_width, 4);
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_procedural_sky() {
        let sky = CubemapData::sky(16);
        assert_eq!(sky.size(), (16, 16));
        CubemapData::new(sky.faces().clone()).unwrap();
    }
}
