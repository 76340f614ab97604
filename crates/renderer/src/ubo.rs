//! Shader-visible buffer layouts.
//!
//! All structures use `#[repr(C)]` and `Pod` so they can be copied straight
//! into mapped memory. Layouts match the std140/std430 blocks in
//! `shaders/src`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use engine_scene::Camera;

/// Number of model matrices the per-frame transform buffer holds.
pub const TRANSFORM_CAPACITY: usize = 1024;

/// Per-frame camera data (set 0, binding 0 of the standard pipeline).
///
/// # Memory Layout
///
/// - Offset 0: view matrix (64 bytes)
/// - Offset 64: projection matrix (64 bytes)
/// - Offset 128: view-projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CameraUbo {
    /// World to view space.
    pub view: Mat4,
    /// View to clip space.
    pub projection: Mat4,
    /// `projection * view`.
    pub view_projection: Mat4,
}

impl CameraUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(view: Mat4, projection: Mat4) -> Self {
        Self {
            view,
            projection,
            view_projection: projection * view,
        }
    }

    /// Camera data for a framebuffer with the given aspect ratio.
    pub fn from_camera(camera: &Camera, aspect: f32) -> Self {
        Self {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(aspect),
            view_projection: camera.view_projection_matrix(aspect),
        }
    }
}

/// Per-frame sky data (set 0, binding 0 of the sky pipeline).
///
/// The sky shader builds a view ray for each pixel as
/// `forward + ndc.x * right + ndc.y * up`, so `right` and `up` are scaled
/// by the half extents of the view frustum at unit distance.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SkyUbo {
    pub forward: Vec4,
    pub right: Vec4,
    pub up: Vec4,
}

impl SkyUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn from_camera(camera: &Camera, aspect: f32) -> Self {
        let half_height = (camera.fov_y * 0.5).tan();
        let half_width = half_height * aspect;
        Self {
            forward: camera.forward().extend(0.0),
            right: (camera.right() * half_width).extend(0.0),
            // Clip-space Y points down in Vulkan.
            up: (camera.camera_up() * -half_height).extend(0.0),
        }
    }
}

/// Size in bytes of the per-frame transform storage buffer.
pub const TRANSFORM_BUFFER_SIZE: usize = TRANSFORM_CAPACITY * std::mem::size_of::<Mat4>();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_ubo_size() {
        // 3 Mat4 (3 * 64) = 192 bytes
        assert_eq!(CameraUbo::SIZE, 192);
        assert_eq!(std::mem::align_of::<CameraUbo>(), 16);
    }

    #[test]
    fn test_sky_ubo_size() {
        assert_eq!(SkyUbo::SIZE, 48);
    }

    #[test]
    fn test_transform_buffer_size() {
        assert_eq!(TRANSFORM_BUFFER_SIZE, 1024 * 64);
    }

    #[test]
    fn test_camera_ubo_view_projection() {
        let camera = Camera::new();
        let ubo = CameraUbo::from_camera(&camera, 4.0 / 3.0);
        assert_eq!(ubo.view, camera.view_matrix());
        assert_eq!(ubo.projection, camera.projection_matrix(4.0 / 3.0));
        assert_eq!(ubo.view_projection, ubo.projection * ubo.view);
        assert_eq!(ubo.view_projection, camera.view_projection_matrix(4.0 / 3.0));
    }

    #[test]
    fn test_sky_ubo_center_ray_is_forward() {
        let camera = Camera::new();
        let sky = SkyUbo::from_camera(&camera, 1.0);
        assert!((sky.forward.truncate() - camera.forward()).length() < 1e-6);
        assert_eq!(sky.forward.w, 0.0);
    }

    #[test]
    fn test_sky_ubo_scaled_by_frustum() {
        let camera = Camera {
            fov_y: 90.0_f32.to_radians(),
            ..Camera::new()
        };
        let sky = SkyUbo::from_camera(&camera, 2.0);
        // tan(45 degrees) = 1, so right spans the aspect ratio.
        assert!((sky.right.truncate().length() - 2.0).abs() < 1e-5);
        assert!((sky.up.truncate().length() - 1.0).abs() < 1e-5);
        assert!(sky.right.truncate().dot(sky.forward.truncate()).abs() < 1e-5);
    }
}
