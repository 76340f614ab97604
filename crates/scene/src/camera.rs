//! Camera for rendering.

use glam::{Mat4, Vec3};

/// A look-at camera with a perspective projection.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Camera position in world space
    pub eye: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// World-space up hint
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(1.0, 0.0, -1.0),
            target: Vec3::ZERO,
            up: Vec3::new(0.0, 0.0, -1.0),
            fov_y: 45.0_f32.to_radians(),
            near: 0.1,
            far: 10.0,
        }
    }
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// Get the projection matrix for `aspect` (width / height), with the Y
    /// axis flipped for Vulkan clip space.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    /// Get the view-projection matrix.
    pub fn view_projection_matrix(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Unit vector from the eye towards the target.
    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    /// Unit vector to the right of the view direction.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or_zero()
    }

    /// Unit up vector orthogonal to forward and right.
    pub fn camera_up(&self) -> Vec3 {
        self.right().cross(self.forward()).normalize_or_zero()
    }
}

/// Aspect ratio of a `width` x `height` target; 1.0 for a degenerate height.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    if height == 0 {
        1.0
    } else {
        width as f32 / height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_view_matrix_moves_eye_to_origin() {
        let camera = Camera::default();
        let eye_in_view = camera.view_matrix().transform_point3(camera.eye);
        assert!(eye_in_view.length() < EPSILON);
    }

    #[test]
    fn test_target_is_in_front() {
        let camera = Camera::default();
        let target_in_view = camera.view_matrix().transform_point3(camera.target);
        // Right-handed view space looks down -Z.
        assert!(target_in_view.z < 0.0);
        assert!(target_in_view.x.abs() < EPSILON);
        assert!(target_in_view.y.abs() < EPSILON);
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::default();
        let flipped = camera.projection_matrix(1.0);
        let standard = Mat4::perspective_rh(camera.fov_y, 1.0, camera.near, camera.far);
        assert!((flipped.y_axis.y + standard.y_axis.y).abs() < EPSILON);
        assert_eq!(flipped.x_axis, standard.x_axis);
    }

    #[test]
    fn test_basis_is_orthonormal() {
        let camera = Camera::default();
        let (f, r, u) = (camera.forward(), camera.right(), camera.camera_up());

        for v in [f, r, u] {
            assert!((v.length() - 1.0).abs() < EPSILON);
        }
        assert!(f.dot(r).abs() < EPSILON);
        assert!(f.dot(u).abs() < EPSILON);
        assert!(r.dot(u).abs() < EPSILON);
    }

    #[test]
    fn test_aspect_ratio() {
        assert_eq!(aspect_ratio(800, 400), 2.0);
        assert_eq!(aspect_ratio(800, 0), 1.0);
    }
}
