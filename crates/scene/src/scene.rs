//! Instance positions per mesh type.

use glam::{Mat4, Vec3};

use engine_resources::MeshType;

/// Instances of each mesh type, as world-space positions.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    positions: [Vec<Vec3>; MeshType::COUNT],
}

impl Scene {
    /// Creates a scene with no instances.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The default layout: a column of ten instances per mesh type at
    /// x = -0.3, 0.0 and 0.3, spaced 0.2 apart along y.
    pub fn default_layout() -> Self {
        let mut scene = Self::empty();
        for (mesh_type, x) in MeshType::ALL.into_iter().zip([-0.3, 0.0, 0.3]) {
            let column = (0..10)
                .map(|i| Vec3::new(x, -1.0 + 0.2 * i as f32, 0.0))
                .collect();
            scene.set_positions(mesh_type, column);
        }
        scene
    }

    /// Replaces the instances of `mesh_type`.
    pub fn set_positions(&mut self, mesh_type: MeshType, positions: Vec<Vec3>) {
        self.positions[mesh_type.index()] = positions;
    }

    /// Returns the instances of `mesh_type`.
    #[inline]
    pub fn positions(&self, mesh_type: MeshType) -> &[Vec3] {
        &self.positions[mesh_type.index()]
    }

    /// Number of instances per mesh type, in [`MeshType::ALL`] order.
    pub fn instance_counts(&self) -> [usize; MeshType::COUNT] {
        std::array::from_fn(|i| self.positions[i].len())
    }

    /// Total number of instances.
    pub fn total_instances(&self) -> usize {
        self.positions.iter().map(Vec::len).sum()
    }

    /// Model matrices of every instance, grouped by mesh type in
    /// [`MeshType::ALL`] order.
    pub fn model_transforms(&self) -> impl Iterator<Item = Mat4> + '_ {
        MeshType::ALL
            .into_iter()
            .flat_map(|mesh_type| self.positions(mesh_type).iter())
            .map(|&position| Mat4::from_translation(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let scene = Scene::default_layout();
        assert_eq!(scene.instance_counts(), [10, 10, 10]);
        assert_eq!(scene.total_instances(), 30);

        let stars = scene.positions(MeshType::Star);
        assert_eq!(stars[0], Vec3::new(0.3, -1.0, 0.0));
        assert!((stars[9].y - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_transforms_follow_mesh_type_order() {
        let mut scene = Scene::empty();
        scene.set_positions(MeshType::Star, vec![Vec3::new(3.0, 0.0, 0.0)]);
        scene.set_positions(MeshType::Triangle, vec![Vec3::new(1.0, 0.0, 0.0)]);

        let translations: Vec<f32> = scene
            .model_transforms()
            .map(|m| m.w_axis.x)
            .collect();
        assert_eq!(translations, vec![1.0, 3.0]);
    }

    #[test]
    fn test_empty_scene() {
        let scene = Scene::empty();
        assert_eq!(scene.total_instances(), 0);
        assert_eq!(scene.model_transforms().count(), 0);
    }
}
