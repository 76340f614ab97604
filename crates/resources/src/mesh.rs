//! Mesh types, the builtin mesh data and the CPU-side mesh lump.
//!
//! Every mesh type's vertices and indices are concatenated into one vertex
//! list and one index list so the renderer binds a single vertex buffer and
//! a single index buffer for all of them. Indices are rebased as they are
//! consumed, so each mesh type is drawn with
//! `draw_indexed(index_count, instances, first_index, 0, first_instance)`.

use glam::{Vec2, Vec3};

use engine_rhi::vertex::MeshVertex;

use crate::error::{ResourceError, ResourceResult};

/// Kind of mesh an instance is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MeshType {
    /// A single triangle.
    Triangle,
    /// A quad made of two triangles.
    Square,
    /// An eight-triangle star.
    Star,
}

impl MeshType {
    /// Every mesh type, in draw order.
    pub const ALL: [MeshType; 3] = [MeshType::Triangle, MeshType::Square, MeshType::Star];

    /// Number of mesh types.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this type in [`MeshType::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns a human-readable name for the type.
    pub fn name(self) -> &'static str {
        match self {
            MeshType::Triangle => "triangle",
            MeshType::Square => "square",
            MeshType::Star => "star",
        }
    }
}

/// Location of one mesh type inside the index lump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshRange {
    /// First index in the lump.
    pub first_index: u32,
    /// Number of indices.
    pub index_count: u32,
}

/// Vertex and index lump covering all mesh types.
#[derive(Debug, Default)]
pub struct MeshRegistry {
    vertices: Vec<MeshVertex>,
    indices: Vec<u32>,
    ranges: [Option<MeshRange>; MeshType::COUNT],
}

impl MeshRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the builtin triangle, square and star.
    pub fn builtin() -> ResourceResult<Self> {
        let mut registry = Self::new();
        for mesh_type in MeshType::ALL {
            let (vertices, indices) = builtin_mesh(mesh_type);
            registry.consume(mesh_type, &vertices, &indices)?;
        }
        Ok(registry)
    }

    /// Appends a mesh to the lump.
    ///
    /// `indices` refer to `vertices`; they are offset by the number of
    /// vertices already in the lump.
    ///
    /// # Errors
    ///
    /// Fails if `mesh_type` was already consumed or an index is out of range.
    pub fn consume(
        &mut self,
        mesh_type: MeshType,
        vertices: &[MeshVertex],
        indices: &[u32],
    ) -> ResourceResult<()> {
        if self.ranges[mesh_type.index()].is_some() {
            return Err(ResourceError::UnknownMesh(mesh_type, "already registered"));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(ResourceError::IndexOutOfRange {
                mesh: mesh_type,
                index,
                vertex_count: vertices.len(),
            });
        }

        let vertex_offset = self.vertices.len() as u32;
        let range = MeshRange {
            first_index: self.indices.len() as u32,
            index_count: indices.len() as u32,
        };

        self.vertices.extend_from_slice(vertices);
        self.indices
            .extend(indices.iter().map(|&index| index + vertex_offset));
        self.ranges[mesh_type.index()] = Some(range);

        Ok(())
    }

    /// Returns where `mesh_type` lives in the index lump.
    pub fn range(&self, mesh_type: MeshType) -> ResourceResult<MeshRange> {
        self.ranges[mesh_type.index()]
            .ok_or(ResourceError::UnknownMesh(mesh_type, "not registered"))
    }

    /// Returns the vertex lump.
    #[inline]
    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    /// Returns the index lump.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

fn vertex(x: f32, y: f32, color: Vec3, u: f32, v: f32) -> MeshVertex {
    MeshVertex::new(Vec3::new(x, y, 0.0), color, Vec2::new(u, v), Vec3::Z)
}

/// Returns the builtin vertices and local indices for `mesh_type`.
pub fn builtin_mesh(mesh_type: MeshType) -> (Vec<MeshVertex>, Vec<u32>) {
    match mesh_type {
        MeshType::Triangle => {
            let color = Vec3::new(0.0, 1.0, 0.0);
            (
                vec![
                    vertex(0.00, -0.05, color, 0.5, 0.0),
                    vertex(0.05, 0.05, color, 1.0, 1.0),
                    vertex(-0.05, 0.05, color, 0.0, 1.0),
                ],
                vec![0, 1, 2],
            )
        }
        MeshType::Square => {
            let color = Vec3::new(1.0, 0.0, 0.0);
            (
                vec![
                    vertex(-0.05, 0.05, color, 0.0, 1.0),
                    vertex(-0.05, -0.05, color, 0.0, 0.0),
                    vertex(0.05, -0.05, color, 1.0, 0.0),
                    vertex(0.05, 0.05, color, 1.0, 1.0),
                ],
                vec![0, 1, 2, 2, 3, 0],
            )
        }
        MeshType::Star => {
            let color = Vec3::new(0.0, 0.0, 1.0);
            (
                vec![
                    vertex(-0.10, -0.05, color, 0.00, 0.25),
                    vertex(-0.04, -0.05, color, 0.30, 0.25),
                    vertex(-0.06, 0.00, color, 0.20, 0.50),
                    vertex(0.00, -0.10, color, 0.50, 0.00),
                    vertex(0.04, -0.05, color, 0.70, 0.25),
                    vertex(0.10, -0.05, color, 1.00, 0.25),
                    vertex(0.06, 0.00, color, 0.80, 0.50),
                    vertex(0.08, 0.10, color, 0.90, 1.00),
                    vertex(0.00, 0.02, color, 0.50, 0.60),
                    vertex(-0.08, 0.10, color, 0.10, 1.00),
                ],
                vec![
                    0, 1, 2, //
                    1, 3, 4, //
                    2, 1, 4, //
                    4, 5, 6, //
                    2, 4, 6, //
                    6, 7, 8, //
                    2, 6, 8, //
                    2, 8, 9,
                ],
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Vec<MeshVertex> {
        vec![MeshVertex::default(); 4]
    }

    #[test]
    fn test_consume_rebases_indices() {
        let mut registry = MeshRegistry::new();
        registry
            .consume(MeshType::Triangle, &[MeshVertex::default(); 3], &[0, 1, 2])
            .unwrap();
        registry
            .consume(MeshType::Square, &quad(), &[0, 1, 2, 2, 3, 0])
            .unwrap();

        assert_eq!(registry.vertices().len(), 7);
        assert_eq!(registry.indices(), &[0, 1, 2, 3, 4, 5, 5, 6, 3]);

        assert_eq!(
            registry.range(MeshType::Triangle).unwrap(),
            MeshRange {
                first_index: 0,
                index_count: 3
            }
        );
        assert_eq!(
            registry.range(MeshType::Square).unwrap(),
            MeshRange {
                first_index: 3,
                index_count: 6
            }
        );
    }

    #[test]
    fn test_unregistered_mesh() {
        let registry = MeshRegistry::new();
        assert!(matches!(
            registry.range(MeshType::Star),
            Err(ResourceError::UnknownMesh(MeshType::Star, _))
        ));
    }

    #[test]
    fn test_double_registration_rejected() {
        let mut registry = MeshRegistry::new();
        registry.consume(MeshType::Star, &quad(), &[0, 1, 2]).unwrap();
        let result = registry.consume(MeshType::Star, &quad(), &[0, 1, 2]);
        assert!(matches!(result, Err(ResourceError::UnknownMesh(..))));
    }

    #[test]
    fn test_index_out_of_range() {
        let mut registry = MeshRegistry::new();
        let result = registry.consume(MeshType::Triangle, &quad(), &[0, 1, 4]);
        match result {
            Err(ResourceError::IndexOutOfRange {
                index,
                vertex_count,
                ..
            }) => {
                assert_eq!(index, 4);
                assert_eq!(vertex_count, 4);
            }
            other => panic!("Unexpected result: {:?}", other),
        }
        assert!(registry.vertices().is_empty());
    }

    #[test]
    fn test_builtin_registry() {
        let registry = MeshRegistry::builtin().unwrap();

        let triangle = registry.range(MeshType::Triangle).unwrap();
        let square = registry.range(MeshType::Square).unwrap();
        let star = registry.range(MeshType::Star).unwrap();

        assert_eq!(triangle.index_count, 3);
        assert_eq!(square.first_index, 3);
        assert_eq!(square.index_count, 6);
        assert_eq!(star.first_index, 9);
        assert_eq!(star.index_count, 24);

        assert_eq!(registry.vertices().len(), 3 + 4 + 10);
        let vertex_count = registry.vertices().len() as u32;
        assert!(registry.indices().iter().all(|&i| i < vertex_count));
    }

    #[test]
    fn test_builtin_meshes_are_triangle_lists() {
        for mesh_type in MeshType::ALL {
            let (vertices, indices) = builtin_mesh(mesh_type);
            assert_eq!(indices.len() % 3, 0, "{}", mesh_type.name());
            assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        }
    }

    #[test]
    fn test_mesh_type_index_matches_order() {
        for (i, mesh_type) in MeshType::ALL.iter().enumerate() {
            assert_eq!(mesh_type.index(), i);
        }
    }
}
