//! Mesh storage.
//!
//! `Vertex`/`Triangle` carry exactly the fields the BVH builder reads:
//! position and shading normal. `GeometryStore` is the slotmap-backed
//! mesh registry: meshes are submitted once, built into a BVH, and
//! referenced by instances thereafter via a stable [`MeshHandle`].

use crate::bvh::Blas;
use crate::error::{Error, InvalidInput, Result};
use crate::math::{Aabb, Vec3};
use crate::slotmap::{Handle, SlotMap};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
}

/// A triangle with its three vertex positions and normals copied in, so
/// the BVH and traversal engine never chase a vertex/index buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub p0: Vec3,
    pub p1: Vec3,
    pub p2: Vec3,
    pub n0: Vec3,
    pub n1: Vec3,
    pub n2: Vec3,
}

impl Triangle {
    pub fn centroid(&self) -> Vec3 {
        (self.p0 + self.p1 + self.p2) * 0.3333
    }

    pub fn min_max(&self) -> (Vec3, Vec3) {
        let min = self.p0.min(self.p1).min(self.p2);
        let max = self.p0.max(self.p1).max(self.p2);
        (min, max)
    }

    /// Interpolates the three vertex normals by barycentric weights
    /// `(1 - v - w, v, w)` and renormalizes.
    pub fn hit_normal(&self, bary: Vec3) -> Vec3 {
        (self.n0 * bary.x + self.n1 * bary.y + self.n2 * bary.z).normalize()
    }
}

pub type MeshHandle = Handle;

/// A built mesh: its BVH plus the triangle data the BVH indexes into.
pub struct Mesh {
    pub bvh: Blas,
    pub name: String,
}

impl Mesh {
    pub fn local_space_aabb(&self) -> Aabb {
        self.bvh.local_space_aabb()
    }
}

/// The registry of all meshes known to the renderer.
#[derive(Default)]
pub struct GeometryStore {
    meshes: SlotMap<Mesh>,
}

impl GeometryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a BVH over `vertices`/`indices` and stores the resulting mesh,
    /// returning a handle to it.
    pub fn create_mesh(
        &mut self,
        name: impl Into<String>,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<MeshHandle> {
        if indices.len() % 3 != 0 {
            return Err(Error::from(InvalidInput::IndexCountNotTriple(indices.len())));
        }
        if indices.is_empty() {
            return Err(Error::from(InvalidInput::EmptyGeometry));
        }

        let bvh = Blas::build(vertices, indices, &crate::bvh::BuildOptions::default());
        let handle = self.meshes.insert(Mesh {
            bvh,
            name: name.into(),
        });
        Ok(handle)
    }

    pub fn lookup(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    pub fn remove(&mut self, handle: MeshHandle) -> Option<Mesh> {
        self.meshes.remove(handle)
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn triangle_mesh_inputs() -> (Vec<Vertex>, Vec<u32>) {
        let vertices = vec![
            Vertex {
                position: Vec3::new(0.0, 0.0, 0.0),
                normal: Vec3::Y,
            },
            Vertex {
                position: Vec3::new(1.0, 0.0, 0.0),
                normal: Vec3::Y,
            },
            Vertex {
                position: Vec3::new(0.0, 1.0, 0.0),
                normal: Vec3::Y,
            },
        ];
        (vertices, vec![0, 1, 2])
    }

    #[test]
    fn create_mesh_then_lookup_round_trips() {
        let mut store = GeometryStore::new();
        let (vertices, indices) = triangle_mesh_inputs();
        let handle = store.create_mesh("tri", &vertices, &indices).unwrap();

        assert!(store.lookup(handle).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remove_invalidates_handle() {
        let mut store = GeometryStore::new();
        let (vertices, indices) = triangle_mesh_inputs();
        let handle = store.create_mesh("tri", &vertices, &indices).unwrap();

        store.remove(handle);
        assert!(store.lookup(handle).is_none());
    }

    #[test]
    fn index_count_not_triple_is_rejected() {
        let mut store = GeometryStore::new();
        let (vertices, _) = triangle_mesh_inputs();
        let err = store.create_mesh("bad", &vertices, &[0, 1]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(InvalidInput::IndexCountNotTriple(2))));
    }
}
