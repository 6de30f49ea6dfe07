//! A placed mesh: a mesh handle plus a cached world transform.
//!
//! Caches both the local->world and world->local matrices so tracing a ray
//! against an instance never re-inverts the transform, and re-derives a
//! conservative world-space AABB from the eight corners of the local-space
//! root AABB whenever the transform changes.

use crate::geometry::{GeometryStore, MeshHandle};
use crate::math::{Aabb, Vec3};
use crate::ray::{HitResult, Ray};

pub struct BvhInstance {
    pub mesh: MeshHandle,
    local_to_world: glam::Mat4,
    world_to_local: glam::Mat4,
    world_space_aabb: Aabb,
}

impl BvhInstance {
    /// Creates an instance of `mesh` with `transform`, deriving its initial
    /// world-space AABB from `mesh`'s local-space root AABB.
    pub fn new(mesh: MeshHandle, transform: glam::Mat4, geometry: &GeometryStore) -> Self {
        let mut instance = Self {
            mesh,
            local_to_world: glam::Mat4::IDENTITY,
            world_to_local: glam::Mat4::IDENTITY,
            world_space_aabb: Aabb::default(),
        };
        instance.set_transform(transform, geometry);
        instance
    }

    pub fn local_to_world(&self) -> glam::Mat4 {
        self.local_to_world
    }

    pub fn world_to_local(&self) -> glam::Mat4 {
        self.world_to_local
    }

    pub fn world_space_aabb(&self) -> Aabb {
        self.world_space_aabb
    }

    pub fn set_transform(&mut self, transform: glam::Mat4, geometry: &GeometryStore) {
        self.local_to_world = transform;
        self.world_to_local = transform.inverse();

        let Some(mesh) = geometry.lookup(self.mesh) else {
            self.world_space_aabb = Aabb::default();
            return;
        };

        let local_aabb = mesh.local_space_aabb();
        let mut world_aabb = Aabb::default();
        for corner in local_aabb.corners() {
            world_aabb.grow(self.local_to_world.transform_point3(corner));
        }
        self.world_space_aabb = world_aabb;
    }

    /// Transforms `ray_world` into this instance's local space, traces it
    /// against the mesh's BLAS, then maps the hit position and normal back
    /// to world space.
    pub fn trace_ray(
        &self,
        ray_world: &mut Ray,
        hit_result: &mut HitResult,
        geometry: &GeometryStore,
    ) -> bool {
        let Some(mesh) = geometry.lookup(self.mesh) else {
            return false;
        };

        let mut ray_local = ray_world.transformed(self.world_to_local);
        let has_hit = mesh.bvh.trace_ray(&mut ray_local, hit_result);

        ray_world.t = ray_local.t;
        ray_world.bvh_depth = ray_local.bvh_depth;

        if has_hit {
            hit_result.pos = ray_world.at(ray_world.t);
            let triangle = &mesh.bvh.triangles[hit_result.prim_idx as usize];
            let local_normal = triangle.hit_normal(hit_result.bary);
            let world_normal = self
                .local_to_world
                .transform_vector3(local_normal)
                .normalize();
            hit_result.normal = world_normal;
        }

        has_hit
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Vertex;

    fn triangle_store() -> (GeometryStore, MeshHandle) {
        let mut store = GeometryStore::new();
        let vertices = vec![
            Vertex { position: Vec3::new(-1.0, -1.0, 0.0), normal: Vec3::new(0.0, 0.0, 1.0) },
            Vertex { position: Vec3::new(1.0, -1.0, 0.0), normal: Vec3::new(0.0, 0.0, 1.0) },
            Vertex { position: Vec3::new(0.0, 1.0, 0.0), normal: Vec3::new(0.0, 0.0, 1.0) },
        ];
        let handle = store.create_mesh("tri", &vertices, &[0, 1, 2]).unwrap();
        (store, handle)
    }

    #[test]
    fn translated_instance_moves_world_aabb() {
        let (store, handle) = triangle_store();
        let instance = BvhInstance::new(handle, glam::Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)), &store);

        assert!(instance.world_space_aabb().min.x > 0.0);
    }

    #[test]
    fn trace_ray_through_translated_instance_hits() {
        let (store, handle) = triangle_store();
        let instance = BvhInstance::new(handle, glam::Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)), &store);

        let mut ray = Ray::new(Vec3::new(5.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let mut hit = HitResult::default();
        assert!(instance.trace_ray(&mut ray, &mut hit, &store));
    }

    #[test]
    fn world_to_local_round_trips_identity() {
        let (store, handle) = triangle_store();
        let transform = glam::Mat4::from_scale_rotation_translation(
            Vec3::new(2.0, 1.0, 1.0),
            glam::Quat::IDENTITY,
            Vec3::new(1.0, 2.0, 3.0),
        );
        let instance = BvhInstance::new(handle, transform, &store);

        let round_trip = instance.world_to_local() * instance.local_to_world();
        let identity = glam::Mat4::IDENTITY;
        for i in 0..4 {
            for j in 0..4 {
                assert!((round_trip.col(i)[j] - identity.col(i)[j]).abs() < 1e-4);
            }
        }
    }
}
