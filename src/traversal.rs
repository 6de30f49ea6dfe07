//! The traversal engine seam: everything downstream of the integrator
//! asks an [`Intersector`] to resolve a ray, never a [`Tlas`] directly.
//! Keeping that call behind a trait is what lets a future hardware-backed
//! intersector slot in without touching the integrator.

use crate::instance::BvhInstance;
use crate::geometry::GeometryStore;
use crate::ray::{HitResult, Ray};
use crate::tlas::Tlas;

/// Resolves a ray against whatever acceleration structure backs a frame.
pub trait Intersector {
    fn trace_ray(&self, ray: &mut Ray) -> HitResult;
}

/// The only intersector this crate ships: a CPU TLAS/BLAS traversal over a
/// frame's instance set, borrowed for the lifetime of a single `render`
/// call.
pub struct SoftwareIntersector<'a> {
    tlas: &'a Tlas,
    instances: &'a [BvhInstance],
    geometry: &'a GeometryStore,
}

impl<'a> SoftwareIntersector<'a> {
    pub fn new(tlas: &'a Tlas, instances: &'a [BvhInstance], geometry: &'a GeometryStore) -> Self {
        Self {
            tlas,
            instances,
            geometry,
        }
    }
}

impl Intersector for SoftwareIntersector<'_> {
    fn trace_ray(&self, ray: &mut Ray) -> HitResult {
        self.tlas.trace_ray(ray, self.instances, self.geometry)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Vertex;
    use crate::math::Vec3;

    #[test]
    fn software_intersector_delegates_to_tlas() {
        let mut store = GeometryStore::new();
        let vertices = vec![
            Vertex { position: Vec3::new(-1.0, -1.0, 0.0), normal: Vec3::Z },
            Vertex { position: Vec3::new(1.0, -1.0, 0.0), normal: Vec3::Z },
            Vertex { position: Vec3::new(0.0, 1.0, 0.0), normal: Vec3::Z },
        ];
        let mesh = store.create_mesh("tri", &vertices, &[0, 1, 2]).unwrap();
        let instances = vec![BvhInstance::new(mesh, glam::Mat4::IDENTITY, &store)];
        let tlas = Tlas::build(&instances);

        let intersector = SoftwareIntersector::new(&tlas, &instances, &store);
        let mut ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let hit = intersector.trace_ray(&mut ray);

        assert!(hit.has_hit_geometry());
    }
}
