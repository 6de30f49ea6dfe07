//! Top-level acceleration structure: agglomerative clustering over
//! per-frame instance AABBs.
//!
//! Both child indices pack into one `u32` (`left_right`, 16 bits each),
//! which caps a single TLAS at 2^16 instances — kept here as
//! [`MAX_INSTANCES`] and enforced at submission time rather than silently
//! wrapping.

use crate::bvh::intersect_aabb;
use crate::geometry::GeometryStore;
use crate::instance::BvhInstance;
use crate::math::Vec3;
use crate::ray::{HitResult, Ray, INDEX_INVALID};

/// The `left_right` packing is two 16-bit indices, so a TLAS cannot
/// address more than this many instances.
pub const MAX_INSTANCES: usize = 1 << 16;

#[derive(Clone, Copy, Debug)]
pub struct TlasNode {
    pub aabb_min: Vec3,
    /// Packed `left << 16 | right` child node indices for an interior node.
    pub left_right: u32,
    pub aabb_max: Vec3,
    pub blas_instance_index: u32,
}

impl TlasNode {
    pub fn is_leaf(&self) -> bool {
        self.left_right == 0
    }

    fn left(&self) -> usize {
        (self.left_right >> 16) as usize
    }

    fn right(&self) -> usize {
        (self.left_right & 0xFFFF) as usize
    }
}

/// A built top-level acceleration structure over a frame's instance set.
pub struct Tlas {
    pub nodes: Vec<TlasNode>,
}

impl Tlas {
    /// Builds a TLAS over `instances` by agglomerative clustering: starting
    /// from one leaf per instance, repeatedly merges the globally cheapest
    /// best-match pair (the "B is A's best match and A is B's best match"
    /// fixed point) until a single root remains.
    pub fn build(instances: &[BvhInstance]) -> Self {
        assert!(
            instances.len() <= MAX_INSTANCES,
            "tlas instance count {} exceeds the 16-bit left_right packing cap of {MAX_INSTANCES}",
            instances.len()
        );

        if instances.is_empty() {
            return Self { nodes: Vec::new() };
        }

        let instance_count = instances.len();
        let mut nodes = Vec::with_capacity(instance_count * 2);
        nodes.push(TlasNode {
            aabb_min: Vec3::ZERO,
            left_right: 0,
            aabb_max: Vec3::ZERO,
            blas_instance_index: 0,
        });

        let mut node_idx = vec![0usize; instance_count];
        for (i, instance) in instances.iter().enumerate() {
            let aabb = instance.world_space_aabb();
            node_idx[i] = nodes.len();
            nodes.push(TlasNode {
                aabb_min: aabb.min,
                left_right: 0,
                aabb_max: aabb.max,
                blas_instance_index: i as u32,
            });
        }

        let mut active = node_idx;

        let find_best_match = |nodes: &[TlasNode], active: &[usize], a: usize| -> usize {
            let mut best = usize::MAX;
            let mut best_area = f32::MAX;
            for (b, &node_b) in active.iter().enumerate() {
                if b == a {
                    continue;
                }
                let node_a = &nodes[active[a]];
                let node_b = &nodes[node_b];
                let merged_min = node_a.aabb_min.min(node_b.aabb_min);
                let merged_max = node_a.aabb_max.max(node_b.aabb_max);
                let area = half_area(merged_min, merged_max);
                if area < best_area {
                    best_area = area;
                    best = b;
                }
            }
            best
        };

        let mut a = 0usize;
        let mut b = find_best_match(&nodes, &active, a);

        while active.len() > 1 {
            let c = find_best_match(&nodes, &active, b);

            if a == c {
                let node_idx_a = active[a];
                let node_idx_b = active[b];

                let node_a = nodes[node_idx_a];
                let node_b = nodes[node_idx_b];

                let merged = TlasNode {
                    aabb_min: node_a.aabb_min.min(node_b.aabb_min),
                    left_right: (node_idx_a as u32) << 16 | node_idx_b as u32,
                    aabb_max: node_a.aabb_max.max(node_b.aabb_max),
                    blas_instance_index: 0,
                };
                let merged_idx = nodes.len();
                nodes.push(merged);

                active[a] = merged_idx;
                active.swap_remove(b);

                b = find_best_match(&nodes, &active, a);
            } else {
                a = b;
                b = c;
            }
        }

        let root = nodes[active[a]];
        nodes[0] = root;

        Self { nodes }
    }

    /// Traces `ray` through the TLAS, descending into whichever instance's
    /// BLAS its leaf references on a leaf hit.
    pub fn trace_ray(
        &self,
        ray: &mut Ray,
        instances: &[BvhInstance],
        geometry: &GeometryStore,
    ) -> HitResult {
        let mut hit_result = HitResult::default();

        if self.nodes.is_empty() {
            return hit_result;
        }

        let root = &self.nodes[0];
        if intersect_aabb(root.aabb_min, root.aabb_max, ray) == f32::MAX {
            return hit_result;
        }
        ray.bvh_depth += 1;

        let mut node_idx = 0usize;
        let mut stack = [0usize; 64];
        let mut stack_at = 0usize;

        loop {
            let node = &self.nodes[node_idx];

            if node.is_leaf() {
                let instance = &instances[node.blas_instance_index as usize];
                if instance.trace_ray(ray, &mut hit_result, geometry) {
                    hit_result.instance_idx = node.blas_instance_index;
                }

                if stack_at == 0 {
                    break;
                }
                stack_at -= 1;
                node_idx = stack[stack_at];
                continue;
            }

            let left_idx = node.left();
            let right_idx = node.right();
            let left = &self.nodes[left_idx];
            let right = &self.nodes[right_idx];

            let mut left_dist = intersect_aabb(left.aabb_min, left.aabb_max, ray);
            let mut right_dist = intersect_aabb(right.aabb_min, right.aabb_max, ray);
            let (mut left_idx, mut right_idx) = (left_idx, right_idx);

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

        if hit_result.instance_idx == INDEX_INVALID {
            hit_result.prim_idx = INDEX_INVALID;
        } else {
            hit_result.t = ray.t;
        }

        hit_result
    }
}

fn half_area(min: Vec3, max: Vec3) -> f32 {
    let e = max - min;
    e.x * e.y + e.y * e.z + e.z * e.x
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Vertex;

    fn two_instance_scene() -> (GeometryStore, Vec<BvhInstance>) {
        let mut store = GeometryStore::new();
        let vertices = vec![
            Vertex { position: Vec3::new(-1.0, -1.0, 0.0), normal: Vec3::new(0.0, 0.0, 1.0) },
            Vertex { position: Vec3::new(1.0, -1.0, 0.0), normal: Vec3::new(0.0, 0.0, 1.0) },
            Vertex { position: Vec3::new(0.0, 1.0, 0.0), normal: Vec3::new(0.0, 0.0, 1.0) },
        ];
        let mesh = store.create_mesh("tri", &vertices, &[0, 1, 2]).unwrap();

        let a = BvhInstance::new(mesh, glam::Mat4::from_translation(Vec3::new(-5.0, 0.0, 0.0)), &store);
        let b = BvhInstance::new(mesh, glam::Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)), &store);

        (store, vec![a, b])
    }

    #[test]
    fn empty_instance_set_always_misses() {
        let tlas = Tlas::build(&[]);
        let store = GeometryStore::new();
        let mut ray = Ray::new(Vec3::ZERO, Vec3::Z);
        let hit = tlas.trace_ray(&mut ray, &[], &store);

        assert!(!hit.has_hit_geometry());
    }

    #[test]
    fn ray_hits_the_correct_far_instance() {
        let (store, instances) = two_instance_scene();
        let tlas = Tlas::build(&instances);

        let mut ray = Ray::new(Vec3::new(5.0, 0.0, -10.0), Vec3::Z);
        let hit = tlas.trace_ray(&mut ray, &instances, &store);

        assert!(hit.has_hit_geometry());
        assert_eq!(hit.instance_idx, 1);
    }

    #[test]
    fn ray_between_instances_misses() {
        let (store, instances) = two_instance_scene();
        let tlas = Tlas::build(&instances);

        let mut ray = Ray::new(Vec3::new(0.0, 5.0, -10.0), Vec3::Z);
        let hit = tlas.trace_ray(&mut ray, &instances, &store);

        assert!(!hit.has_hit_geometry());
    }
}
