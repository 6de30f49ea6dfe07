//! Rays and hit results. `origin`/`dir`/`inv_dir` are kept as plain
//! `Vec3`s, leaving the SIMD lane-packing to the traversal engine, which
//! loads them into `glam::Vec4` only where it intersects AABBs.

use crate::math::Vec3;

pub const RAY_NUDGE: f32 = 0.001;

/// Sentinel primitive/instance index meaning "no hit".
pub const INDEX_INVALID: u32 = u32::MAX;

/// A ray in world space, with precomputed inverse direction for the AABB
/// slab test and a running `t` that traversal shortens monotonically.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
    pub inv_dir: Vec3,
    pub t: f32,
    /// Interior-node visit count across both TLAS and BLAS traversal,
    /// incremented on every step down the tree. Used only by the
    /// `AccelerationStructureDepth` debug visualization.
    pub bvh_depth: u32,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir,
            inv_dir: dir.recip(),
            t: f32::MAX,
            bvh_depth: 0,
        }
    }

    /// Returns the point `origin + dir * t`, using this ray's current `t`
    /// unless `t` is supplied directly by a local-space transform.
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }

    /// Transforms this ray into another coordinate space via `inverse`,
    /// keeping `t` meaningful in *world*-space units: a non-unit local
    /// direction means the local `t` at which a transformed hit occurs
    /// equals the original world-space `t`, since the local direction is
    /// scaled by the same factor the local-space distances are.
    pub fn transformed(&self, inverse: glam::Mat4) -> Self {
        let origin = inverse.transform_point3(self.origin);
        let dir = inverse.transform_vector3(self.dir);
        Self {
            origin,
            dir,
            inv_dir: dir.recip(),
            t: self.t,
            bvh_depth: self.bvh_depth,
        }
    }
}

/// The result of a TLAS/BLAS traversal: a closest hit (if any), already
/// resolved to world space.
#[derive(Clone, Copy, Debug)]
pub struct HitResult {
    pub pos: Vec3,
    pub normal: Vec3,
    pub bary: Vec3,
    pub t: f32,
    pub instance_idx: u32,
    pub prim_idx: u32,
}

impl Default for HitResult {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            normal: Vec3::ZERO,
            bary: Vec3::ZERO,
            t: f32::MAX,
            instance_idx: INDEX_INVALID,
            prim_idx: INDEX_INVALID,
        }
    }
}

impl HitResult {
    pub fn has_hit_geometry(&self) -> bool {
        self.instance_idx != INDEX_INVALID && self.prim_idx != INDEX_INVALID
    }
}
