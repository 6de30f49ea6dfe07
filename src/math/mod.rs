//! Mathematics types and functions, mostly based on
//! [_glam-rs_](https://github.com/bitshifter/glam-rs).
//!
//! Also contains the axis-aligned bounding box shared by the acceleration
//! structures and the integrator.

mod aabb;

pub use {
    self::aabb::Aabb,
    glam::{quat, vec2, vec3, vec4, EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4},
};

/// Returns `true` if the given vector is neither infinite nor `NaN`.
#[inline]
pub fn vec2_is_finite(val: Vec2) -> bool {
    let x = val.x.is_finite() as u8;
    let y = val.y.is_finite() as u8;

    x * y == 1
}

/// Returns `true` if the given vector is neither infinite nor `NaN`.
#[inline]
pub fn vec3_is_finite(val: Vec3) -> bool {
    let x = val.x.is_finite() as u8;
    let y = val.y.is_finite() as u8;
    let z = val.z.is_finite() as u8;

    x * y * z == 1
}

/// Returns `true` if the given vector is neither infinite nor `NaN`.
#[inline]
pub fn vec4_is_finite(val: Vec4) -> bool {
    let x = val.x.is_finite() as u8;
    let y = val.y.is_finite() as u8;
    let z = val.z.is_finite() as u8;
    let w = val.w.is_finite() as u8;

    x * y * z * w == 1
}

/// Creates a Vec4 from a Vec3 and w value.
#[inline]
pub fn vec4_from_vec3(vec: Vec3, w: f32) -> Vec4 {
    vec4(vec.x, vec.y, vec.z, w)
}
