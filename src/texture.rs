//! HDR environment texture storage and equirectangular sampling.
//!
//! Decoding a DDS file into this struct's `pixels` buffer is the job of an
//! external asset decoder; this type only owns already-decoded float RGBA
//! texel data and the equirectangular lookup over it.

use std::f32::consts::PI;

use crate::math::{Vec2, Vec3};

const INV_ATAN: Vec2 = Vec2::new(1.0 / (2.0 * PI), 1.0 / PI);

/// A decoded HDR environment map: `width * height` RGBA32F texels in
/// row-major order.
pub struct HdrEnvTexture {
    pub width: u32,
    pub height: u32,
    pixels: Vec<glam::Vec4>,
}

impl HdrEnvTexture {
    /// Wraps already-decoded RGBA32F texel data. `pixels.len()` must equal
    /// `width * height`.
    pub fn new(width: u32, height: u32, pixels: Vec<glam::Vec4>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A single uniform-color environment, useful for tests and as a
    /// default when no environment map is submitted.
    pub fn solid(color: glam::Vec4) -> Self {
        Self::new(1, 1, vec![color])
    }

    /// Samples the nearest texel in the direction `dir` under an
    /// equirectangular projection.
    pub fn sample(&self, dir: Vec3) -> Vec3 {
        let mut uv = direction_to_equirect_uv(dir);
        uv.y = (uv.y - 1.0).abs();

        let x = ((uv.x * self.width as f32) as u32).min(self.width - 1);
        let y = ((uv.y * self.height as f32) as u32).min(self.height - 1);

        let texel = self.pixels[(y * self.width + x) as usize];
        Vec3::new(texel.x, texel.y, texel.z)
    }
}

/// Maps a unit direction to `[0, 1]^2` equirectangular UV coordinates.
pub fn direction_to_equirect_uv(dir: Vec3) -> Vec2 {
    let mut uv = Vec2::new(dir.z.atan2(dir.x), dir.y.asin());
    uv *= INV_ATAN;
    uv += 0.5;
    uv
}

/// Inverse of [`direction_to_equirect_uv`], used to check the UV/direction
/// round-trip law.
pub fn equirect_uv_to_direction(uv: Vec2) -> Vec3 {
    let remapped = (uv - 0.5) / INV_ATAN;
    let (phi, theta) = (remapped.x, remapped.y);
    let cos_theta = theta.cos();
    Vec3::new(phi.cos() * cos_theta, theta.sin(), phi.sin() * cos_theta)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equirect_uv_round_trips_through_its_inverse() {
        let dirs = [
            Vec3::new(0.3, 0.4, 0.5).normalize(),
            Vec3::new(-0.2, 0.1, 0.9).normalize(),
            Vec3::new(0.0, -1.0, 0.0).normalize(),
        ];
        for dir in dirs {
            let uv = direction_to_equirect_uv(dir);
            let round_tripped = equirect_uv_to_direction(uv);
            assert!((round_tripped - dir).length() < 1e-3);
        }
    }

    #[test]
    fn solid_environment_samples_the_same_color_everywhere() {
        let env = HdrEnvTexture::solid(glam::Vec4::new(0.5, 0.6, 0.7, 1.0));
        let a = env.sample(Vec3::new(1.0, 0.0, 0.0));
        let b = env.sample(Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(a, b);
        assert_eq!(a, Vec3::new(0.5, 0.6, 0.7));
    }

    proptest::proptest! {
        /// `direction_to_equirect_uv` composed with its inverse reproduces
        /// the input direction, for arbitrary unit vectors away from the
        /// projection's poles (where `atan2`'s azimuth becomes degenerate,
        /// same caveat any equirectangular projection has).
        #[test]
        fn equirect_round_trip_holds_for_arbitrary_directions(
            x in -1.0f32..1.0,
            y in -1.0f32..1.0,
            z in -1.0f32..1.0,
        ) {
            let v = Vec3::new(x, y, z);
            proptest::prop_assume!(v.length() > 1e-3);
            let dir = v.normalize();
            proptest::prop_assume!(dir.y.abs() < 0.999);

            let uv = direction_to_equirect_uv(dir);
            let round_tripped = equirect_uv_to_direction(uv);
            proptest::prop_assert!((round_tripped - dir).length() < 1e-3);
        }
    }

    #[test]
    fn equirect_uv_stays_within_unit_square_for_axis_directions() {
        for dir in [Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X, -Vec3::Y, -Vec3::Z] {
            let uv = direction_to_equirect_uv(dir.normalize());
            assert!(uv.x >= -1e-4 && uv.x <= 1.0 + 1e-4);
            assert!(uv.y >= -1e-4 && uv.y <= 1.0 + 1e-4);
        }
    }
}
