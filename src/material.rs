//! Surface materials: diffuse/specular/dielectric weights plus emission,
//! with constructors for each of the minimal BSDF presets this renderer
//! supports.

use crate::math::Vec3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub albedo: Vec3,
    pub specular: f32,

    pub refractivity: f32,
    pub ior: f32,
    pub absorption: Vec3,

    pub emissive: bool,
    pub emissive_color: Vec3,
    pub emissive_intensity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::ZERO,
            specular: 0.0,
            refractivity: 0.0,
            ior: 1.0,
            absorption: Vec3::ZERO,
            emissive: false,
            emissive_color: Vec3::ZERO,
            emissive_intensity: 0.0,
        }
    }
}

impl Material {
    pub fn diffuse(albedo: Vec3) -> Self {
        Self {
            albedo,
            ..Default::default()
        }
    }

    pub fn specular(albedo: Vec3, specular: f32) -> Self {
        Self {
            albedo,
            specular,
            ..Default::default()
        }
    }

    pub fn refractive(albedo: Vec3, specular: f32, refractivity: f32, ior: f32, absorption: Vec3) -> Self {
        Self {
            albedo,
            specular,
            refractivity,
            ior,
            absorption,
            ..Default::default()
        }
    }

    pub fn emissive(emissive_color: Vec3, emissive_intensity: f32) -> Self {
        Self {
            emissive: true,
            emissive_color,
            emissive_intensity,
            ..Default::default()
        }
    }
}
