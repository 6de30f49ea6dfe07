//! The path integrator: per-pixel light transport shared by the
//! megakernel and wavefront execution shapes.
//!
//! The core bounce loop (`trace_path`) is written once here and driven by
//! two different schedulers (`megakernel`, `wavefront`) so the two forms
//! can never drift in their material/shading logic.

pub mod megakernel;
pub mod wavefront;

use glam::Vec4;

use crate::camera::Camera;
use crate::material::Material;
use crate::math::Vec3;
use crate::random::Rng;
use crate::ray::Ray;
use crate::settings::{RenderSettings, RenderViewMode};
use crate::texture::HdrEnvTexture;
use crate::traversal::Intersector;

/// Everything a traced path needs to read, borrowed for one `render` call.
/// Holding this behind the [`Intersector`] trait is what keeps the
/// integrator agnostic to whether rays resolve against the in-process
/// TLAS/BLAS traversal or an external hardware-accelerated service.
pub struct Scene<'a> {
    pub camera: &'a Camera,
    pub intersector: &'a dyn Intersector,
    /// Per-instance material, indexed by `hit_result.instance_idx`.
    pub materials: &'a [Material],
    pub hdr_env: &'a HdrEnvTexture,
    pub settings: RenderSettings,
}

const RAY_NUDGE: f32 = crate::ray::RAY_NUDGE;

fn reflect(in_dir: Vec3, normal: Vec3) -> Vec3 {
    in_dir - 2.0 * normal * in_dir.dot(normal)
}

fn refract(dir: Vec3, normal: Vec3, eta: f32, cosi: f32, k: f32) -> Vec3 {
    (dir * eta + (eta * cosi - k.sqrt()) * normal).normalize()
}

fn fresnel(cos_in: f32, cos_out: f32, ior_outside: f32, ior_inside: f32) -> f32 {
    let s_polarized =
        (ior_outside * cos_in - ior_inside * cos_out) / (ior_outside * cos_in + ior_inside * cos_out);
    let p_polarized =
        (ior_outside * cos_out - ior_inside * cos_in) / (ior_outside * cos_out + ior_inside * cos_in);
    0.5 * (s_polarized * s_polarized + p_polarized * p_polarized)
}

fn survival_probability_rr(albedo: Vec3) -> f32 {
    albedo.x.max(albedo.y).max(albedo.z).clamp(0.0, 1.0)
}

fn create_orthonormal_basis(normal: Vec3) -> (Vec3, Vec3) {
    let tangent = if normal.x.abs() > normal.z.abs() {
        Vec3::new(-normal.y, normal.x, 0.0).normalize()
    } else {
        Vec3::new(0.0, -normal.z, normal.y).normalize()
    };
    let bitangent = normal.cross(tangent);
    (tangent, bitangent)
}

fn direction_to_normal_space(normal: Vec3, sample_dir: Vec3) -> Vec3 {
    let (tangent, bitangent) = create_orthonormal_basis(normal);
    sample_dir.x * tangent + sample_dir.y * normal + sample_dir.z * bitangent
}

fn uniform_hemisphere_sample(normal: Vec3, rng: &mut Rng) -> Vec3 {
    let r1 = rng.next_f32();
    let r2 = rng.next_f32();
    let sin_theta = (1.0 - r1 * r1).sqrt();
    let phi = 2.0 * std::f32::consts::PI * r2;
    direction_to_normal_space(normal, Vec3::new(sin_theta * phi.cos(), r1, sin_theta * phi.sin()))
}

fn cosine_weighted_hemisphere_sample(normal: Vec3, rng: &mut Rng) -> Vec3 {
    let r1 = rng.next_f32();
    let r2 = rng.next_f32();
    let cos_theta = r1.sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    let phi = 2.0 * std::f32::consts::PI * r2;
    direction_to_normal_space(
        normal,
        Vec3::new(sin_theta * phi.cos(), cos_theta, sin_theta * phi.sin()),
    )
}

const INV_PI: f32 = 1.0 / std::f32::consts::PI;
const INV_TWO_PI: f32 = 1.0 / (2.0 * std::f32::consts::PI);

/// What happens to a path after its material is evaluated at a hit.
/// Returned by [`shade_hit`], the single-bounce decision shared by both
/// integrator forms.
pub enum ShadeOutcome {
    /// Russian roulette killed the path, or there is nothing further to
    /// trace; the path's accumulated energy is final.
    Terminated,
    /// The path continues with a new ray; `throughput` has already been
    /// updated by the BSDF weight of the chosen event.
    Continued(Ray),
}

/// Evaluates Russian roulette survival plus the specular/dielectric/diffuse
/// event choice at one non-emissive hit, mutating `throughput` in place and
/// returning the continuation ray (or [`ShadeOutcome::Terminated`]).
///
/// This is the equivalent of a GPU "Shade" compute shader stage, factored
/// out here as a plain function so the megakernel's per-pixel loop
/// ([`trace_path`]) and the wavefront integrator's per-bounce Shade stage
/// (in [`wavefront::render`]) call the exact same material logic and can
/// never drift from each other.
pub fn shade_hit(
    incoming_ray: Ray,
    hit_pos: Vec3,
    hit_normal: Vec3,
    material: &Material,
    throughput: &mut Vec3,
    rng: &mut Rng,
    settings: &RenderSettings,
    ray_depth: u32,
) -> ShadeOutcome {
    let ray_dir = incoming_ray.dir;
    let hit_t = incoming_ray.t;

    // Russian roulette only applies after the first bounce: the primary
    // hit always survives.
    if settings.russian_roulette && ray_depth > 0 {
        let survival_prob = survival_probability_rr(material.albedo);
        if survival_prob < rng.next_f32() {
            return ShadeOutcome::Terminated;
        }
        *throughput *= 1.0 / survival_prob;
    }

    let r = rng.next_f32();

    if r < material.specular {
        let spec_dir = reflect(ray_dir, hit_normal);
        *throughput *= material.albedo;
        return ShadeOutcome::Continued(Ray::new(hit_pos + spec_dir * RAY_NUDGE, spec_dir));
    }

    if r < material.specular + material.refractivity {
        let mut n = hit_normal;
        let mut cosi = ray_dir.dot(n).clamp(-1.0, 1.0);
        let (mut etai, mut etat) = (1.0, material.ior);
        let mut inside = true;

        if cosi < 0.0 {
            cosi = -cosi;
            inside = false;
        } else {
            std::mem::swap(&mut etai, &mut etat);
            n = -n;
        }

        let eta = etai / etat;
        let k = 1.0 - eta * eta * (1.0 - cosi * cosi);

        if k >= 0.0 {
            let refract_dir = refract(ray_dir, n, eta, cosi, k);
            let cos_in = ray_dir.dot(hit_normal);
            let cos_out = refract_dir.dot(hit_normal);
            let fr = fresnel(cos_in, cos_out, etai, etat);

            if rng.next_f32() > fr {
                *throughput *= material.albedo;

                if inside {
                    let absorption = Vec3::new(
                        (-material.absorption.x * hit_t).exp(),
                        (-material.absorption.y * hit_t).exp(),
                        (-material.absorption.z * hit_t).exp(),
                    );
                    *throughput *= absorption;
                }

                return ShadeOutcome::Continued(Ray::new(
                    hit_pos + refract_dir * RAY_NUDGE,
                    refract_dir,
                ));
            } else {
                let spec_dir = reflect(ray_dir, hit_normal);
                *throughput *= material.albedo;
                return ShadeOutcome::Continued(Ray::new(hit_pos + spec_dir * RAY_NUDGE, spec_dir));
            }
        }

        // Total internal reflection (`k < 0`): fall through without
        // emitting a new ray or touching `throughput`, so the walk
        // re-enters the loop with the same ray it just traced (and the
        // same shortened `t`), which harmlessly re-resolves to the same
        // hit until `ray_max_recursion` cuts it off.
        return ShadeOutcome::Continued(incoming_ray);
    }

    let diffuse_brdf = material.albedo * INV_PI;

    let diffuse_dir = if settings.cosine_weighted_diffuse {
        cosine_weighted_hemisphere_sample(hit_normal, rng)
    } else {
        uniform_hemisphere_sample(hit_normal, rng)
    };
    let n_dot_r = diffuse_dir.dot(hit_normal);
    let hemi_pdf = if settings.cosine_weighted_diffuse {
        n_dot_r * INV_PI
    } else {
        INV_TWO_PI
    };

    *throughput *= (n_dot_r * diffuse_brdf) / hemi_pdf;
    ShadeOutcome::Continued(Ray::new(hit_pos + diffuse_dir * RAY_NUDGE, diffuse_dir))
}

/// Traces one full path starting at `ray`, returning its accumulated
/// radiance as `(energy, alpha = 1)`.
pub fn trace_path(mut ray: Ray, scene: &Scene, rng: &mut Rng) -> Vec4 {
    let mut throughput = Vec3::ONE;
    let mut energy = Vec3::ZERO;

    let mut ray_depth = 0u32;
    let mut survived_rr = true;

    let view_mode = scene.settings.render_view_mode;

    while ray_depth <= scene.settings.ray_max_recursion {
        let hit_result = scene.intersector.trace_ray(&mut ray);

        if view_mode == RenderViewMode::AccelerationStructureDepth {
            energy = Vec3::new(0.0, 1.0, 0.0).lerp(Vec3::new(1.0, 0.0, 0.0), ray.bvh_depth as f32 / 50.0);
            break;
        }

        if !hit_result.has_hit_geometry() {
            energy += scene.settings.hdr_env_intensity * scene.hdr_env.sample(ray.dir) * throughput;
            break;
        }

        let hit_pos = hit_result.pos;
        let hit_normal = hit_result.normal;
        let hit_material = scene.materials[hit_result.instance_idx as usize];

        match view_mode {
            RenderViewMode::HitAlbedo => {
                energy = hit_material.albedo;
                break;
            }
            RenderViewMode::HitNormal => {
                energy = hit_normal.abs();
                break;
            }
            RenderViewMode::HitBarycentrics => {
                energy = hit_result.bary;
                break;
            }
            RenderViewMode::HitSpecRefract => {
                energy = Vec3::new(hit_material.specular, hit_material.refractivity, 0.0);
                break;
            }
            RenderViewMode::HitAbsorption => {
                energy = hit_material.absorption;
                break;
            }
            RenderViewMode::HitEmissive => {
                energy = hit_material.emissive_color
                    * hit_material.emissive_intensity
                    * hit_material.emissive as u32 as f32;
                break;
            }
            RenderViewMode::Depth => {
                energy = Vec3::splat(hit_result.t * 0.01);
                break;
            }
            _ => {}
        }

        if hit_material.emissive {
            energy += hit_material.emissive_color * hit_material.emissive_intensity * throughput;
            break;
        }

        match shade_hit(
            ray,
            hit_pos,
            hit_normal,
            &hit_material,
            &mut throughput,
            rng,
            &scene.settings,
            ray_depth,
        ) {
            ShadeOutcome::Terminated => {
                survived_rr = false;
                break;
            }
            ShadeOutcome::Continued(next_ray) => ray = next_ray,
        }

        ray_depth += 1;
    }

    match view_mode {
        RenderViewMode::RayRecursionDepth => {
            energy = Vec3::new(0.0, 1.0, 0.0).lerp(
                Vec3::new(1.0, 0.0, 0.0),
                ray_depth as f32 / scene.settings.ray_max_recursion as f32,
            );
        }
        RenderViewMode::RussianRouletteKillDepth => {
            let weight = ((ray_depth as f32 / scene.settings.ray_max_recursion as f32)
                - survived_rr as u32 as f32)
                .clamp(0.0, 1.0);
            energy = Vec3::new(0.0, 1.0, 0.0).lerp(Vec3::new(1.0, 0.0, 0.0), weight);
        }
        _ => {}
    }

    Vec4::new(energy.x, energy.y, energy.z, 1.0)
}

/// Exposure, contrast/brightness, saturation, tonemap, and optional sRGB
/// encode, or a raw/sRGB passthrough of a debug [`RenderViewMode`]'s
/// already-meaningful color. Shared verbatim by both integrator forms so
/// a tonemap tweak can never apply to one and not the other.
pub(crate) fn apply_post_processing(
    color: Vec3,
    settings: &RenderSettings,
    view_mode: RenderViewMode,
) -> Vec3 {
    if view_mode != RenderViewMode::None {
        return if view_mode.encodes_as_srgb() {
            crate::postfx::linear_to_srgb(color)
        } else {
            color
        };
    }

    let mut final_color = color * settings.exposure;
    final_color =
        crate::postfx::apply_contrast_brightness(final_color, settings.contrast, settings.brightness);
    final_color = crate::postfx::apply_saturation(final_color, settings.saturation);
    final_color = crate::postfx::tonemap_reinhard_white(final_color, settings.max_white);

    if settings.linear_to_srgb {
        final_color = crate::postfx::linear_to_srgb(final_color);
    }

    final_color
}
