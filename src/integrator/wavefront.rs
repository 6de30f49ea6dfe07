//! The wavefront integrator: a staged per-bounce pipeline over ray queues
//! (`clear` -> `generate` -> `{init_indirect_args, extend, shade}`, looped
//! once per bounce) rather than the megakernel's one-thread-per-pixel full
//! bounce chain. Shares [`super::shade_hit`] and [`super::apply_post_processing`]
//! with [`super::megakernel`] so the two execution shapes can never diverge
//! in their material response or tonemap.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use glam::Vec4;

use crate::accumulator::Accumulator;
use crate::math::Vec3;
use crate::postfx;
use crate::random::Rng;
use crate::ray::{HitResult, Ray};
use crate::settings::RenderViewMode;
use crate::threadpool::ThreadPool;

use super::{apply_post_processing, shade_hit, Scene, ShadeOutcome};

/// GPU thread-group size a hardware dispatch would use for `Extend`/`Shade`.
/// Kept here so [`init_indirect_args`] computes a thread-group count the way
/// an indirect GPU dispatch would, even though the CPU scheduler below
/// dispatches one pool job per ray rather than per warp of 64.
const WAVEFRONT_GROUP_SIZE: u32 = 64;

/// How many rays are live going into a bounce's `Extend`/`Shade` pass.
#[derive(Clone, Copy, Debug, Default)]
struct RayCountHeader {
    count: u32,
}

/// The thread-group count an "Init indirect arguments" pass writes from a
/// [`RayCountHeader`] ahead of the indirect `Extend`/`Shade` dispatch, so a
/// GPU dispatches exactly enough groups to cover the live rays instead of
/// the full `width*height` grid every bounce. The CPU scheduler below could
/// just read `queue.len()` directly; this is kept anyway so the stage
/// boundary matches the contract the wavefront scheduler is named for.
#[derive(Clone, Copy, Debug, Default)]
struct IndirectDispatchArgs {
    thread_group_count: u32,
}

fn init_indirect_args(ray_count: RayCountHeader) -> IndirectDispatchArgs {
    IndirectDispatchArgs {
        thread_group_count: ray_count.count.div_ceil(WAVEFRONT_GROUP_SIZE),
    }
}

/// One live ray and the pixel it belongs to, queued for a bounce's
/// `Extend`/`Shade` pass. Carries the ray alongside the pixel index rather
/// than re-deriving it from a separate ray buffer.
#[derive(Clone, Copy)]
struct QueueEntry {
    pixel_index: u32,
    ray: Ray,
}

impl Default for QueueEntry {
    fn default() -> Self {
        Self {
            pixel_index: 0,
            ray: Ray::new(Vec3::ZERO, Vec3::Z),
        }
    }
}

/// Per-pixel state carried across the whole frame's bounce chain — the
/// wavefront scheduler's equivalent of the stack locals a megakernel path
/// keeps resident in one thread for its entire walk.
struct PathState {
    throughput: Vec3,
    energy: Vec3,
    rng: Rng,
    ray_depth: u32,
    survived_rr: bool,
}

/// Raw write target for the `Extend` stage. Asserted `Send + Sync`: each
/// job owns a unique `job_index` into a preallocated, disjoint slot.
struct ExtendTargets {
    hits: *mut (HitResult, u32),
}
unsafe impl Send for ExtendTargets {}
unsafe impl Sync for ExtendTargets {}

/// Raw write targets for the `Shade` stage. `states` is indexed by pixel,
/// and a bounce's queue holds at most one entry per pixel, so concurrent
/// jobs never touch the same `PathState`. `next_buffer` is an append-only
/// compaction target: each job claims its own slot via `next_count`'s
/// atomic fetch-add before writing, the same pattern a GPU dispatch would
/// use for an `InterlockedAdd`-style append into the next bounce's ray
/// count.
struct ShadeTargets {
    states: *mut PathState,
    next_buffer: *mut QueueEntry,
}
unsafe impl Send for ShadeTargets {}
unsafe impl Sync for ShadeTargets {}

/// Renders one frame with the wavefront integrator into `surface`
/// (`width * height` packed RGBA8 pixels), accumulating into `accumulator`.
pub fn render(
    pool: &ThreadPool,
    scene: &Scene,
    accumulator: &mut Accumulator,
    surface: &mut [u32],
    frame_index: u32,
) {
    let width = accumulator.width();
    let height = accumulator.height();
    debug_assert_eq!(surface.len(), (width * height) as usize);

    accumulator.begin_frame();
    let accumulated_frame_count = accumulator.accumulated_frame_count();
    let pixel_count = (width * height) as usize;
    let view_mode = scene.settings.render_view_mode;

    // --- Clear ---
    let mut states: Vec<PathState> = (0..pixel_count)
        .map(|idx| {
            let x = idx as u32 % width;
            let y = idx as u32 / width;
            PathState {
                throughput: Vec3::ONE,
                energy: Vec3::ZERO,
                rng: Rng::from_pixel(frame_index, x, y),
                ray_depth: 0,
                survived_rr: true,
            }
        })
        .collect();

    // --- Generate (bounce 0 only) ---
    let mut queue: Arc<Vec<QueueEntry>> = Arc::new(
        (0..pixel_count)
            .map(|idx| {
                let x = idx as u32 % width;
                let y = idx as u32 / width;
                QueueEntry {
                    pixel_index: idx as u32,
                    ray: scene.camera.construct_ray(x, y, width, height),
                }
            })
            .collect(),
    );

    // `scene` outlives every dispatch below: `wait_all` blocks before this
    // function returns, so the raw pointer round-trip through the 'static
    // job closures is sound, same as `megakernel::render`'s `scene_ptr`.
    let scene_ptr = scene as *const Scene as usize;

    for _bounce in 0..=scene.settings.ray_max_recursion {
        if queue.is_empty() {
            break;
        }

        let ray_count_header = RayCountHeader { count: queue.len() as u32 };
        let _dispatch_args = init_indirect_args(ray_count_header);

        // --- Extend ---
        let mut hits = vec![(HitResult::default(), 0u32); queue.len()];
        let extend_targets = Arc::new(ExtendTargets { hits: hits.as_mut_ptr() });
        let extend_queue = queue.clone();

        pool.dispatch(queue.len() as u32, WAVEFRONT_GROUP_SIZE, move |args| {
            let scene: &Scene = unsafe { &*(scene_ptr as *const Scene) };
            let entry = extend_queue[args.job_index as usize];
            let mut ray = entry.ray;
            let hit = scene.intersector.trace_ray(&mut ray);
            unsafe {
                *extend_targets.hits.add(args.job_index as usize) = (hit, ray.bvh_depth);
            }
        });
        pool.wait_all();

        // --- Shade ---
        let mut next_buffer = vec![QueueEntry::default(); pixel_count];
        let next_count = Arc::new(AtomicU32::new(0));
        let shade_targets = Arc::new(ShadeTargets {
            states: states.as_mut_ptr(),
            next_buffer: next_buffer.as_mut_ptr(),
        });
        let shade_queue = queue.clone();
        let shade_hits = Arc::new(hits);
        let shade_next_count = next_count.clone();

        pool.dispatch(shade_queue.len() as u32, WAVEFRONT_GROUP_SIZE, move |args| {
            let scene: &Scene = unsafe { &*(scene_ptr as *const Scene) };
            let i = args.job_index as usize;
            let entry = shade_queue[i];
            let (hit, bvh_depth) = shade_hits[i];
            let state = unsafe { &mut *shade_targets.states.add(entry.pixel_index as usize) };

            if view_mode == RenderViewMode::AccelerationStructureDepth {
                state.energy =
                    Vec3::new(0.0, 1.0, 0.0).lerp(Vec3::new(1.0, 0.0, 0.0), bvh_depth as f32 / 50.0);
                return;
            }

            if !hit.has_hit_geometry() {
                state.energy += scene.settings.hdr_env_intensity
                    * scene.hdr_env.sample(entry.ray.dir)
                    * state.throughput;
                return;
            }

            let hit_pos = hit.pos;
            let hit_normal = hit.normal;
            let hit_material = scene.materials[hit.instance_idx as usize];

            match view_mode {
                RenderViewMode::HitAlbedo => {
                    state.energy = hit_material.albedo;
                    return;
                }
                RenderViewMode::HitNormal => {
                    state.energy = hit_normal.abs();
                    return;
                }
                RenderViewMode::HitBarycentrics => {
                    state.energy = hit.bary;
                    return;
                }
                RenderViewMode::HitSpecRefract => {
                    state.energy = Vec3::new(hit_material.specular, hit_material.refractivity, 0.0);
                    return;
                }
                RenderViewMode::HitAbsorption => {
                    state.energy = hit_material.absorption;
                    return;
                }
                RenderViewMode::HitEmissive => {
                    state.energy = hit_material.emissive_color
                        * hit_material.emissive_intensity
                        * hit_material.emissive as u32 as f32;
                    return;
                }
                RenderViewMode::Depth => {
                    state.energy = Vec3::splat(hit.t * 0.01);
                    return;
                }
                _ => {}
            }

            if hit_material.emissive {
                state.energy +=
                    hit_material.emissive_color * hit_material.emissive_intensity * state.throughput;
                return;
            }

            let mut incoming_ray = entry.ray;
            incoming_ray.t = hit.t;

            match shade_hit(
                incoming_ray,
                hit_pos,
                hit_normal,
                &hit_material,
                &mut state.throughput,
                &mut state.rng,
                &scene.settings,
                state.ray_depth,
            ) {
                ShadeOutcome::Terminated => {
                    state.survived_rr = false;
                }
                ShadeOutcome::Continued(next_ray) => {
                    state.ray_depth += 1;
                    let slot = shade_next_count.fetch_add(1, Ordering::AcqRel) as usize;
                    unsafe {
                        *shade_targets.next_buffer.add(slot) = QueueEntry {
                            pixel_index: entry.pixel_index,
                            ray: next_ray,
                        };
                    }
                }
            }
        });
        pool.wait_all();

        let live_count = next_count.load(Ordering::Acquire) as usize;
        next_buffer.truncate(live_count);
        queue = Arc::new(next_buffer);
    }

    // These two debug views depend on the *final* per-pixel bounce count
    // and RR outcome, so (exactly like `trace_path`) they're resolved once
    // here rather than inline per-bounce.
    match view_mode {
        RenderViewMode::RayRecursionDepth => {
            for state in &mut states {
                state.energy = Vec3::new(0.0, 1.0, 0.0).lerp(
                    Vec3::new(1.0, 0.0, 0.0),
                    state.ray_depth as f32 / scene.settings.ray_max_recursion as f32,
                );
            }
        }
        RenderViewMode::RussianRouletteKillDepth => {
            for state in &mut states {
                let weight = ((state.ray_depth as f32 / scene.settings.ray_max_recursion as f32)
                    - state.survived_rr as u32 as f32)
                    .clamp(0.0, 1.0);
                state.energy = Vec3::new(0.0, 1.0, 0.0).lerp(Vec3::new(1.0, 0.0, 0.0), weight);
            }
        }
        _ => {}
    }

    // --- Final accumulate / resolve / post-process ---
    // Single-threaded: unlike `Extend`/`Shade`, there is no per-job partial
    // result to keep disjoint, so this just walks pixels directly through
    // the same accumulator/post-fx path `megakernel::render` uses.
    let inv_pixel_count = 1.0 / pixel_count as f64;
    let mut partial_energy_total = 0.0f64;
    let pixels_ptr = accumulator.pixels_mut_ptr();

    for idx in 0..pixel_count {
        let x = idx as u32 % width;
        let y = idx as u32 / width;
        let path_energy = Vec4::new(
            states[idx].energy.x,
            states[idx].energy.y,
            states[idx].energy.z,
            1.0,
        );

        partial_energy_total += (path_energy.x + path_energy.y + path_energy.z) as f64 * inv_pixel_count;

        let pixel_idx = accumulator.pixel_index(x, y);
        let resolved = unsafe {
            let slot = &mut *pixels_ptr.add(pixel_idx);
            *slot += path_energy;
            if accumulated_frame_count == 0 {
                *slot
            } else {
                *slot / accumulated_frame_count as f32
            }
        };

        let final_color = apply_post_processing(resolved.truncate(), &scene.settings, view_mode);
        surface[idx] = postfx::vec4_to_u32(crate::math::vec4_from_vec3(final_color, 1.0));
    }

    accumulator.add_energy_sample(partial_energy_total);
}
