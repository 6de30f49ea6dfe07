//! The Frame Coordinator: an explicit state record rather than an ambient
//! global. Everything downstream — geometry store, per-frame instance
//! set, frame arena, thread pool, accumulator, render settings — is
//! reached through this struct.
//!
//! `init`/`exit` bookend the renderer's lifetime; `begin_scene`/`render`/
//! `end_scene` and `begin_frame`/`end_frame` are modeled as distinct
//! methods even though a simple caller invokes them back-to-back once per
//! visible frame.

use tracing::{info, warn};

use crate::accumulator::Accumulator;
use crate::arena::{FrameArena, Marker};
use crate::camera::Camera;
use crate::error::{CapacityExceeded, Error, Fatal, ResourceNotFound, Result};
use crate::geometry::{GeometryStore, MeshHandle};
use crate::instance::BvhInstance;
use crate::integrator::{megakernel, wavefront, Scene};
use crate::material::Material;
use crate::settings::RenderSettings;
use crate::texture::HdrEnvTexture;
use crate::threadpool::ThreadPool;
use crate::tlas::{Tlas, MAX_INSTANCES};
use crate::traversal::SoftwareIntersector;

/// Parameters for [`Renderer::init`]. Defaults to a 1920x1080 window.
pub struct InitParams {
    pub render_width: u32,
    pub render_height: u32,
    pub backbuffer_count: u32,
    pub vsync: bool,
}

impl Default for InitParams {
    fn default() -> Self {
        Self {
            render_width: 1920,
            render_height: 1080,
            backbuffer_count: 2,
            vsync: false,
        }
    }
}

/// Owns every long-lived render resource and orchestrates one frame's
/// submission and resolution.
pub struct Renderer {
    width: u32,
    height: u32,
    backbuffer_count: u32,
    vsync: bool,

    geometry: GeometryStore,
    instances: Vec<BvhInstance>,
    materials: Vec<Material>,
    tlas: Tlas,

    arena: FrameArena,
    frame_marker: Marker,
    pool: ThreadPool,
    accumulator: Accumulator,
    surface: Vec<u32>,

    settings: RenderSettings,
    camera: Option<Camera>,
    hdr_env: Option<HdrEnvTexture>,

    frame_index: u32,
}

impl Renderer {
    /// Reserves the frame arena and worker pool and builds an empty
    /// renderer ready for `begin_scene`.
    pub fn init(params: InitParams) -> Result<Self> {
        info!(
            width = params.render_width,
            height = params.render_height,
            "renderer init"
        );

        let arena = FrameArena::new()?;
        let frame_marker = arena.mark();
        let thread_count = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4);

        let pixel_count = (params.render_width * params.render_height) as usize;

        Ok(Self {
            width: params.render_width,
            height: params.render_height,
            backbuffer_count: params.backbuffer_count,
            vsync: params.vsync,
            geometry: GeometryStore::new(),
            instances: Vec::new(),
            materials: Vec::new(),
            tlas: Tlas::build(&[]),
            arena,
            frame_marker,
            pool: ThreadPool::new(thread_count),
            accumulator: Accumulator::new(params.render_width, params.render_height),
            surface: vec![0u32; pixel_count],
            settings: RenderSettings::default(),
            camera: None,
            hdr_env: None,
            frame_index: 0,
        })
    }

    /// Tears down the renderer. `Drop` would do the same work, but the
    /// lifecycle is spelled out explicitly so `init`/`exit` bracket the
    /// renderer's life the same way `begin_frame`/`end_frame` bracket a
    /// frame.
    pub fn exit(self) {
        info!(frames_rendered = self.frame_index, "renderer exit");
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn backbuffer_count(&self) -> u32 {
        self.backbuffer_count
    }

    pub fn vsync(&self) -> bool {
        self.vsync
    }

    pub fn geometry_mut(&mut self) -> &mut GeometryStore {
        &mut self.geometry
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.settings
    }

    /// Renderer-health metric surfaced to the caller, e.g. for an on-screen
    /// HUD; delegates to [`Accumulator::mean_energy`].
    pub fn mean_energy(&self) -> f64 {
        self.accumulator.mean_energy()
    }

    /// The resolved, post-processed RGBA8 surface from the most recent
    /// `render` call.
    pub fn surface(&self) -> &[u32] {
        &self.surface
    }

    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Rewinds the per-frame arena and clears the per-frame instance set.
    /// Called once per visible frame, before any `submit_instance` calls.
    pub fn begin_frame(&mut self) {
        self.arena.free_to(self.frame_marker);
        self.instances.clear();
        self.materials.clear();
    }

    /// Advances the frame index driving per-pixel RNG seeding. Called once
    /// per visible frame, after `render`.
    pub fn end_frame(&mut self) {
        self.frame_index = self.frame_index.wrapping_add(1);
    }

    /// Sets the active camera and environment map for the scene about to
    /// be rendered. A camera or environment change implies stale
    /// accumulated history, so the accumulator resets here.
    pub fn begin_scene(&mut self, camera: Camera, hdr_env: HdrEnvTexture) {
        self.camera = Some(camera);
        self.hdr_env = Some(hdr_env);
        self.accumulator.reset();
    }

    /// Ends the scene submitted via `begin_scene`. Present for lifecycle
    /// symmetry; the renderer has no per-scene state that outlives the
    /// frame it was submitted within.
    pub fn end_scene(&mut self) {}

    /// Appends an instance to the current frame's submission set, capped at
    /// [`MAX_INSTANCES`]. Exceeding the cap drops the submission and
    /// returns [`CapacityExceeded::InstanceCount`] for the caller to log —
    /// the frame keeps rendering with what was already submitted, per the
    /// frame-local recovery policy for capacity overruns.
    pub fn submit_instance(
        &mut self,
        mesh: MeshHandle,
        transform: glam::Mat4,
        material: Material,
    ) -> Result<()> {
        if self.instances.len() >= MAX_INSTANCES {
            warn!(attempted = self.instances.len() + 1, max = MAX_INSTANCES, "instance cap exceeded, dropping submission");
            return Err(Error::from(CapacityExceeded::InstanceCount {
                attempted: self.instances.len() as u32 + 1,
                max: MAX_INSTANCES as u32,
            }));
        }

        if self.geometry.lookup(mesh).is_none() {
            warn!(?mesh, "instance submitted against an unregistered or stale mesh handle");
            return Err(Error::from(ResourceNotFound::MeshHandle(mesh)));
        }

        let instance = BvhInstance::new(mesh, transform, &self.geometry);
        self.instances.push(instance);
        self.materials.push(material);
        Ok(())
    }

    /// Rebuilds the TLAS over the current instance set, dispatches the
    /// selected integrator form across the thread pool, and resolves the
    /// result into `surface`. Requires a prior `begin_scene` call.
    pub fn render(&mut self, use_wavefront: bool) -> Result<()> {
        let camera = self
            .camera
            .as_ref()
            .ok_or_else(|| Error::from(Fatal::InvariantViolation("render called before begin_scene")))?;
        let hdr_env = self
            .hdr_env
            .as_ref()
            .ok_or_else(|| Error::from(Fatal::InvariantViolation("render called before begin_scene")))?;

        self.tlas = Tlas::build(&self.instances);
        let intersector = SoftwareIntersector::new(&self.tlas, &self.instances, &self.geometry);

        let scene = Scene {
            camera,
            intersector: &intersector,
            materials: &self.materials,
            hdr_env,
            settings: self.settings,
        };

        if use_wavefront {
            wavefront::render(
                &self.pool,
                &scene,
                &mut self.accumulator,
                &mut self.surface,
                self.frame_index,
            );
        } else {
            megakernel::render(
                &self.pool,
                &scene,
                &mut self.accumulator,
                &mut self.surface,
                self.frame_index,
            );
        }

        Ok(())
    }
}
