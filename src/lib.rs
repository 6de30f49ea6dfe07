#![deny(warnings)]

//! A software ray tracer core: BVH/TLAS acceleration structures, a path
//! integrator with megakernel and wavefront execution forms, and the
//! Frame Coordinator that drives them across frames.
//!
//! See each module's doc comment for the subsystem it owns.

pub mod accumulator;
pub mod arena;
pub mod bvh;
pub mod camera;
pub mod error;
pub mod geometry;
pub mod instance;
pub mod integrator;
pub mod material;
pub mod math;
pub mod postfx;
pub mod random;
pub mod ray;
pub mod renderer;
pub mod settings;
pub mod slotmap;
pub mod texture;
pub mod threadpool;
pub mod tlas;
pub mod traversal;

/// Things used by almost every caller of this crate.
pub mod prelude {
    pub use crate::{
        camera::Camera,
        error::{Error, Result},
        geometry::{GeometryStore, MeshHandle},
        material::Material,
        renderer::{InitParams, Renderer},
        settings::RenderSettings,
        texture::HdrEnvTexture,
    };
}
