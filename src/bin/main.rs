//! Command-line entry point: renders a small demo scene for `--spp` frames
//! and reports the resulting mean energy, exercising the Frame
//! Coordinator the way a headless run-loop replacement would. Defaults to
//! a 1920x1080 frame.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use wavefront_rt::camera::Camera;
use wavefront_rt::geometry::Vertex;
use wavefront_rt::material::Material;
use wavefront_rt::math::Vec3;
use wavefront_rt::renderer::{InitParams, Renderer};
use wavefront_rt::texture::HdrEnvTexture;

/// Software BVH/TLAS path tracer core: megakernel and wavefront
/// integrator forms over a CPU-built acceleration structure.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Render target width in pixels.
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Render target height in pixels.
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Number of frames (samples per pixel) to accumulate before exiting.
    #[arg(long, default_value_t = 32)]
    spp: u32,

    /// Use the staged wavefront integrator instead of the megakernel form.
    #[arg(long)]
    wavefront: bool,
}

fn build_demo_scene(renderer: &mut Renderer) -> anyhow::Result<()> {
    let floor_vertices = vec![
        Vertex { position: Vec3::new(-8.0, -2.0, -8.0), normal: Vec3::Y },
        Vertex { position: Vec3::new(8.0, -2.0, -8.0), normal: Vec3::Y },
        Vertex { position: Vec3::new(8.0, -2.0, 8.0), normal: Vec3::Y },
        Vertex { position: Vec3::new(-8.0, -2.0, 8.0), normal: Vec3::Y },
    ];
    let floor_indices = vec![0, 1, 2, 0, 2, 3];

    let sphere_proxy_vertices = vec![
        Vertex { position: Vec3::new(-1.5, -1.0, 0.0), normal: Vec3::Z },
        Vertex { position: Vec3::new(1.5, -1.0, 0.0), normal: Vec3::Z },
        Vertex { position: Vec3::new(0.0, 1.8, 0.0), normal: Vec3::Z },
    ];
    let sphere_proxy_indices = vec![0, 1, 2];

    let floor_mesh = renderer
        .geometry_mut()
        .create_mesh("floor", &floor_vertices, &floor_indices)
        .context("building floor mesh")?;
    let prop_mesh = renderer
        .geometry_mut()
        .create_mesh("prop", &sphere_proxy_vertices, &sphere_proxy_indices)
        .context("building prop mesh")?;

    let camera = Camera::new(Vec3::new(0.0, 1.0, -10.0), Vec3::new(0.0, 0.0, 0.0), Vec3::Y, 50.0);
    let hdr_env = HdrEnvTexture::solid(glam::Vec4::new(0.4, 0.55, 0.8, 1.0));

    renderer.begin_frame();
    renderer.begin_scene(camera, hdr_env);

    renderer
        .submit_instance(
            floor_mesh,
            glam::Mat4::IDENTITY,
            Material::diffuse(Vec3::new(0.6, 0.6, 0.6)),
        )
        .context("submitting floor instance")?;
    renderer
        .submit_instance(
            prop_mesh,
            glam::Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0)),
            Material::specular(Vec3::new(0.9, 0.2, 0.2), 0.6),
        )
        .context("submitting prop instance")?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut renderer = Renderer::init(InitParams {
        render_width: args.width,
        render_height: args.height,
        backbuffer_count: 2,
        vsync: false,
    })
    .context("initializing renderer")?;

    build_demo_scene(&mut renderer)?;

    for frame in 0..args.spp {
        renderer.render(args.wavefront).context("rendering frame")?;
        info!(frame, mean_energy = renderer.mean_energy(), "frame complete");
        renderer.end_frame();
    }

    info!(
        frames = args.spp,
        mean_energy = renderer.mean_energy(),
        "render complete"
    );

    renderer.exit();
    Ok(())
}
