/// Interactive viewer
///
/// Presentation-layer glue around the frame scheduler: window, surface,
/// and a slowly orbiting camera over a procedurally built scene. Render
/// settings load from `viewer.toml` next to the working directory when
/// present.

use std::sync::Arc;

use anyhow::{Context, Result};
use cgmath::Deg;
use winit::{
    dpi::LogicalSize,
    event::{Event, WindowEvent},
    event_loop::EventLoop,
    window::WindowBuilder,
};

use visor_engine::renderer::GpuContext;
use visor_engine::scene::{shapes, InstanceDesc, LodSource, Material, Scene, SceneBuffers};
use visor_engine::{Camera, FrameScheduler, RenderSettings};

fn main() -> Result<()> {
    env_logger::init();

    let event_loop = EventLoop::new().context("create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("visor viewer")
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .context("create window")?,
    );

    let (gpu, surface) = pollster::block_on(GpuContext::with_surface(window.clone()))?;

    let size = window.inner_size();
    let caps = surface.get_capabilities(&gpu.adapter);
    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: caps.formats[0],
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode: caps.alpha_modes[0],
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };

    let scene = build_demo_scene(&gpu.device)?;
    let mut scheduler =
        FrameScheduler::new(gpu.device.clone(), gpu.queue.clone(), &surface, config, scene)?;

    let settings = match std::fs::read_to_string("viewer.toml") {
        Ok(source) => RenderSettings::from_toml_str(&source)?,
        Err(_) => RenderSettings::default(),
    };

    let mut camera = Camera::new();
    camera.position = cgmath::Point3::new(0.0, 6.0, -30.0);
    camera.pitch = Deg(-8.0);

    event_loop
        .run(move |event, target| match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => target.exit(),
                WindowEvent::Resized(new_size) => {
                    scheduler.resize(&surface, new_size.width, new_size.height);
                }
                WindowEvent::RedrawRequested => {
                    camera.yaw = Deg(90.0 + scheduler.frame_index() as f32 * 0.05);
                    if let Err(e) = scheduler.render_frame(&surface, &camera, &settings) {
                        log::error!("render failed: {}", e);
                        target.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => window.request_redraw(),
            _ => {}
        })
        .context("event loop")?;

    Ok(())
}

/// Sphere field with a ground slab and a sprinkling of double-sided panels
/// on the post pass.
fn build_demo_scene(device: &wgpu::Device) -> Result<SceneBuffers> {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);

    let mut scene = Scene::new();

    let stone = scene.add_material(Material {
        albedo: [0.55, 0.55, 0.6, 1.0],
        ..Default::default()
    });
    let moss = scene.add_material(Material {
        albedo: [0.3, 0.55, 0.25, 1.0],
        ..Default::default()
    });
    let panel = scene.add_material(Material {
        albedo: [0.8, 0.6, 0.3, 1.0],
        emissive: [0.1, 0.05, 0.0],
        _pad: 0.0,
    });

    // sphere with a 3-level chain; errors approximate the chord deviation
    // of each tessellation
    let (mut vertices, fine) = shapes::uv_sphere(1.0, 32, 16);
    let (v1, mid) = shapes::uv_sphere(1.0, 16, 8);
    let base1 = vertices.len() as u32;
    vertices.extend_from_slice(&v1);
    let mid: Vec<u32> = mid.iter().map(|i| i + base1).collect();
    let (v2, coarse) = shapes::uv_sphere(1.0, 8, 4);
    let base2 = vertices.len() as u32;
    vertices.extend_from_slice(&v2);
    let coarse: Vec<u32> = coarse.iter().map(|i| i + base2).collect();

    let sphere = scene.add_mesh(
        &vertices,
        &[
            LodSource { indices: &fine, error: 0.005 },
            LodSource { indices: &mid, error: 0.02 },
            LodSource { indices: &coarse, error: 0.08 },
        ],
    )?;

    let (cube_vertices, cube_indices) = shapes::cube();
    let cube = scene.add_mesh(
        &cube_vertices,
        &[LodSource { indices: &cube_indices, error: 0.0 }],
    )?;

    // ground slab, top face at y = 0
    scene.add_instance(InstanceDesc {
        position: [0.0, -60.0, 0.0],
        scale: 120.0,
        mesh_index: cube,
        material_index: stone,
        ..Default::default()
    })?;

    for _ in 0..2048 {
        let x = rng.gen_range(-100.0..100.0);
        let z = rng.gen_range(-100.0..100.0);
        let s = rng.gen_range(0.4..2.0);
        scene.add_instance(InstanceDesc {
            position: [x, s, z],
            scale: s,
            mesh_index: sphere,
            material_index: if rng.gen_bool(0.5) { stone } else { moss },
            ..Default::default()
        })?;
    }

    for _ in 0..64 {
        let x = rng.gen_range(-80.0..80.0);
        let z = rng.gen_range(-80.0..80.0);
        scene.add_instance(InstanceDesc {
            position: [x, 1.5, z],
            scale: 1.5,
            mesh_index: cube,
            material_index: panel,
            post_pass: 1,
            ..Default::default()
        })?;
    }

    Ok(scene.finalize(device)?)
}
