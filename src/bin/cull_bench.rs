/// GPU culling test and benchmark
///
/// Headless exercise of the cull -> finalize -> cluster-cull chain:
/// verifies the GPU survivor counts against the CPU mirrors of the same
/// tests, demonstrates the early/late temporal split, and reports
/// throughput.

use cgmath::{Deg, Point3, Vector3};
use rand::{Rng, SeedableRng};
use std::time::Instant;

use visor_engine::constants::culling::TASK_GROUP_SIZE;
use visor_engine::renderer::culling::cull_data::view_space_sphere;
use visor_engine::renderer::culling::{frustum_visible, CullData, CullDispatcher, CullPhase, VisibilityState};
use visor_engine::renderer::pyramid::DepthPyramid;
use visor_engine::renderer::{GpuContext, RenderSettings, ShaderPrograms};
use visor_engine::scene::{shapes, InstanceDesc, LodSource, Scene, SceneBuffers};
use visor_engine::Camera;

const TEST_INSTANCES: usize = 10_000;
const WORLD_SIZE: f32 = 400.0;
const ITERATIONS: u32 = 100;

fn main() {
    env_logger::init();

    println!("GPU Culling Test");
    println!("================\n");

    let gpu = pollster::block_on(GpuContext::headless()).expect("Failed to create GPU context");

    let (scene, meshlets_per_instance) = build_test_scene(&gpu.device);
    println!(
        "{} instances, {} meshlets each\n",
        TEST_INSTANCES, meshlets_per_instance
    );

    let programs = ShaderPrograms::compile(&gpu.device, wgpu::TextureFormat::Bgra8Unorm);
    let mut visibility =
        VisibilityState::new(&gpu.device, scene.draw_count(), scene.visibility_slots);
    let pyramid = DepthPyramid::new(&gpu.device, 1920, 1080);
    let dispatcher = CullDispatcher::new(
        &gpu.device,
        &programs,
        &scene,
        &visibility,
        pyramid.full_view(),
    )
    .expect("Failed to create dispatcher");

    let mut camera = Camera::new();
    camera.position = Point3::new(0.0, 40.0, -WORLD_SIZE / 2.0);
    camera.pitch = Deg(-5.0);
    let settings = RenderSettings {
        draw_distance: 500.0,
        ..Default::default()
    };

    let cull_data = CullData::new(
        &camera,
        &settings,
        1920,
        1080,
        pyramid.width(),
        pyramid.height(),
        scene.draw_count(),
    );
    dispatcher.update(&gpu.queue, &cull_data);

    // one-shot lazy clear of the persistent bitmasks
    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    visibility.ensure_cleared(&mut encoder);
    gpu.queue.submit(Some(encoder.finish()));

    let mut failures = 0;

    // first frame, early phase: no visibility history, nothing may be emitted
    let (tasks, meshlets) = run_phase(&gpu, &dispatcher, &programs, &visibility, &scene, CullPhase::EARLY);
    println!("early (cold):  {:6} task commands, {:6} meshlet draws", tasks, meshlets);
    failures += check("cold early emits nothing", tasks == 0 && meshlets == 0);

    // late phase: authoritative; counts must match the CPU frustum mirror
    // (a couple of boundary spheres may round differently on the GPU)
    let (tasks, meshlets) = run_phase(&gpu, &dispatcher, &programs, &visibility, &scene, CullPhase::LATE);
    let groups_per_draw = meshlets_per_instance.div_ceil(TASK_GROUP_SIZE);
    let expected = expected_task_commands(&scene, &camera, &cull_data, meshlets_per_instance);
    println!("late:          {:6} task commands, {:6} meshlet draws (CPU expects {} commands)", tasks, meshlets, expected);
    let drift = (tasks as i64 - expected as i64).unsigned_abs();
    failures += check(
        "late matches CPU frustum mirror",
        drift <= 2 * groups_per_draw as u64,
    );
    failures += check(
        "meshlet draws bounded by expansion",
        meshlets <= tasks * TASK_GROUP_SIZE,
    );

    // second frame, early phase: replays the late pass's visible set
    let (tasks_warm, meshlets_warm) =
        run_phase(&gpu, &dispatcher, &programs, &visibility, &scene, CullPhase::EARLY);
    println!("early (warm):  {:6} task commands, {:6} meshlet draws", tasks_warm, meshlets_warm);
    failures += check("warm early replays visible set", tasks_warm == tasks);

    // second frame, late phase: still-visible clusters were already drawn
    // early and only need their bits refreshed
    let (_, meshlets_late2) =
        run_phase(&gpu, &dispatcher, &programs, &visibility, &scene, CullPhase::LATE);
    println!("late (warm):   {:6} meshlet draws (deduped against early)\n", meshlets_late2);
    failures += check("warm late dedups early work", meshlets_late2 <= meshlets);

    // throughput
    let start = Instant::now();
    for _ in 0..ITERATIONS {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        dispatcher
            .encode(&mut encoder, &programs, &visibility, scene.draw_count(), CullPhase::LATE)
            .expect("encode");
        gpu.queue.submit(Some(encoder.finish()));
    }
    gpu.device.poll(wgpu::Maintain::Wait);
    let per_frame = start.elapsed().as_secs_f64() * 1000.0 / ITERATIONS as f64;
    println!("cull time: {:.3} ms/frame ({:.0} instances/ms)", per_frame, TEST_INSTANCES as f64 / per_frame);

    if failures > 0 {
        println!("\n{} check(s) FAILED", failures);
        std::process::exit(1);
    }
    println!("\nall checks passed");
}

fn check(name: &str, ok: bool) -> u32 {
    println!("  [{}] {}", if ok { "ok" } else { "FAIL" }, name);
    u32::from(!ok)
}

fn build_test_scene(device: &wgpu::Device) -> (SceneBuffers, u32) {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut scene = Scene::new();

    let (vertices, indices) = shapes::uv_sphere(1.0, 16, 8);
    let mesh = scene
        .add_mesh(&vertices, &[LodSource { indices: &indices, error: 0.0 }])
        .expect("mesh");

    for _ in 0..TEST_INSTANCES {
        scene
            .add_instance(InstanceDesc {
                position: [
                    rng.gen_range(-WORLD_SIZE..WORLD_SIZE),
                    rng.gen_range(0.0..40.0),
                    rng.gen_range(-WORLD_SIZE..WORLD_SIZE),
                ],
                scale: rng.gen_range(0.5..2.0),
                mesh_index: mesh,
                ..Default::default()
            })
            .expect("instance");
    }

    let buffers = scene.finalize(device).expect("finalize");
    let meshlets = buffers.meshes[0].lods[0].meshlet_count;
    (buffers, meshlets)
}

/// CPU mirror: every frustum-surviving instance emits one command per
/// 64-meshlet group (the zeroed pyramid occludes nothing).
fn expected_task_commands(
    scene: &SceneBuffers,
    camera: &Camera,
    cull_data: &CullData,
    meshlets_per_instance: u32,
) -> u32 {
    let view = camera.view_matrix();
    let groups_per_draw = meshlets_per_instance.div_ceil(TASK_GROUP_SIZE);

    scene
        .draws
        .iter()
        .filter(|draw| {
            let mesh = &scene.meshes[draw.mesh_index as usize];
            let (center, radius) = view_space_sphere(
                &view,
                Vector3::from(draw.position) + Vector3::from(mesh.center) * draw.scale,
                mesh.radius,
                draw.scale,
            );
            frustum_visible(cull_data, center, radius)
        })
        .count() as u32
        * groups_per_draw
}

fn run_phase(
    gpu: &GpuContext,
    dispatcher: &CullDispatcher,
    programs: &ShaderPrograms,
    visibility: &VisibilityState,
    scene: &SceneBuffers,
    phase: CullPhase,
) -> (u32, u32) {
    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    dispatcher
        .encode(&mut encoder, programs, visibility, scene.draw_count(), phase)
        .expect("encode");
    gpu.queue.submit(Some(encoder.finish()));
    gpu.device.poll(wgpu::Maintain::Wait);

    let task = pollster::block_on(gpu.read_buffer(visibility.task_counter(), 16)).expect("readback");
    let meshlet =
        pollster::block_on(gpu.read_buffer(visibility.meshlet_counter(), 20)).expect("readback");

    let task_count: u32 = bytemuck::cast_slice::<u8, u32>(&task)[0];
    let meshlet_count: u32 = bytemuck::cast_slice::<u8, u32>(&meshlet)[0];
    (task_count, meshlet_count)
}
