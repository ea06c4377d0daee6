//! End-to-end GPU validation of the cull -> finalize -> cluster chain.
//!
//! These tests need a real adapter; on machines without one they log and
//! return early instead of failing.

use cgmath::{Deg, Point3};

use visor_engine::constants::culling::TASK_GROUP_SIZE;
use visor_engine::renderer::culling::{CullData, CullDispatcher, CullPhase, VisibilityState};
use visor_engine::renderer::pyramid::DepthPyramid;
use visor_engine::renderer::{GpuContext, RenderSettings, ShaderPrograms};
use visor_engine::scene::{shapes, InstanceDesc, LodSource, Scene, SceneBuffers};
use visor_engine::Camera;

struct CullHarness {
    gpu: GpuContext,
    programs: ShaderPrograms,
    visibility: VisibilityState,
    pyramid: DepthPyramid,
    dispatcher: CullDispatcher,
    scene: SceneBuffers,
}

impl CullHarness {
    fn new(scene_builder: impl FnOnce(&mut Scene)) -> Option<Self> {
        let gpu = match pollster::block_on(GpuContext::headless()) {
            Ok(gpu) => gpu,
            Err(e) => {
                eprintln!("skipping GPU test: {}", e);
                return None;
            }
        };

        let mut scene = Scene::new();
        scene_builder(&mut scene);
        let scene = scene.finalize(&gpu.device).expect("scene should finalize");

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
        .expect("dispatcher");

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        visibility.ensure_cleared(&mut encoder);
        gpu.queue.submit(Some(encoder.finish()));

        Some(Self {
            gpu,
            programs,
            visibility,
            pyramid,
            dispatcher,
            scene,
        })
    }

    fn run(&self, camera: &Camera, settings: &RenderSettings, phase: CullPhase) -> (u32, u32) {
        let cull_data = CullData::new(
            camera,
            settings,
            1920,
            1080,
            self.pyramid.width(),
            self.pyramid.height(),
            self.scene.draw_count(),
        );
        assert!(!cull_data.is_degenerate());
        self.dispatcher.update(&self.gpu.queue, &cull_data);

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        self.dispatcher
            .encode(
                &mut encoder,
                &self.programs,
                &self.visibility,
                self.scene.draw_count(),
                phase,
            )
            .expect("encode");
        self.gpu.queue.submit(Some(encoder.finish()));
        self.gpu.device.poll(wgpu::Maintain::Wait);

        let task =
            pollster::block_on(self.gpu.read_buffer(self.visibility.task_counter(), 16)).unwrap();
        let meshlet =
            pollster::block_on(self.gpu.read_buffer(self.visibility.meshlet_counter(), 20))
                .unwrap();
        (
            bytemuck::cast_slice::<u8, u32>(&task)[0],
            bytemuck::cast_slice::<u8, u32>(&meshlet)[0],
        )
    }
}

fn single_sphere_at(position: [f32; 3]) -> impl FnOnce(&mut Scene) {
    move |scene: &mut Scene| {
        let (vertices, indices) = shapes::uv_sphere(1.0, 16, 8);
        let mesh = scene
            .add_mesh(&vertices, &[LodSource { indices: &indices, error: 0.0 }])
            .unwrap();
        scene
            .add_instance(InstanceDesc {
                position,
                mesh_index: mesh,
                ..Default::default()
            })
            .unwrap();
    }
}

fn forward_camera() -> Camera {
    let mut camera = Camera::new();
    camera.position = Point3::new(0.0, 0.0, 0.0);
    camera.yaw = Deg(90.0);
    camera.pitch = Deg(0.0);
    camera
}

#[test]
fn instance_beyond_draw_distance_emits_nothing() {
    // +Z is straight ahead of the camera; place the sphere past zfar
    let Some(harness) = CullHarness::new(single_sphere_at([0.0, 0.0, 400.0])) else {
        return;
    };
    let settings = RenderSettings {
        draw_distance: 200.0,
        ..Default::default()
    };
    let camera = forward_camera();

    let (tasks, meshlets) = harness.run(&camera, &settings, CullPhase::LATE);
    assert_eq!(tasks, 0, "out-of-range instance must not emit commands");
    assert_eq!(meshlets, 0);

    let (tasks, meshlets) = harness.run(&camera, &settings, CullPhase::EARLY);
    assert_eq!(tasks, 0);
    assert_eq!(meshlets, 0);
}

#[test]
fn instance_behind_camera_emits_nothing() {
    let Some(harness) = CullHarness::new(single_sphere_at([0.0, 0.0, -50.0])) else {
        return;
    };
    let (tasks, meshlets) = harness.run(&forward_camera(), &RenderSettings::default(), CullPhase::LATE);
    assert_eq!(tasks, 0);
    assert_eq!(meshlets, 0);
}

#[test]
fn visible_instance_flows_through_both_phases() {
    let Some(harness) = CullHarness::new(single_sphere_at([0.0, 0.0, 20.0])) else {
        return;
    };
    let camera = forward_camera();
    let settings = RenderSettings::default();

    // frame 1: cold early emits nothing, late discovers the instance
    let (tasks, meshlets) = harness.run(&camera, &settings, CullPhase::EARLY);
    assert_eq!((tasks, meshlets), (0, 0));

    let (tasks, meshlets) = harness.run(&camera, &settings, CullPhase::LATE);
    let expected_groups = harness.scene.meshes[0].lods[0]
        .meshlet_count
        .div_ceil(TASK_GROUP_SIZE);
    assert_eq!(tasks, expected_groups);
    assert!(meshlets > 0, "a facing sphere must keep some clusters");
    assert!(meshlets <= harness.scene.meshes[0].lods[0].meshlet_count);

    // frame 2: the early phase replays last frame's visible set
    let (tasks, clusters) = harness.run(&camera, &settings, CullPhase::EARLY);
    assert_eq!(tasks, expected_groups);

    // idempotence: identical CullData and unchanged pyramid/visibility state
    // reproduce the same survivor set
    let (tasks_again, clusters_again) = harness.run(&camera, &settings, CullPhase::EARLY);
    assert_eq!((tasks_again, clusters_again), (tasks, clusters));
}

#[test]
fn culling_disabled_keeps_out_of_frustum_instances() {
    let Some(harness) = CullHarness::new(single_sphere_at([0.0, 0.0, -50.0])) else {
        return;
    };
    let settings = RenderSettings {
        culling_enabled: false,
        occlusion_enabled: false,
        cluster_backface_enabled: false,
        cluster_occlusion_enabled: false,
        ..Default::default()
    };
    let (tasks, _) = harness.run(&forward_camera(), &settings, CullPhase::LATE);
    assert!(tasks > 0, "disabled culling must pass everything through");
}

#[test]
fn finalize_writes_clamped_indirect_args() {
    let Some(harness) = CullHarness::new(single_sphere_at([0.0, 0.0, 20.0])) else {
        return;
    };
    let camera = forward_camera();
    let settings = RenderSettings::default();
    harness.run(&camera, &settings, CullPhase::LATE);

    let task = pollster::block_on(
        harness
            .gpu
            .read_buffer(harness.visibility.task_counter(), 16),
    )
    .unwrap();
    let words: &[u32] = bytemuck::cast_slice(&task);
    // dispatch args mirror the (unclamped-here) count and pad y/z with 1
    assert_eq!(words[1], words[0]);
    assert_eq!(&words[2..], &[1, 1]);

    let meshlet = pollster::block_on(
        harness
            .gpu
            .read_buffer(harness.visibility.meshlet_counter(), 20),
    )
    .unwrap();
    let words: &[u32] = bytemuck::cast_slice(&meshlet);
    assert_eq!(words[1], 64 * 3, "fixed per-meshlet vertex fan-out");
    assert_eq!(words[2], words[0], "instance count mirrors the survivor count");
    assert_eq!(&words[3..], &[0, 0]);
}
