//! Frame scheduler
//!
//! Straight-line per-frame sequence over the culling, raster, and
//! reduction stages:
//!
//! `BeginFrame -> EarlyCull -> EarlyRender -> BuildPyramid -> LateCull ->
//! LateRender -> [PostCull -> PostRender]? -> Composite -> EndFrame`
//!
//! The early phases replay last frame's visible set against the stale
//! pyramid; the late phases re-test everything against the pyramid rebuilt
//! from this frame's early depth. That temporal split is the design, not
//! an iteration count. The only conditional side effect lives in
//! BeginFrame: a presentation resize destroys and recreates every
//! per-resolution resource before anything encodes.

use std::sync::Arc;

use crate::camera::Camera;
use crate::error::{EngineError, EngineResult};
use crate::renderer::composite::CompositePass;
use crate::renderer::culling::{CullData, CullDispatcher, CullPhase, VisibilityState};
use crate::renderer::pipelines::ShaderPrograms;
use crate::renderer::raster::{RasterPass, RasterVariant};
use crate::renderer::settings::RenderSettings;
use crate::renderer::sync::{Access, FrameGraph, PassNode, ResourceId};
use crate::renderer::targets::RenderTargets;
use crate::scene::SceneBuffers;

/// What happened to one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    /// Presentation target was stale/not ready; nothing was submitted
    SkippedStale,
    /// Camera input was degenerate; nothing was dispatched or submitted
    SkippedDegenerate,
}

pub struct FrameScheduler {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    surface_config: wgpu::SurfaceConfiguration,

    programs: ShaderPrograms,
    scene: SceneBuffers,
    visibility: VisibilityState,
    targets: RenderTargets,
    dispatcher: CullDispatcher,
    raster: RasterPass,
    composite: CompositePass,

    frame_index: u64,
}

impl FrameScheduler {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        surface: &wgpu::Surface,
        surface_config: wgpu::SurfaceConfiguration,
        scene: SceneBuffers,
    ) -> EngineResult<Self> {
        surface.configure(&device, &surface_config);

        let programs = ShaderPrograms::compile(&device, surface_config.format);
        let visibility = VisibilityState::new(&device, scene.draw_count(), scene.visibility_slots);
        let targets = RenderTargets::new(&device, surface_config.width, surface_config.height);
        let dispatcher = CullDispatcher::new(
            &device,
            &programs,
            &scene,
            &visibility,
            targets.pyramid().full_view(),
        )?;
        let raster = RasterPass::new(&device, &programs, &scene, &visibility)?;
        let composite = CompositePass::new(&device, &programs, &targets)?;

        Ok(Self {
            device,
            queue,
            surface_config,
            programs,
            scene,
            visibility,
            targets,
            dispatcher,
            raster,
            composite,
            frame_index: 0,
        })
    }

    /// Note a new presentation size. Per-resolution resources are rebuilt
    /// inside the next `render_frame`, before any pass encodes.
    pub fn resize(&mut self, surface: &wgpu::Surface, width: u32, height: u32) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        surface.configure(&self.device, &self.surface_config);
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn scene(&self) -> &SceneBuffers {
        &self.scene
    }

    /// Run one tick of the frame sequence.
    pub fn render_frame(
        &mut self,
        surface: &wgpu::Surface,
        camera: &Camera,
        settings: &RenderSettings,
    ) -> EngineResult<FrameOutcome> {
        // BeginFrame: acquire, or skip the whole tick on a stale target
        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Outdated) | Err(wgpu::SurfaceError::Lost) => {
                log::debug!("frame {}: stale presentation target", self.frame_index);
                surface.configure(&self.device, &self.surface_config);
                return Ok(FrameOutcome::SkippedStale);
            }
            Err(wgpu::SurfaceError::Timeout) => return Ok(FrameOutcome::SkippedStale),
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(EngineError::SurfaceOutOfMemory),
        };

        // BeginFrame resize side effect: everything per-resolution is
        // destroyed and recreated before any pass encodes
        if self
            .targets
            .resize_if_needed(&self.device, self.surface_config.width, self.surface_config.height)
        {
            self.dispatcher = CullDispatcher::new(
                &self.device,
                &self.programs,
                &self.scene,
                &self.visibility,
                self.targets.pyramid().full_view(),
            )?;
            self.composite = CompositePass::new(&self.device, &self.programs, &self.targets)?;
        }

        let cull_data = CullData::new(
            camera,
            settings,
            self.surface_config.width,
            self.surface_config.height,
            self.targets.pyramid().width(),
            self.targets.pyramid().height(),
            self.scene.draw_count(),
        );
        if cull_data.is_degenerate() {
            log::warn!(
                "frame {}: degenerate camera input (znear {}, zfar {}, draws {}), skipping",
                self.frame_index,
                cull_data.znear,
                cull_data.zfar,
                cull_data.draw_count
            );
            return Ok(FrameOutcome::SkippedDegenerate);
        }

        let with_post = self.scene.has_post_pass();
        debug_assert!(Self::build_graph(with_post).validate().is_ok());

        let aspect = self.surface_config.width as f32 / self.surface_config.height as f32;
        self.dispatcher.update(&self.queue, &cull_data);
        self.raster
            .update(&self.queue, camera.projection_matrix(aspect), camera.view_matrix());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.visibility.ensure_cleared(&mut encoder);

        // EarlyCull / EarlyRender against last frame's pyramid and visibility
        self.dispatcher.encode(
            &mut encoder,
            &self.programs,
            &self.visibility,
            cull_data.draw_count,
            CullPhase::EARLY,
        )?;
        self.raster.encode(
            &mut encoder,
            &self.programs,
            &self.targets,
            &self.visibility,
            RasterVariant::Early,
        )?;

        // BuildPyramid from the early pass's depth
        self.targets.pyramid().build(
            &self.device,
            &mut encoder,
            &self.programs,
            self.targets.depth_view(),
        )?;

        // LateCull / LateRender: authoritative for this frame
        self.dispatcher.encode(
            &mut encoder,
            &self.programs,
            &self.visibility,
            cull_data.draw_count,
            CullPhase::LATE,
        )?;
        self.raster.encode(
            &mut encoder,
            &self.programs,
            &self.targets,
            &self.visibility,
            RasterVariant::Late,
        )?;

        // Post phases only when some instance declared a post pass at load
        if with_post {
            self.dispatcher.encode(
                &mut encoder,
                &self.programs,
                &self.visibility,
                cull_data.draw_count,
                CullPhase::POST,
            )?;
            self.raster.encode(
                &mut encoder,
                &self.programs,
                &self.targets,
                &self.visibility,
                RasterVariant::Post,
            )?;
        }

        // Composite into the acquired image
        let surface_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.composite
            .encode(&mut encoder, &self.programs, &surface_view)?;

        // EndFrame
        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.frame_index += 1;

        log::trace!("frame {} submitted", self.frame_index);
        Ok(FrameOutcome::Rendered)
    }

    /// The documented data flow of one frame, in recording order. The
    /// scheduler asserts its validity; the tests pin the derived edges.
    pub fn build_graph(with_post: bool) -> FrameGraph {
        use Access::*;
        use ResourceId::*;

        fn cull_pass(name: &'static str, late: bool) -> PassNode {
            let mut node = PassNode::new(name)
                .writes(TaskCounter, TransferWrite)
                .writes(MeshletCounter, TransferWrite)
                .reads_history(DrawVisibility, ComputeRead);
            node = if late {
                // the pyramid was rebuilt earlier this frame
                node.reads(DepthPyramid, ComputeRead)
            } else {
                // temporal lag: previous frame's reduction
                node.reads_history(DepthPyramid, ComputeRead)
            };
            node = node
                .writes(TaskCommands, ComputeWrite)
                .writes(TaskCounter, ComputeWrite)
                .reads(TaskCounter, IndirectRead)
                .reads(TaskCommands, ComputeRead)
                .reads_history(MeshletVisibility, ComputeRead)
                .writes(MeshletDraws, ComputeWrite)
                .writes(MeshletCounter, ComputeWrite);
            if late {
                node = node
                    .writes(DrawVisibility, ComputeWrite)
                    .writes(MeshletVisibility, ComputeWrite);
            }
            node
        }

        fn render_pass(name: &'static str, loads_depth: bool) -> PassNode {
            let mut node = PassNode::new(name)
                .reads(MeshletCounter, IndirectRead)
                .reads(MeshletDraws, VertexRead);
            if loads_depth {
                node = node.reads(DepthTarget, DepthRead);
            }
            node.writes(Gbuffer, ColorWrite).writes(DepthTarget, DepthWrite)
        }

        let mut graph = FrameGraph::new()
            .pass(cull_pass("early-cull", false))
            .pass(render_pass("early-render", false))
            .pass(
                PassNode::new("build-pyramid")
                    .reads(DepthTarget, ComputeRead)
                    .writes(DepthPyramid, ComputeWrite),
            )
            .pass(cull_pass("late-cull", true))
            .pass(render_pass("late-render", true));

        if with_post {
            graph = graph
                .pass(cull_pass("post-cull", true))
                .pass(render_pass("post-render", true));
        }

        graph.pass(
            PassNode::new("composite")
                .reads(Gbuffer, FragmentRead)
                .reads(DepthTarget, FragmentRead)
                .writes(SurfaceImage, ColorWrite),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::sync::{Access, ResourceId};

    #[test]
    fn standard_frame_graph_validates() {
        assert!(FrameScheduler::build_graph(false).validate().is_ok());
        assert!(FrameScheduler::build_graph(true).validate().is_ok());
    }

    #[test]
    fn early_cull_reads_previous_frame_pyramid() {
        let graph = FrameScheduler::build_graph(false);
        // cross-frame source: no same-frame writer
        assert_eq!(graph.source_of("early-cull", ResourceId::DepthPyramid), None);
    }

    #[test]
    fn late_cull_reads_freshly_built_pyramid() {
        let graph = FrameScheduler::build_graph(false);
        assert_eq!(
            graph.source_of("late-cull", ResourceId::DepthPyramid),
            Some(("build-pyramid", Access::ComputeWrite))
        );
    }

    #[test]
    fn late_cull_before_pyramid_fails_validation() {
        use Access::*;
        use ResourceId::*;

        // reorder: the late cull's same-frame pyramid read has no writer
        let graph = crate::renderer::sync::FrameGraph::new()
            .pass(
                crate::renderer::sync::PassNode::new("late-cull")
                    .reads(DepthPyramid, ComputeRead),
            )
            .pass(
                crate::renderer::sync::PassNode::new("build-pyramid")
                    .reads(DepthTarget, ComputeRead)
                    .writes(DepthPyramid, ComputeWrite),
            );
        assert!(graph.validate().is_err());
    }

    #[test]
    fn renders_consume_the_phase_local_draw_list() {
        let graph = FrameScheduler::build_graph(false);
        assert_eq!(
            graph.source_of("early-render", ResourceId::MeshletDraws),
            Some(("early-cull", Access::ComputeWrite))
        );
        assert_eq!(
            graph.source_of("late-render", ResourceId::MeshletDraws),
            Some(("late-cull", Access::ComputeWrite))
        );
        assert_eq!(
            graph.source_of("late-render", ResourceId::MeshletCounter),
            Some(("late-cull", Access::ComputeWrite))
        );
    }

    #[test]
    fn pyramid_build_consumes_early_depth() {
        let graph = FrameScheduler::build_graph(false);
        assert_eq!(
            graph.source_of("build-pyramid", ResourceId::DepthTarget),
            Some(("early-render", Access::DepthWrite))
        );
    }

    #[test]
    fn post_phases_present_only_when_requested() {
        let without = FrameScheduler::build_graph(false);
        assert!(without.passes().iter().all(|p| p.name != "post-cull"));

        let with = FrameScheduler::build_graph(true);
        assert!(with.passes().iter().any(|p| p.name == "post-cull"));
        assert_eq!(
            with.source_of("composite", ResourceId::Gbuffer),
            Some(("post-render", Access::ColorWrite))
        );
    }
}
