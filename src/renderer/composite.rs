//! Composite pass
//!
//! Resolves the gbuffer into the acquired presentation image with a
//! fullscreen triangle. This is the in-crate stand-in for the compositing
//! collaborator that consumes the renderer's persistent outputs.

use crate::error::EngineResult;
use crate::renderer::pipelines::ShaderPrograms;
use crate::renderer::targets::RenderTargets;

pub struct CompositePass {
    bind_group: wgpu::BindGroup,
}

impl CompositePass {
    /// Bind groups reference per-resolution views; rebuild after a resize.
    pub fn new(
        device: &wgpu::Device,
        programs: &ShaderPrograms,
        targets: &RenderTargets,
    ) -> EngineResult<Self> {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Bind Group"),
            layout: programs.layout("composite")?,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(targets.gbuffer_view(0)),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(targets.gbuffer_view(1)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(targets.depth_view()),
                },
            ],
        });
        Ok(Self { bind_group })
    }

    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        programs: &ShaderPrograms,
        surface_view: &wgpu::TextureView,
    ) -> EngineResult<()> {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Composite Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(programs.render("composite")?);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}
