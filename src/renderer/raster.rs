//! Meshlet raster pass
//!
//! Consumes the finalized meshlet-draw list through one indirect draw per
//! phase. The early variant clears the gbuffer and depth (reverse-Z: depth
//! clears to 0.0); late and post load and accumulate onto the early
//! results. The post variant's pipeline additionally disables backface
//! culling and applies a depth bias for double-sided geometry.

use bytemuck::{bytes_of, Pod, Zeroable};
use cgmath::Matrix4;

use crate::constants::frame::GBUFFER_COUNT;
use crate::error::EngineResult;
use crate::renderer::culling::commands::INDIRECT_ARGS_OFFSET;
use crate::renderer::culling::VisibilityState;
use crate::renderer::pipelines::ShaderPrograms;
use crate::renderer::targets::RenderTargets;
use crate::scene::SceneBuffers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterVariant {
    Early,
    Late,
    Post,
}

impl RasterVariant {
    fn clears_targets(self) -> bool {
        matches!(self, RasterVariant::Early)
    }

    fn pipeline_name(self) -> &'static str {
        match self {
            RasterVariant::Post => "meshlet-post",
            _ => "meshlet",
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct RasterGlobals {
    projection: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
}

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 135.0 / 255.0,
    g: 206.0 / 255.0,
    b: 250.0 / 255.0,
    a: 15.0 / 255.0,
};

pub struct RasterPass {
    globals: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl RasterPass {
    pub fn new(
        device: &wgpu::Device,
        programs: &ShaderPrograms,
        scene: &SceneBuffers,
        visibility: &VisibilityState,
    ) -> EngineResult<Self> {
        let globals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Raster Globals"),
            size: std::mem::size_of::<RasterGlobals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // the pipeline variants share one layout, so one bind group serves
        // every phase
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Meshlet Raster Bind Group"),
            layout: programs.layout("meshlet")?,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: visibility.meshlet_draws().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: scene.draw_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: scene.meshlet_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: scene.meshlet_data_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: scene.vertex_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: scene.material_buffer.as_entire_binding(),
                },
            ],
        });

        Ok(Self { bind_group, globals })
    }

    pub fn update(&self, queue: &wgpu::Queue, projection: Matrix4<f32>, view: Matrix4<f32>) {
        let globals = RasterGlobals {
            projection: projection.into(),
            view: view.into(),
        };
        queue.write_buffer(&self.globals, 0, bytes_of(&globals));
    }

    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        programs: &ShaderPrograms,
        targets: &RenderTargets,
        visibility: &VisibilityState,
        variant: RasterVariant,
    ) -> EngineResult<()> {
        let color_load = if variant.clears_targets() {
            wgpu::LoadOp::Clear(CLEAR_COLOR)
        } else {
            wgpu::LoadOp::Load
        };
        let depth_load = if variant.clears_targets() {
            // reverse-Z far plane
            wgpu::LoadOp::Clear(0.0)
        } else {
            wgpu::LoadOp::Load
        };

        let mut color_attachments = Vec::with_capacity(GBUFFER_COUNT);
        for i in 0..GBUFFER_COUNT {
            color_attachments.push(Some(wgpu::RenderPassColorAttachment {
                view: targets.gbuffer_view(i),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
            }));
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(match variant {
                RasterVariant::Early => "Early Render Pass",
                RasterVariant::Late => "Late Render Pass",
                RasterVariant::Post => "Post Render Pass",
            }),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: targets.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(programs.render(variant.pipeline_name())?);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw_indirect(visibility.meshlet_counter(), INDIRECT_ARGS_OFFSET);
        Ok(())
    }
}
