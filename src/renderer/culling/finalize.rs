//! Command finalizer
//!
//! The consuming half of the produce/finalize pattern: after a producing
//! dispatch has bumped an atomic counter, a single-workgroup dispatch
//! clamps the count and publishes it as the indirect argument the next
//! stage fetches. Keeping this separate from the producers isolates the
//! clamp logic (mirrored on the CPU in `commands.rs`) from the culling
//! math.

use crate::error::EngineResult;
use crate::renderer::culling::visibility::VisibilityState;
use crate::renderer::pipelines::ShaderPrograms;

pub struct CommandFinalizer {
    dispatch_bind: wgpu::BindGroup,
    draw_bind: wgpu::BindGroup,
}

impl CommandFinalizer {
    pub fn new(
        device: &wgpu::Device,
        programs: &ShaderPrograms,
        visibility: &VisibilityState,
    ) -> EngineResult<Self> {
        let dispatch_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Finalize Dispatch Bind Group"),
            layout: programs.layout("finalize-dispatch")?,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: visibility.task_counter().as_entire_binding(),
            }],
        });
        let draw_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Finalize Draw Bind Group"),
            layout: programs.layout("finalize-draw")?,
            entries: &[wgpu::BindGroupEntry {
                binding: 1,
                resource: visibility.meshlet_counter().as_entire_binding(),
            }],
        });
        Ok(Self {
            dispatch_bind,
            draw_bind,
        })
    }

    /// Publish the task-command count as cluster-cull dispatch arguments.
    pub fn encode_dispatch_args(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        programs: &ShaderPrograms,
    ) -> EngineResult<()> {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Finalize Dispatch Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(programs.compute("finalize-dispatch")?);
        pass.set_bind_group(0, &self.dispatch_bind, &[]);
        pass.dispatch_workgroups(1, 1, 1);
        Ok(())
    }

    /// Publish the meshlet-draw count as raster draw arguments.
    pub fn encode_draw_args(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        programs: &ShaderPrograms,
    ) -> EngineResult<()> {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Finalize Draw Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(programs.compute("finalize-draw")?);
        pass.set_bind_group(0, &self.draw_bind, &[]);
        pass.dispatch_workgroups(1, 1, 1);
        Ok(())
    }
}
