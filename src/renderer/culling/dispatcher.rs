//! Cull dispatcher
//!
//! Encodes one full cull phase: counter reset, the per-instance cull
//! dispatch, dispatch-argument finalize, the indirectly-dispatched
//! cluster-cull expansion, and draw-argument finalize. The same encoding
//! serves the early, late, and post phases; only the pipelines and the
//! bound CullData variant differ.

use bytemuck::bytes_of;

use crate::constants::culling::CULL_WORKGROUP_SIZE;
use crate::error::EngineResult;
use crate::renderer::culling::cull_data::CullData;
use crate::renderer::culling::commands::INDIRECT_ARGS_OFFSET;
use crate::renderer::culling::finalize::CommandFinalizer;
use crate::renderer::culling::visibility::VisibilityState;
use crate::renderer::pipelines::ShaderPrograms;
use crate::scene::SceneBuffers;

/// Which cull phase an encode call serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CullPhase {
    pub late: bool,
    pub post_pass: u32,
}

impl CullPhase {
    pub const EARLY: Self = Self { late: false, post_pass: 0 };
    pub const LATE: Self = Self { late: true, post_pass: 0 };
    pub const POST: Self = Self { late: true, post_pass: 1 };
}

pub struct CullDispatcher {
    /// CullData for the main (post_pass = 0) phases
    main_data: wgpu::Buffer,
    /// CullData variant for the post phase
    post_data: wgpu::Buffer,

    instance_bind_main: wgpu::BindGroup,
    instance_bind_post: wgpu::BindGroup,
    cluster_bind_main: wgpu::BindGroup,
    cluster_bind_post: wgpu::BindGroup,

    finalizer: CommandFinalizer,
}

impl CullDispatcher {
    pub fn new(
        device: &wgpu::Device,
        programs: &ShaderPrograms,
        scene: &SceneBuffers,
        visibility: &VisibilityState,
        pyramid_view: &wgpu::TextureView,
    ) -> EngineResult<Self> {
        let uniform = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: std::mem::size_of::<CullData>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let main_data = uniform("Cull Data");
        let post_data = uniform("Cull Data (post)");

        let instance_layout = programs.layout("instance-cull")?;
        let cluster_layout = programs.layout("cluster-cull")?;

        let instance_bind = |data: &wgpu::Buffer, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: instance_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: data.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: scene.draw_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: scene.mesh_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: visibility.task_commands().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: visibility.task_counter().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: visibility.draw_visibility().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::TextureView(pyramid_view),
                    },
                ],
            })
        };

        let cluster_bind = |data: &wgpu::Buffer, label: &str| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: cluster_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: data.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: scene.draw_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: scene.meshlet_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: visibility.task_commands().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: visibility.meshlet_visibility().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: visibility.meshlet_draws().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: visibility.meshlet_counter().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: wgpu::BindingResource::TextureView(pyramid_view),
                    },
                ],
            })
        };

        Ok(Self {
            instance_bind_main: instance_bind(&main_data, "Instance Cull Bind Group"),
            instance_bind_post: instance_bind(&post_data, "Instance Cull Bind Group (post)"),
            cluster_bind_main: cluster_bind(&main_data, "Cluster Cull Bind Group"),
            cluster_bind_post: cluster_bind(&post_data, "Cluster Cull Bind Group (post)"),
            finalizer: CommandFinalizer::new(device, programs, visibility)?,
            main_data,
            post_data,
        })
    }

    /// Upload this frame's CullData (and its post-pass variant).
    pub fn update(&self, queue: &wgpu::Queue, data: &CullData) {
        queue.write_buffer(&self.main_data, 0, bytes_of(&data.for_pass(0)));
        queue.write_buffer(&self.post_data, 0, bytes_of(&data.for_pass(1)));
    }

    /// Record one cull phase. Counters reset first; every stage runs in its
    /// own compute pass so each write is visible to the stage that reads it.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        programs: &ShaderPrograms,
        visibility: &VisibilityState,
        draw_count: u32,
        phase: CullPhase,
    ) -> EngineResult<()> {
        visibility.reset_counters(encoder);

        let (instance_bind, cluster_bind) = if phase.post_pass == 0 {
            (&self.instance_bind_main, &self.cluster_bind_main)
        } else {
            (&self.instance_bind_post, &self.cluster_bind_post)
        };
        let cull_pipeline = if phase.late { "cull-late" } else { "cull-early" };
        let cluster_pipeline = if phase.late { "cluster-late" } else { "cluster-early" };

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Instance Cull Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(programs.compute(cull_pipeline)?);
            pass.set_bind_group(0, instance_bind, &[]);
            pass.dispatch_workgroups(draw_count.div_ceil(CULL_WORKGROUP_SIZE), 1, 1);
        }

        self.finalizer.encode_dispatch_args(encoder, programs)?;

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Cluster Cull Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(programs.compute(cluster_pipeline)?);
            pass.set_bind_group(0, cluster_bind, &[]);
            pass.dispatch_workgroups_indirect(visibility.task_counter(), INDIRECT_ARGS_OFFSET);
        }

        self.finalizer.encode_draw_args(encoder, programs)?;
        Ok(())
    }
}
