//! Shader program set
//!
//! Compiles the crate's WGSL and exposes every pipeline and bind group
//! layout by logical name. The rest of the renderer only ever dispatches
//! by handle; nothing outside this module touches shader source. Layouts
//! are explicit rather than derived: the depth pyramid binds as an
//! unfilterable R32Float texture, which shader-derived layouts would
//! reject.

use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::renderer::targets::{DEPTH_FORMAT, GBUFFER_FORMATS};

/// Prepend the generated constants and shared type declarations
fn shader_source(body: &str) -> String {
    [
        include_str!("shaders/generated/constants.wgsl"),
        include_str!("shaders/types.wgsl"),
        body,
    ]
    .concat()
}

fn create_module(device: &wgpu::Device, label: &str, body: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shader_source(body).into()),
    })
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    read_only: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn depth_texture_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Depth,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: wgpu::TextureFormat::R32Float,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

pub struct ShaderPrograms {
    compute: HashMap<&'static str, wgpu::ComputePipeline>,
    render: HashMap<&'static str, wgpu::RenderPipeline>,
    layouts: HashMap<&'static str, wgpu::BindGroupLayout>,
}

impl ShaderPrograms {
    pub fn compile(device: &wgpu::Device, surface_format: wgpu::TextureFormat) -> Self {
        use wgpu::ShaderStages as Stages;

        let mut layouts = HashMap::new();
        let mut add_layout = |name: &'static str, entries: &[wgpu::BindGroupLayoutEntry]| {
            layouts.insert(
                name,
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(name),
                    entries,
                }),
            );
        };

        add_layout(
            "instance-cull",
            &[
                uniform_entry(0, Stages::COMPUTE),
                storage_entry(1, Stages::COMPUTE, true),
                storage_entry(2, Stages::COMPUTE, true),
                storage_entry(3, Stages::COMPUTE, false),
                storage_entry(4, Stages::COMPUTE, false),
                storage_entry(5, Stages::COMPUTE, false),
                texture_entry(6, Stages::COMPUTE),
            ],
        );
        add_layout(
            "cluster-cull",
            &[
                uniform_entry(0, Stages::COMPUTE),
                storage_entry(1, Stages::COMPUTE, true),
                storage_entry(2, Stages::COMPUTE, true),
                storage_entry(3, Stages::COMPUTE, true),
                storage_entry(4, Stages::COMPUTE, false),
                storage_entry(5, Stages::COMPUTE, false),
                storage_entry(6, Stages::COMPUTE, false),
                texture_entry(7, Stages::COMPUTE),
            ],
        );
        add_layout(
            "finalize-dispatch",
            &[storage_entry(0, Stages::COMPUTE, false)],
        );
        add_layout("finalize-draw", &[storage_entry(1, Stages::COMPUTE, false)]);
        add_layout(
            "depth-reduce-first",
            &[
                depth_texture_entry(0, Stages::COMPUTE),
                storage_texture_entry(1),
            ],
        );
        add_layout(
            "depth-reduce-mip",
            &[storage_texture_entry(1), texture_entry(2, Stages::COMPUTE)],
        );
        add_layout(
            "meshlet",
            &[
                uniform_entry(0, Stages::VERTEX),
                storage_entry(1, Stages::VERTEX, true),
                storage_entry(2, Stages::VERTEX, true),
                storage_entry(3, Stages::VERTEX, true),
                storage_entry(4, Stages::VERTEX, true),
                storage_entry(5, Stages::VERTEX, true),
                storage_entry(6, Stages::FRAGMENT, true),
            ],
        );
        add_layout(
            "composite",
            &[
                texture_entry(0, Stages::FRAGMENT),
                texture_entry(1, Stages::FRAGMENT),
                depth_texture_entry(2, Stages::FRAGMENT),
            ],
        );

        let pipeline_layout = |name: &'static str| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(name),
                bind_group_layouts: &[&layouts[name]],
                push_constant_ranges: &[],
            })
        };

        let instance_cull = create_module(
            device,
            "instance_cull",
            include_str!("shaders/instance_cull.wgsl"),
        );
        let cluster_cull = create_module(
            device,
            "cluster_cull",
            include_str!("shaders/cluster_cull.wgsl"),
        );
        let finalize = create_module(device, "finalize", include_str!("shaders/finalize.wgsl"));
        let depth_reduce = create_module(
            device,
            "depth_reduce",
            include_str!("shaders/depth_reduce.wgsl"),
        );
        let meshlet_draw = create_module(
            device,
            "meshlet_draw",
            include_str!("shaders/meshlet_draw.wgsl"),
        );
        let composite = create_module(device, "composite", include_str!("shaders/composite.wgsl"));

        let mut compute = HashMap::new();
        let mut add_compute =
            |name: &'static str, layout_name: &'static str, module: &wgpu::ShaderModule, entry: &str| {
                compute.insert(
                    name,
                    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                        label: Some(name),
                        layout: Some(&pipeline_layout(layout_name)),
                        module,
                        entry_point: entry,
                    }),
                );
            };

        add_compute("cull-early", "instance-cull", &instance_cull, "cull_early");
        add_compute("cull-late", "instance-cull", &instance_cull, "cull_late");
        add_compute("cluster-early", "cluster-cull", &cluster_cull, "cluster_early");
        add_compute("cluster-late", "cluster-cull", &cluster_cull, "cluster_late");
        add_compute("finalize-dispatch", "finalize-dispatch", &finalize, "finalize_dispatch");
        add_compute("finalize-draw", "finalize-draw", &finalize, "finalize_draw");
        add_compute("depth-reduce-first", "depth-reduce-first", &depth_reduce, "reduce_first");
        add_compute("depth-reduce-mip", "depth-reduce-mip", &depth_reduce, "reduce_mip");

        let mut render = HashMap::new();
        render.insert(
            "meshlet",
            create_meshlet_pipeline(device, &pipeline_layout("meshlet"), &meshlet_draw, false),
        );
        render.insert(
            "meshlet-post",
            create_meshlet_pipeline(device, &pipeline_layout("meshlet"), &meshlet_draw, true),
        );
        render.insert(
            "composite",
            create_composite_pipeline(
                device,
                &pipeline_layout("composite"),
                &composite,
                surface_format,
            ),
        );

        Self {
            compute,
            render,
            layouts,
        }
    }

    pub fn compute(&self, name: &str) -> EngineResult<&wgpu::ComputePipeline> {
        self.compute
            .get(name)
            .ok_or_else(|| EngineError::ProgramNotFound {
                name: name.to_string(),
            })
    }

    pub fn render(&self, name: &str) -> EngineResult<&wgpu::RenderPipeline> {
        self.render
            .get(name)
            .ok_or_else(|| EngineError::ProgramNotFound {
                name: name.to_string(),
            })
    }

    pub fn layout(&self, name: &str) -> EngineResult<&wgpu::BindGroupLayout> {
        self.layouts
            .get(name)
            .ok_or_else(|| EngineError::ProgramNotFound {
                name: name.to_string(),
            })
    }
}

fn create_meshlet_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    post: bool,
) -> wgpu::RenderPipeline {
    let targets: Vec<Option<wgpu::ColorTargetState>> = GBUFFER_FORMATS
        .iter()
        .map(|format| {
            Some(wgpu::ColorTargetState {
                format: *format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(if post { "meshlet-post" } else { "meshlet" }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            // geometry is pulled from storage buffers by the vertex stage
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: "fs_main",
            targets: &targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // the post pass draws double-sided geometry
            cull_mode: if post { None } else { Some(wgpu::Face::Back) },
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            // reverse-Z
            depth_compare: wgpu::CompareFunction::GreaterEqual,
            stencil: wgpu::StencilState::default(),
            bias: if post {
                wgpu::DepthBiasState {
                    constant: 16,
                    slope_scale: 1.0,
                    clamp: 0.0,
                }
            } else {
                wgpu::DepthBiasState::default()
            },
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

fn create_composite_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    surface_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("composite"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: "vs_main",
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}
