/// Scene data model
///
/// Load-time contract between the asset-producing collaborator and the
/// culling/raster core: mesh/LOD/meshlet tables, instance placements, and a
/// flat material table, assembled on the CPU and uploaded once. Everything
/// here is immutable for the rest of the process after [`Scene::finalize`].

pub mod mesh;
pub mod meshlet;
pub mod shapes;

pub use mesh::{select_lod, Material, Mesh, MeshDraw, MeshLod, Vertex};
pub use meshlet::{build_meshlets, Meshlet};

use bytemuck::Zeroable;
use cgmath::{InnerSpace, Vector3};
use wgpu::util::DeviceExt;

use crate::constants::culling::MAX_LOD_COUNT;
use crate::error::{EngineError, EngineResult};

/// One LOD's source geometry handed to [`Scene::add_mesh`]
pub struct LodSource<'a> {
    pub indices: &'a [u32],
    /// Object-space error of this level; must be non-decreasing across LODs
    pub error: f32,
}

/// Instance placement handed to [`Scene::add_instance`]
pub struct InstanceDesc {
    pub position: [f32; 3],
    pub scale: f32,
    /// Unit quaternion (x, y, z, w)
    pub orientation: [f32; 4],
    pub mesh_index: u32,
    pub material_index: u32,
    /// 0 = main opaque pass, 1 = post pass (double-sided / alpha-tested)
    pub post_pass: u32,
}

impl Default for InstanceDesc {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            scale: 1.0,
            orientation: [0.0, 0.0, 0.0, 1.0],
            mesh_index: 0,
            material_index: 0,
            post_pass: 0,
        }
    }
}

/// CPU-side scene under construction
pub struct Scene {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    meshes: Vec<Mesh>,
    meshlets: Vec<Meshlet>,
    meshlet_data: Vec<u32>,
    draws: Vec<MeshDraw>,
    materials: Vec<Material>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            meshes: Vec::new(),
            meshlets: Vec::new(),
            meshlet_data: Vec::new(),
            draws: Vec::new(),
            // material index 0 is always the dummy
            materials: vec![Material::default()],
        }
    }

    pub fn add_material(&mut self, material: Material) -> u32 {
        self.materials.push(material);
        (self.materials.len() - 1) as u32
    }

    /// Register a mesh: clusters every LOD's triangles into meshlets and
    /// computes the shared bounding sphere. Returns the mesh index.
    pub fn add_mesh(&mut self, vertices: &[Vertex], lods: &[LodSource]) -> EngineResult<u32> {
        if vertices.is_empty() {
            return Err(EngineError::InvalidScene {
                message: "mesh has no vertices".to_string(),
            });
        }
        if lods.is_empty() || lods.len() > MAX_LOD_COUNT {
            return Err(EngineError::InvalidScene {
                message: format!("mesh must have 1..={} LOD levels, got {}", MAX_LOD_COUNT, lods.len()),
            });
        }

        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(vertices);

        let mut mesh_lods = [MeshLod::zeroed(); MAX_LOD_COUNT];
        for (slot, lod) in mesh_lods.iter_mut().zip(lods.iter()) {
            let index_offset = self.indices.len() as u32;
            let rebased: Vec<u32> = lod.indices.iter().map(|&i| i + base).collect();
            if rebased.iter().any(|&i| i as usize >= self.vertices.len()) {
                return Err(EngineError::InvalidScene {
                    message: "LOD index out of range".to_string(),
                });
            }
            self.indices.extend_from_slice(&rebased);

            let meshlet_offset = self.meshlets.len() as u32;
            let meshlet_count = meshlet::build_meshlets(
                &self.vertices,
                &rebased,
                &mut self.meshlets,
                &mut self.meshlet_data,
            );
            *slot = MeshLod {
                index_offset,
                index_count: lod.indices.len() as u32,
                meshlet_offset,
                meshlet_count,
                error: lod.error,
            };
        }
        mesh::validate_lod_errors(&mesh_lods[..lods.len()])?;

        let points: Vec<Vector3<f32>> = vertices.iter().map(|v| Vector3::from(v.position)).collect();
        let center = points.iter().fold(Vector3::new(0.0, 0.0, 0.0), |acc, p| acc + p)
            / points.len() as f32;
        let radius = points
            .iter()
            .map(|p| (p - center).magnitude())
            .fold(0.0f32, f32::max);

        self.meshes.push(Mesh {
            center: center.into(),
            radius,
            lod_count: lods.len() as u32,
            lods: mesh_lods,
        });
        Ok((self.meshes.len() - 1) as u32)
    }

    pub fn add_instance(&mut self, desc: InstanceDesc) -> EngineResult<u32> {
        if desc.mesh_index as usize >= self.meshes.len() {
            return Err(EngineError::InvalidScene {
                message: format!("instance references unknown mesh {}", desc.mesh_index),
            });
        }
        if desc.material_index as usize >= self.materials.len() {
            return Err(EngineError::InvalidScene {
                message: format!("instance references unknown material {}", desc.material_index),
            });
        }
        if desc.post_pass > 1 {
            return Err(EngineError::InvalidScene {
                message: format!("post pass {} out of range", desc.post_pass),
            });
        }
        self.draws.push(MeshDraw {
            position: desc.position,
            scale: desc.scale,
            orientation: desc.orientation,
            mesh_index: desc.mesh_index,
            meshlet_visibility_offset: 0, // assigned by finalize
            post_pass: desc.post_pass,
            material_index: desc.material_index,
        });
        Ok((self.draws.len() - 1) as u32)
    }

    pub fn draw_count(&self) -> u32 {
        self.draws.len() as u32
    }

    /// Assign meshlet-visibility offsets, accumulate the post-pass mask, and
    /// upload every table. The scene is consumed; the tables never change
    /// afterwards.
    pub fn finalize(mut self, device: &wgpu::Device) -> EngineResult<SceneBuffers> {
        let (visibility_slots, post_pass_mask) =
            assign_visibility_offsets(&mut self.draws, &self.meshes);

        log::info!(
            "scene: {} meshes, {} meshlets, {} draws, {} visibility slots",
            self.meshes.len(),
            self.meshlets.len(),
            self.draws.len(),
            visibility_slots
        );

        let mesh_buffer = storage_buffer(device, "Mesh Table", &self.meshes);
        let meshlet_buffer = storage_buffer(device, "Meshlet Table", &self.meshlets);
        let meshlet_data_buffer = storage_buffer(device, "Meshlet Data", &self.meshlet_data);
        let vertex_buffer = storage_buffer(device, "Vertex Table", &self.vertices);
        let draw_buffer = storage_buffer(device, "Draw Table", &self.draws);
        let material_buffer = storage_buffer(device, "Material Table", &self.materials);

        Ok(SceneBuffers {
            mesh_buffer,
            meshlet_buffer,
            meshlet_data_buffer,
            vertex_buffer,
            draw_buffer,
            material_buffer,
            draws: self.draws,
            meshes: self.meshes,
            visibility_slots,
            post_pass_mask,
        })
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Uploaded, immutable scene tables
pub struct SceneBuffers {
    pub mesh_buffer: wgpu::Buffer,
    pub meshlet_buffer: wgpu::Buffer,
    pub meshlet_data_buffer: wgpu::Buffer,
    pub vertex_buffer: wgpu::Buffer,
    pub draw_buffer: wgpu::Buffer,
    pub material_buffer: wgpu::Buffer,

    /// CPU copies kept for test mirrors and diagnostics
    pub draws: Vec<MeshDraw>,
    pub meshes: Vec<Mesh>,

    pub visibility_slots: u32,
    pub post_pass_mask: u32,
}

impl SceneBuffers {
    pub fn draw_count(&self) -> u32 {
        self.draws.len() as u32
    }

    /// Whether any instance opted into a post pass (bits above bit 0)
    pub fn has_post_pass(&self) -> bool {
        self.post_pass_mask >> 1 != 0
    }
}

/// Assign each draw's slot range in the meshlet-visibility bitmask (one
/// slot per meshlet of its densest LOD, so the assignment is stable across
/// LOD switches) and OR-accumulate the post-pass mask. Returns the total
/// slot count and the mask.
fn assign_visibility_offsets(draws: &mut [MeshDraw], meshes: &[Mesh]) -> (u32, u32) {
    let mut visibility_slots = 0u32;
    let mut post_pass_mask = 0u32;

    for draw in draws {
        let mesh = &meshes[draw.mesh_index as usize];
        draw.meshlet_visibility_offset = visibility_slots;

        let meshlet_count = mesh
            .lods
            .iter()
            .take(mesh.lod_count as usize)
            .map(|lod| lod.meshlet_count)
            .max()
            .unwrap_or(0);
        visibility_slots += meshlet_count;
        post_pass_mask |= 1 << draw.post_pass;
    }

    (visibility_slots, post_pass_mask)
}

fn storage_buffer<T: bytemuck::Pod>(device: &wgpu::Device, label: &str, data: &[T]) -> wgpu::Buffer {
    if data.is_empty() {
        // bind groups need a non-zero binding even for empty tables
        return device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: 16,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
    }
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(data),
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_lod_sphere(scene: &mut Scene) -> u32 {
        let (mut vertices, fine) = shapes::uv_sphere(1.0, 16, 8);
        let (coarse_vertices, coarse) = shapes::uv_sphere(1.0, 8, 4);

        let base = vertices.len() as u32;
        vertices.extend_from_slice(&coarse_vertices);
        let coarse: Vec<u32> = coarse.iter().map(|&i| i + base).collect();

        scene
            .add_mesh(
                &vertices,
                &[
                    LodSource { indices: &fine, error: 0.01 },
                    LodSource { indices: &coarse, error: 0.1 },
                ],
            )
            .expect("mesh should validate")
    }

    #[test]
    fn visibility_offsets_accumulate_max_lod_meshlets() {
        let mut scene = Scene::new();
        let mesh = two_lod_sphere(&mut scene);

        for i in 0..3 {
            scene
                .add_instance(InstanceDesc {
                    position: [i as f32 * 4.0, 0.0, 0.0],
                    mesh_index: mesh,
                    ..Default::default()
                })
                .expect("instance");
        }

        let mesh_entry = scene.meshes[mesh as usize];
        let per_draw = (0..mesh_entry.lod_count as usize)
            .map(|i| mesh_entry.lods[i].meshlet_count)
            .max()
            .unwrap();
        // the fine LOD has more meshlets than the coarse one and wins
        assert_eq!(per_draw, mesh_entry.lods[0].meshlet_count);
        assert!(per_draw > mesh_entry.lods[1].meshlet_count);

        let (slots, mask) = assign_visibility_offsets(&mut scene.draws, &scene.meshes);
        assert_eq!(slots, per_draw * 3);
        assert_eq!(mask, 0b1);
        for (i, draw) in scene.draws.iter().enumerate() {
            assert_eq!(draw.meshlet_visibility_offset, per_draw * i as u32);
        }
    }

    #[test]
    fn post_pass_mask_accumulates() {
        let mut scene = Scene::new();
        let (vertices, indices) = shapes::cube();
        let mesh = scene
            .add_mesh(&vertices, &[LodSource { indices: &indices, error: 0.0 }])
            .unwrap();
        scene
            .add_instance(InstanceDesc { mesh_index: mesh, ..Default::default() })
            .unwrap();
        scene
            .add_instance(InstanceDesc { mesh_index: mesh, post_pass: 1, ..Default::default() })
            .unwrap();

        let (_, mask) = assign_visibility_offsets(&mut scene.draws, &scene.meshes);
        assert_eq!(mask, 0b11);
        assert!(mask >> 1 != 0, "post phases must be scheduled");
    }

    #[test]
    fn rejects_bad_references() {
        let mut scene = Scene::new();
        assert!(scene
            .add_instance(InstanceDesc {
                mesh_index: 7,
                ..Default::default()
            })
            .is_err());

        let (vertices, indices) = shapes::cube();
        let mesh = scene
            .add_mesh(&vertices, &[LodSource { indices: &indices, error: 0.0 }])
            .expect("cube");
        assert!(scene
            .add_instance(InstanceDesc {
                mesh_index: mesh,
                material_index: 3,
                ..Default::default()
            })
            .is_err());
        assert!(scene
            .add_instance(InstanceDesc {
                mesh_index: mesh,
                post_pass: 2,
                ..Default::default()
            })
            .is_err());
    }

    #[test]
    fn rejects_regressing_lod_errors() {
        let mut scene = Scene::new();
        let (vertices, indices) = shapes::cube();
        let result = scene.add_mesh(
            &vertices,
            &[
                LodSource { indices: &indices, error: 1.0 },
                LodSource { indices: &indices, error: 0.5 },
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn bounding_sphere_covers_mesh() {
        let mut scene = Scene::new();
        let (vertices, indices) = shapes::uv_sphere(3.0, 12, 6);
        let mesh = scene
            .add_mesh(&vertices, &[LodSource { indices: &indices, error: 0.0 }])
            .expect("sphere");
        let entry = scene.meshes[mesh as usize];
        assert!(entry.radius >= 3.0 - 1e-3);
        assert!(entry.radius < 3.5);
    }
}
