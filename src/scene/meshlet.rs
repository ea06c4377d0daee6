//! Meshlet clustering
//!
//! Splits an indexed triangle list into small clusters, each with its own
//! bounding sphere and a packed backface cone, sized so the cluster-cull
//! stage can test and expand one cluster per GPU lane.

use bytemuck::{Pod, Zeroable};
use cgmath::{InnerSpace, Vector3};

use crate::constants::culling::{MESHLET_MAX_TRIANGLES, MESHLET_MAX_VERTICES};
use crate::scene::mesh::Vertex;

const UNUSED: u8 = 0xff;

/// GPU meshlet record.
///
/// `data_offset` points into the shared meshlet-data buffer: first
/// `vertex_count` words of global vertex indices, then the triangle's local
/// indices packed one byte each, four to a word.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Meshlet {
    pub center: [f32; 3],
    pub radius: f32,
    /// Cone axis xyz + cutoff packed as four 8-bit SNORM lanes
    pub cone: u32,
    pub data_offset: u32,
    /// vertex_count in bits 0..8, triangle_count in bits 8..16
    pub counts: u32,
}

impl Meshlet {
    pub fn vertex_count(&self) -> u32 {
        self.counts & 0xff
    }

    pub fn triangle_count(&self) -> u32 {
        (self.counts >> 8) & 0xff
    }
}

fn quantize_snorm8(v: f32) -> i8 {
    (v.clamp(-1.0, 1.0) * 127.0).round() as i8
}

fn pack_cone(axis: Vector3<f32>, cutoff: f32) -> u32 {
    let x = quantize_snorm8(axis.x) as u8 as u32;
    let y = quantize_snorm8(axis.y) as u8 as u32;
    let z = quantize_snorm8(axis.z) as u8 as u32;
    // the cutoff quantizes upward so the cone never culls more than the
    // exact value would
    let w = (cutoff.clamp(-1.0, 1.0) * 127.0).ceil() as i8 as u8 as u32;
    x | (y << 8) | (z << 16) | (w << 24)
}

/// Ritter-style bounding sphere over a point set
fn bounding_sphere(points: &[Vector3<f32>]) -> (Vector3<f32>, f32) {
    debug_assert!(!points.is_empty());

    let mut center = points[0];
    let mut radius = 0.0f32;
    for p in points {
        let d = (p - center).magnitude();
        if d > radius {
            let k = if d > 0.0 { 0.5 + (radius / d) * 0.5 } else { 1.0 };
            center = center * k + p * (1.0 - k);
            radius = (radius + d) * 0.5;
        }
    }
    (center, radius)
}

struct PendingMeshlet {
    vertices: Vec<u32>,
    triangles: Vec<[u8; 3]>,
}

impl PendingMeshlet {
    fn new() -> Self {
        Self {
            vertices: Vec::with_capacity(MESHLET_MAX_VERTICES as usize),
            triangles: Vec::with_capacity(MESHLET_MAX_TRIANGLES as usize),
        }
    }

    fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn flush(
        &mut self,
        used: &mut [u8],
        vertices: &[Vertex],
        out_meshlets: &mut Vec<Meshlet>,
        out_data: &mut Vec<u32>,
    ) {
        if self.is_empty() {
            return;
        }

        let data_offset = out_data.len() as u32;
        out_data.extend_from_slice(&self.vertices);

        // triangle bytes packed four per word
        let mut word = 0u32;
        for (i, tri) in self.triangles.iter().flat_map(|t| t.iter()).enumerate() {
            word |= (*tri as u32) << ((i % 4) * 8);
            if i % 4 == 3 {
                out_data.push(word);
                word = 0;
            }
        }
        if self.triangles.len() * 3 % 4 != 0 {
            out_data.push(word);
        }

        let points: Vec<Vector3<f32>> = self
            .vertices
            .iter()
            .map(|&v| Vector3::from(vertices[v as usize].position))
            .collect();
        let (center, radius) = bounding_sphere(&points);

        // average triangle normal; the cutoff widens to "never cull" when the
        // cluster's normals disagree too much for a safe cone
        let mut axis = Vector3::new(0.0, 0.0, 0.0);
        let mut normals = Vec::with_capacity(self.triangles.len());
        for tri in &self.triangles {
            let a = Vector3::from(vertices[self.vertices[tri[0] as usize] as usize].position);
            let b = Vector3::from(vertices[self.vertices[tri[1] as usize] as usize].position);
            let c = Vector3::from(vertices[self.vertices[tri[2] as usize] as usize].position);
            let n = (b - a).cross(c - a);
            let len = n.magnitude();
            if len > 1e-8 {
                let n = n / len;
                axis += n;
                normals.push(n);
            }
        }
        let axis = if axis.magnitude() > 1e-8 {
            axis.normalize()
        } else {
            Vector3::new(0.0, 0.0, 1.0)
        };
        let min_dot = normals
            .iter()
            .map(|n| n.dot(axis))
            .fold(1.0f32, f32::min);
        let cutoff = if min_dot <= 0.1 {
            1.0
        } else {
            (1.0 - min_dot * min_dot).max(0.0).sqrt()
        };

        out_meshlets.push(Meshlet {
            center: center.into(),
            radius,
            cone: pack_cone(axis, cutoff),
            data_offset,
            counts: self.vertices.len() as u32 | ((self.triangles.len() as u32) << 8),
        });

        for &v in &self.vertices {
            used[v as usize] = UNUSED;
        }
        self.vertices.clear();
        self.triangles.clear();
    }
}

/// Scan-cluster an indexed triangle list into meshlets, appending records to
/// `out_meshlets` and packed vertex/triangle references to `out_data`.
/// Returns the number of meshlets emitted.
pub fn build_meshlets(
    vertices: &[Vertex],
    indices: &[u32],
    out_meshlets: &mut Vec<Meshlet>,
    out_data: &mut Vec<u32>,
) -> u32 {
    assert!(indices.len() % 3 == 0);

    let mut used = vec![UNUSED; vertices.len()];
    let mut pending = PendingMeshlet::new();
    let before = out_meshlets.len();

    for tri in indices.chunks_exact(3) {
        let extra = tri
            .iter()
            .filter(|&&v| used[v as usize] == UNUSED)
            .count();

        if pending.vertices.len() + extra > MESHLET_MAX_VERTICES as usize
            || pending.triangles.len() >= MESHLET_MAX_TRIANGLES as usize
        {
            pending.flush(&mut used, vertices, out_meshlets, out_data);
        }

        let mut local = [0u8; 3];
        for (slot, &v) in local.iter_mut().zip(tri.iter()) {
            if used[v as usize] == UNUSED {
                used[v as usize] = pending.vertices.len() as u8;
                pending.vertices.push(v);
            }
            *slot = used[v as usize];
        }
        pending.triangles.push(local);
    }

    pending.flush(&mut used, vertices, out_meshlets, out_data);
    (out_meshlets.len() - before) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_grid(n: u32) -> (Vec<Vertex>, Vec<u32>) {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                vertices.push(Vertex::new(
                    [x as f32, y as f32, 0.0],
                    [0.0, 0.0, 1.0],
                    [x as f32 / n as f32, y as f32 / n as f32],
                ));
            }
        }
        for y in 0..n {
            for x in 0..n {
                let i = y * (n + 1) + x;
                indices.extend_from_slice(&[i, i + 1, i + n + 1]);
                indices.extend_from_slice(&[i + 1, i + n + 2, i + n + 1]);
            }
        }
        (vertices, indices)
    }

    #[test]
    fn respects_meshlet_limits() {
        let (vertices, indices) = quad_grid(16);
        let mut meshlets = Vec::new();
        let mut data = Vec::new();
        let count = build_meshlets(&vertices, &indices, &mut meshlets, &mut data);

        assert!(count > 1);
        let mut total_tris = 0;
        for m in &meshlets {
            assert!(m.vertex_count() <= MESHLET_MAX_VERTICES);
            assert!(m.triangle_count() <= MESHLET_MAX_TRIANGLES);
            assert!(m.triangle_count() > 0);
            total_tris += m.triangle_count();
        }
        assert_eq!(total_tris as usize, indices.len() / 3);
    }

    #[test]
    fn meshlet_data_round_trips_triangles() {
        let (vertices, indices) = quad_grid(4);
        let mut meshlets = Vec::new();
        let mut data = Vec::new();
        build_meshlets(&vertices, &indices, &mut meshlets, &mut data);

        // decode every triangle back through the packed representation
        let mut decoded = Vec::new();
        for m in &meshlets {
            let base = m.data_offset as usize;
            let vcount = m.vertex_count() as usize;
            for t in 0..m.triangle_count() as usize {
                let mut tri = [0u32; 3];
                for k in 0..3 {
                    let byte_index = t * 3 + k;
                    let word = data[base + vcount + byte_index / 4];
                    let local = (word >> ((byte_index % 4) * 8)) & 0xff;
                    tri[k] = data[base + local as usize];
                }
                decoded.push(tri);
            }
        }
        let expected: Vec<[u32; 3]> = indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn flat_grid_gets_tight_cone() {
        let (vertices, indices) = quad_grid(8);
        let mut meshlets = Vec::new();
        let mut data = Vec::new();
        build_meshlets(&vertices, &indices, &mut meshlets, &mut data);

        for m in &meshlets {
            let z = ((m.cone >> 16) & 0xff) as u8 as i8;
            let cutoff = ((m.cone >> 24) & 0xff) as u8 as i8;
            // all normals agree on +Z, so the axis is +Z and the cone is narrow
            assert_eq!(z, 127);
            assert!(cutoff <= 1);
        }
    }

    #[test]
    fn bounding_sphere_contains_cluster() {
        let (vertices, indices) = quad_grid(8);
        let mut meshlets = Vec::new();
        let mut data = Vec::new();
        build_meshlets(&vertices, &indices, &mut meshlets, &mut data);

        for m in &meshlets {
            let center = Vector3::from(m.center);
            for i in 0..m.vertex_count() as usize {
                let v = data[m.data_offset as usize + i];
                let p = Vector3::from(vertices[v as usize].position);
                assert!((p - center).magnitude() <= m.radius + 1e-3);
            }
        }
    }

    #[test]
    fn gpu_struct_size() {
        assert_eq!(std::mem::size_of::<Meshlet>(), 28);
    }
}
