//! Procedural test geometry
//!
//! Scene construction is programmatic (asset import lives outside the
//! crate); these generators give the binaries and integration tests
//! something real to cull and draw. A UV sphere at decreasing segment
//! counts doubles as a natural LOD chain.

use std::f32::consts::PI;

use crate::scene::mesh::Vertex;

/// Unit cube centered at the origin, 24 vertices / 12 triangles
pub fn cube() -> (Vec<Vertex>, Vec<u32>) {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, tangent, bitangent) in faces {
        let base = vertices.len() as u32;
        for (u, v) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let position = [
                normal[0] * 0.5 + tangent[0] * u + bitangent[0] * v,
                normal[1] * 0.5 + tangent[1] * u + bitangent[1] * v,
                normal[2] * 0.5 + tangent[2] * u + bitangent[2] * v,
            ];
            vertices.push(Vertex::new(position, normal, [u + 0.5, v + 0.5]));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

/// UV sphere with `segments` longitudinal and `rings` latitudinal divisions
pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> (Vec<Vertex>, Vec<u32>) {
    assert!(segments >= 3 && rings >= 2);

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let phi = PI * ring as f32 / rings as f32;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for seg in 0..=segments {
            let theta = 2.0 * PI * seg as f32 / segments as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let n = [sin_phi * cos_theta, cos_phi, sin_phi * sin_theta];
            vertices.push(Vertex::new(
                [n[0] * radius, n[1] * radius, n[2] * radius],
                n,
                [
                    seg as f32 / segments as f32,
                    ring as f32 / rings as f32,
                ],
            ));
        }
    }

    let stride = segments + 1;
    for ring in 0..rings {
        for seg in 0..segments {
            let i = ring * stride + seg;
            indices.extend_from_slice(&[i, i + stride, i + 1]);
            indices.extend_from_slice(&[i + 1, i + stride, i + stride + 1]);
        }
    }

    (vertices, indices)
}
