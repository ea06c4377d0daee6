use bytemuck::{Pod, Zeroable};

use crate::constants::culling::MAX_LOD_COUNT;
use crate::error::{EngineError, EngineResult};

/// Vertex layout shared by the meshlet-expansion vertex stage.
///
/// Scalar fields only so the storage-buffer stride matches the Rust layout
/// exactly (32 bytes, no vec3 padding).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// One level of detail: the source index range it was clustered from, the
/// meshlet range that renders it, and its object-space error.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct MeshLod {
    pub index_offset: u32,
    pub index_count: u32,
    pub meshlet_offset: u32,
    pub meshlet_count: u32,
    pub error: f32,
}

/// Mesh table entry: bounding sphere plus a fixed block of LOD slots.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Mesh {
    pub center: [f32; 3],
    pub radius: f32,
    pub lod_count: u32,
    pub lods: [MeshLod; MAX_LOD_COUNT],
}

/// Flat material table entry (no texture sampling in the core raster pass)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Material {
    pub albedo: [f32; 4],
    pub emissive: [f32; 3],
    pub _pad: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: [1.0, 1.0, 1.0, 1.0],
            emissive: [0.0; 3],
            _pad: 0.0,
        }
    }
}

/// Placed object instance. `meshlet_visibility_offset` is assigned during
/// scene finalization; the rest is immutable from construction.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshDraw {
    pub position: [f32; 3],
    pub scale: f32,
    pub orientation: [f32; 4],
    pub mesh_index: u32,
    pub meshlet_visibility_offset: u32,
    pub post_pass: u32,
    pub material_index: u32,
}

/// Reject LOD tables whose error thresholds regress.
pub fn validate_lod_errors(lods: &[MeshLod]) -> EngineResult<()> {
    if lods.is_empty() || lods.len() > MAX_LOD_COUNT {
        return Err(EngineError::InvalidScene {
            message: format!("mesh must have 1..={} LOD levels, got {}", MAX_LOD_COUNT, lods.len()),
        });
    }
    for pair in lods.windows(2) {
        if pair[1].error < pair[0].error {
            return Err(EngineError::InvalidScene {
                message: format!(
                    "LOD errors must be non-decreasing ({} after {})",
                    pair[1].error, pair[0].error
                ),
            });
        }
    }
    Ok(())
}

/// CPU mirror of the shader's LOD selection.
///
/// `threshold` is the acceptable object-space error at the instance's view
/// depth (`distance * lod_target / scale`); the selected level is the one
/// whose error lands closest to it, ties toward the finer level. With a
/// non-decreasing error table the result is monotone in distance.
pub fn select_lod(lods: &[MeshLod], lod_count: u32, threshold: f32) -> u32 {
    let count = (lod_count as usize).min(lods.len());
    let mut best = 0u32;
    let mut best_diff = f32::MAX;
    for (i, lod) in lods.iter().enumerate().take(count) {
        let diff = (lod.error - threshold).abs();
        if diff < best_diff {
            best_diff = diff;
            best = i as u32;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lod(error: f32) -> MeshLod {
        MeshLod {
            error,
            ..Default::default()
        }
    }

    #[test]
    fn lod_selection_matches_error_budget() {
        let lods = [lod(0.5), lod(2.0)];

        // Projected error budget under the 1px frame target keeps the fine level
        assert_eq!(select_lod(&lods, 2, 0.8), 0);
        // Past the midpoint the coarser level is the better match
        assert_eq!(select_lod(&lods, 2, 1.5), 1);
    }

    #[test]
    fn lod_selection_is_monotone_in_distance() {
        let lods = [lod(0.1), lod(0.4), lod(1.6), lod(6.4)];
        let mut last = 0;
        for step in 0..200 {
            let threshold = step as f32 * 0.05;
            let picked = select_lod(&lods, 4, threshold);
            assert!(picked >= last, "LOD regressed at threshold {}", threshold);
            last = picked;
        }
    }

    #[test]
    fn lod_selection_ignores_unused_slots() {
        let mut lods = [lod(0.5); MAX_LOD_COUNT];
        lods[1] = lod(1.0);
        // Slots past lod_count carry stale data and must not win
        lods[2] = lod(100.0);
        assert_eq!(select_lod(&lods, 2, 90.0), 1);
    }

    #[test]
    fn lod_error_validation() {
        assert!(validate_lod_errors(&[lod(0.5), lod(2.0)]).is_ok());
        assert!(validate_lod_errors(&[lod(2.0), lod(0.5)]).is_err());
        assert!(validate_lod_errors(&[]).is_err());
    }

    #[test]
    fn gpu_struct_sizes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::size_of::<MeshLod>(), 20);
        assert_eq!(std::mem::size_of::<Mesh>(), 20 + 20 * MAX_LOD_COUNT);
        assert_eq!(std::mem::size_of::<MeshDraw>(), 48);
        assert_eq!(std::mem::size_of::<Material>(), 32);
    }
}
