//! Command buffer wire formats
//!
//! These records are the bit-exact contract between the producing compute
//! stages and their consumers: `TaskCommand` flows from instance_cull to
//! cluster_cull, `MeshletDraw` from cluster_cull to the raster vertex
//! stage. The counter layouts put the atomic count in the first word and
//! the indirect arguments directly after it, so the finalize stage writes
//! arguments in place and the indirect draw/dispatch reads at offset 4.

use bytemuck::{Pod, Zeroable};

use crate::constants::culling::{MAX_DISPATCH_DIM, MAX_MESHLET_DRAWS, MAX_TASK_COMMANDS};

/// One surviving instance, pre-split into groups of TASK_GROUP_SIZE meshlets
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct TaskCommand {
    pub draw_id: u32,
    /// First meshlet of this group, absolute index into the meshlet table
    pub task_offset: u32,
    /// Meshlets in this group
    pub task_count: u32,
    /// Draw visibility bit observed when the command was emitted
    pub late_draw_visibility: u32,
    pub meshlet_visibility_offset: u32,
}

/// One visible meshlet instance, expanded by the raster vertex stage
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct MeshletDraw {
    pub draw_id: u32,
    /// Absolute index into the meshlet table
    pub meshlet_index: u32,
}

/// Atomic count followed by DispatchIndirect (x, y, z)
pub const TASK_COUNTER_BYTES: u64 = 16;
/// Atomic count followed by DrawIndirect (vertex/instance/first/first)
pub const MESHLET_COUNTER_BYTES: u64 = 20;
/// Indirect arguments start one word past the count
pub const INDIRECT_ARGS_OFFSET: u64 = 4;

pub const TASK_COMMAND_BUFFER_BYTES: u64 =
    MAX_TASK_COMMANDS as u64 * std::mem::size_of::<TaskCommand>() as u64;
pub const MESHLET_DRAW_BUFFER_BYTES: u64 =
    MAX_MESHLET_DRAWS as u64 * std::mem::size_of::<MeshletDraw>() as u64;

/// CPU mirror of finalize.wgsl's dispatch clamp: one cluster-cull workgroup
/// per task command, bounded by buffer capacity and the per-dimension
/// dispatch limit. Overflow degrades to dropped groups, never an error.
pub fn finalize_dispatch_count(raw_count: u32) -> u32 {
    raw_count.min(MAX_TASK_COMMANDS).min(MAX_DISPATCH_DIM)
}

/// CPU mirror of finalize.wgsl's draw clamp: one meshlet instance per
/// surviving cluster, bounded by the meshlet-draw buffer capacity.
pub fn finalize_draw_count(raw_count: u32) -> u32 {
    raw_count.min(MAX_MESHLET_DRAWS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalized_counts_never_exceed_capacity() {
        for raw in [0, 1, 17, MAX_DISPATCH_DIM, MAX_TASK_COMMANDS, u32::MAX] {
            assert!(finalize_dispatch_count(raw) <= MAX_TASK_COMMANDS);
            assert!(finalize_dispatch_count(raw) <= MAX_DISPATCH_DIM);
            assert!(finalize_draw_count(raw) <= MAX_MESHLET_DRAWS);
        }
    }

    #[test]
    fn small_counts_pass_through_unclamped() {
        assert_eq!(finalize_dispatch_count(0), 0);
        assert_eq!(finalize_dispatch_count(4097), 4097);
        assert_eq!(finalize_draw_count(123_456), 123_456);
    }

    #[test]
    fn wire_formats_match_wgsl() {
        assert_eq!(std::mem::size_of::<TaskCommand>(), 20);
        assert_eq!(std::mem::size_of::<MeshletDraw>(), 8);
    }
}
