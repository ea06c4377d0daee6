// Engine-wide constants
//
// Both CPU and GPU code derive from these values: build.rs mirrors the
// culling limits into shaders/generated/constants.wgsl, and the layout
// tests assert the Rust structs match the WGSL declarations.

/// Meshlet and culling limits shared with the shaders
pub mod culling {
    /// Maximum vertices referenced by a single meshlet
    pub const MESHLET_MAX_VERTICES: u32 = 64;
    /// Maximum triangles in a single meshlet
    pub const MESHLET_MAX_TRIANGLES: u32 = 64;
    /// Meshlets processed per task command (one cluster-cull workgroup)
    pub const TASK_GROUP_SIZE: u32 = 64;
    /// Instance-cull workgroup width
    pub const CULL_WORKGROUP_SIZE: u32 = 64;
    /// Static capacity of the task-command buffer
    pub const MAX_TASK_COMMANDS: u32 = 1 << 17;
    /// Static capacity of the meshlet-draw buffer
    pub const MAX_MESHLET_DRAWS: u32 = 1 << 20;
    /// wgpu limit on workgroups per dispatch dimension
    pub const MAX_DISPATCH_DIM: u32 = 65_535;
    /// Fixed LOD slots per mesh
    pub const MAX_LOD_COUNT: usize = 8;
}

/// Frame sequencing limits
pub mod frame {
    /// Depth pyramid mip views kept per resolution
    pub const MAX_PYRAMID_LEVELS: usize = 16;
    /// Gbuffer color attachments (albedo, packed normal)
    pub const GBUFFER_COUNT: usize = 2;
}
