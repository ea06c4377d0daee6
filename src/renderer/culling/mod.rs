/// GPU culling
///
/// The produce/finalize pipeline that turns the instance array into a
/// clamped, indirect-consumable draw set:
///
/// - per-instance cull (frustum, LOD, pyramid occlusion) -> task commands
/// - finalize -> cluster-cull dispatch arguments
/// - per-meshlet cull (cone, frustum, occlusion, temporal bit) -> meshlet draws
/// - finalize -> raster draw arguments
///
/// Persistent visibility bitmasks bias both levels toward what was visible
/// last frame.

pub mod commands;
pub mod cull_data;
pub mod dispatcher;
pub mod finalize;
pub mod visibility;

pub use commands::{
    finalize_dispatch_count, finalize_draw_count, MeshletDraw, TaskCommand,
};
pub use cull_data::{
    frustum_visible, lod_threshold, project_sphere_bounds, sphere_closest_depth, CullData,
};
pub use dispatcher::{CullDispatcher, CullPhase};
pub use finalize::CommandFinalizer;
pub use visibility::{bitmask_words, VisibilityState};
