/// GPU-driven renderer core
///
/// Visibility determination and draw submission run entirely on the GPU:
/// compute culling appends survivors to a command buffer through an atomic
/// counter, a finalize dispatch clamps the count into indirect arguments,
/// and the raster pass consumes them without CPU readback. A depth pyramid
/// rebuilt mid-frame feeds the occlusion tests; the early/late phase split
/// keeps results temporally stable.

pub mod composite;
pub mod culling;
pub mod frame;
pub mod gpu;
pub mod pipelines;
pub mod pyramid;
pub mod raster;
pub mod settings;
pub mod sync;
pub mod targets;

pub use culling::{CullData, CullDispatcher, CullPhase, VisibilityState};
pub use frame::{FrameOutcome, FrameScheduler};
pub use gpu::GpuContext;
pub use pipelines::ShaderPrograms;
pub use pyramid::DepthPyramid;
pub use raster::{RasterPass, RasterVariant};
pub use settings::RenderSettings;
pub use sync::{FrameGraph, PassNode};
pub use targets::RenderTargets;
