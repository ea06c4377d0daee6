pub mod camera;
pub mod constants;
pub mod error;
pub mod renderer;
pub mod scene;

pub use camera::Camera;
pub use error::{EngineError, EngineResult};
pub use renderer::{FrameOutcome, FrameScheduler, GpuContext, RenderSettings};
pub use scene::{InstanceDesc, LodSource, Material, Scene, SceneBuffers, Vertex};
