//! Engine error handling
//!
//! Single error enum for the crate. Recoverable conditions (a stale
//! presentation target, a clamped command buffer) are not errors and never
//! surface here; everything in this enum is fatal to the frame loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no compatible GPU adapter found")]
    AdapterNotFound,

    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("presentation target ran out of memory")]
    SurfaceOutOfMemory,

    #[error("gpu operation '{operation}' failed: {error}")]
    GpuOperationFailed { operation: String, error: String },

    #[error("failed to map GPU buffer: {buffer}")]
    BufferMap { buffer: String },

    #[error("unknown shader program '{name}'")]
    ProgramNotFound { name: String },

    #[error("invalid scene: {message}")]
    InvalidScene { message: String },

    #[error("invalid settings: {message}")]
    InvalidSettings { message: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Create a GPU operation error
pub fn gpu_operation_error(operation: &str, error: impl std::fmt::Display) -> EngineError {
    EngineError::GpuOperationFailed {
        operation: operation.to_string(),
        error: error.to_string(),
    }
}
