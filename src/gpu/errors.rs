//! GPU-specific error types for the compute benchmarks.

use thiserror::Error;

/// Errors specific to GPU device setup and dispatch.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("GPU device not available: {message}")]
    DeviceNotAvailable { message: String },

    #[error("Shader compilation failed: {message}")]
    ShaderCompilationFailed { message: String },

    #[error("Failed to create GPU buffers: {message}")]
    BufferCreationFailed { message: String },

    #[error("Buffer of {required} bytes exceeds GPU limit of {max_size} bytes")]
    BufferTooLarge { required: u64, max_size: u64 },

    #[error("Dispatch of {workgroups} workgroups per dimension exceeds limit {max}")]
    DispatchTooLarge { workgroups: u32, max: u32 },

    #[error("Matrix size must be greater than 0")]
    InvalidMatrixSize,

    /// An error raised by submitted work, reported at the next barrier.
    #[error("GPU execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Failed to map result buffer: {message}")]
    MapFailed { message: String },
}

pub type GpuResult<T> = std::result::Result<T, GpuError>;
