//! Error types for benchmark configuration and measurement.

use crate::gpu::GpuError;
use crate::toolkit::ToolkitError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error("Failed to parse configuration file '{path}': {source}")]
    ConfigParseError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Configuration validation error for field '{field}': {message}")]
    InvalidConfiguration { field: String, message: String },

    #[error("Unknown workload '{name}'. Supported: cpu, gpu, npu-fp16, npu-int8")]
    UnknownWorkload { name: String },

    #[error("Timer resolution too coarse: {iterations} iterations completed in zero time")]
    TimerResolution { iterations: u32 },

    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    #[error("Neural toolkit error: {0}")]
    Toolkit(#[from] ToolkitError),
}

impl BenchmarkError {
    pub(crate) fn invalid(field: &str, message: &str) -> Self {
        BenchmarkError::InvalidConfiguration {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

pub type BenchmarkResult<T> = Result<T, BenchmarkError>;
