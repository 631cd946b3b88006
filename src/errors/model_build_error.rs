//! Errors raised while tracing, quantizing or compiling the convolution stack.

use crate::model::quantize::QuantizeError;
use crate::toolkit::ToolkitError;
use thiserror::Error;

/// Reasons a model build ends up unavailable.
#[derive(Error, Debug)]
pub enum ModelBuildError {
    #[error("Neural toolkit not available")]
    ToolkitUnavailable,

    #[error("Invalid topology: {message}")]
    InvalidTopology { message: String },

    #[error("Tracing failed: {message}")]
    TraceFailed { message: String },

    #[error("Quantization failed for layer {layer}: {source}")]
    QuantizationFailed {
        layer: usize,
        #[source]
        source: QuantizeError,
    },

    #[error("Compilation failed: {0}")]
    CompileFailed(#[from] ToolkitError),
}

impl ModelBuildError {
    pub(crate) fn topology(message: impl Into<String>) -> Self {
        ModelBuildError::InvalidTopology {
            message: message.into(),
        }
    }
}
