//! Error types for the optional neural accelerator toolkit.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("Neural toolkit library not found (tried: {tried})")]
    LibraryNotFound { tried: String },

    #[error("Failed to load neural toolkit from '{path}': {source}")]
    LibraryLoad {
        path: String,
        #[source]
        source: libloading::Error,
    },

    #[error("Symbol '{symbol}' missing from neural toolkit: {source}")]
    MissingSymbol {
        symbol: String,
        #[source]
        source: libloading::Error,
    },

    #[error("Unsupported neural toolkit release '{version}'")]
    UnsupportedVersion { version: String },

    #[error("{function} failed with status {status}: {message}")]
    CallFailed {
        function: &'static str,
        status: i32,
        message: String,
    },

    #[error("Invalid model: {message}")]
    InvalidModel { message: String },

    #[error("Input size mismatch: expected {expected} elements, got {actual}")]
    InputSizeMismatch { expected: usize, actual: usize },
}

pub type ToolkitResult<T> = std::result::Result<T, ToolkitError>;
