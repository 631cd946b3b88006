//! Errors raised by individual system probe queries.
//!
//! None of these reach the caller of `probe`: every failing query is
//! replaced by a sentinel value.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Query not supported on {platform}")]
    Unsupported { platform: &'static str },

    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Field '{field}' not found in {origin}")]
    FieldNotFound { field: String, origin: String },

    #[error("IO error while probing: {0}")]
    Io(#[from] std::io::Error),
}
