//! Error types shared across the benchmark library.
//!
//! Subsystems with a native boundary keep their own error enum next to the code
//! (`gpu::errors`, `toolkit::errors`, `benchmarks::benchmark_errors`). The types
//! here cover hardware probing and model construction.

mod model_build_error;
mod probe_error;

pub use model_build_error::ModelBuildError;
pub use probe_error::ProbeError;

/// Result type alias for probe sub-queries.
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Result type alias for model construction steps.
pub type ModelBuildResult<T> = std::result::Result<T, ModelBuildError>;
