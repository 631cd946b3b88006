//! Sustained-throughput benchmark for CPU, GPU and neural-accelerator hardware.
//!
//! A run probes the host once, selects the best GPU backend, loads the neural
//! toolkit if present, and then measures four workloads with one shared timing
//! protocol: an FP32 matrix multiply on the CPU, an FP16 matrix multiply on the
//! GPU, and a convolution stack compiled for the neural accelerator at FP16 and
//! with INT8 weights. Any workload that cannot run yields an unavailable score.

pub mod activation;
pub mod backend;
pub mod benchmarks;
pub mod errors;
pub mod gpu;
pub mod model;
pub mod precision;
pub mod report;
pub mod system_probe;
pub mod toolkit;
pub mod utils;

pub use activation::Activation;
pub use backend::{Backend, BackendSelection};
pub use benchmarks::{Score, SuiteConfig, SuiteReport, SuiteRunner, WorkloadKind};
pub use precision::Precision;
pub use system_probe::SystemInfo;
