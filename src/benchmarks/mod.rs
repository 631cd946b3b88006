//! Throughput benchmark suite.
//!
//! Every workload goes through the same [`measure`] protocol; the
//! [`SuiteRunner`] fixes the environment once and isolates each workload's
//! failures so a run always ends with four scores.

pub mod benchmark_errors;
pub mod benchmark_runner;
pub mod benchmark_types;
pub mod performance_metrics;
pub mod workloads;

pub use benchmark_errors::{BenchmarkError, BenchmarkResult};
pub use benchmark_runner::{
    ConfigLoader, Environment, NO_GPU, NO_TOOLKIT, RunEvent, SuiteReport, SuiteRunner,
};
pub use benchmark_types::{
    ConvStackConfig, MatMulConfig, Score, ScoreStatus, SuiteConfig, ThroughputUnit, TimingResults,
};
pub use performance_metrics::{FnOperation, Operation, TimingProtocol, measure, throughput};
pub use workloads::{
    Workload, WorkloadKind, checked_matmul_operation_count, matmul_operation_count,
};
