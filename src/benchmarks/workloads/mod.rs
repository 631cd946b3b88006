//! The four workloads of a run and their per-variant parameters.
//!
//! [`WorkloadKind`] is the tag; [`Workload`] pairs it with the shape-derived
//! operation count and the timing protocol from the configuration. The
//! operations themselves live in the submodules.

pub mod conv_stack;
pub mod cpu_matmul;
pub mod gpu_matmul;

pub use conv_stack::ConvStackInference;
pub use cpu_matmul::CpuMatMul;
pub use gpu_matmul::GpuMatMulOperation;

use super::benchmark_errors::{BenchmarkError, BenchmarkResult};
use super::benchmark_types::{SuiteConfig, ThroughputUnit};
use super::performance_metrics::TimingProtocol;
use crate::backend::Backend;
use crate::precision::Precision;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    MatMulFp32Cpu,
    MatMulFp16Gpu,
    ConvStackFp16,
    ConvStackInt8,
}

impl WorkloadKind {
    /// Every workload in run order.
    pub const ALL: [WorkloadKind; 4] = [
        WorkloadKind::MatMulFp32Cpu,
        WorkloadKind::MatMulFp16Gpu,
        WorkloadKind::ConvStackFp16,
        WorkloadKind::ConvStackInt8,
    ];

    /// Name accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            WorkloadKind::MatMulFp32Cpu => "cpu",
            WorkloadKind::MatMulFp16Gpu => "gpu",
            WorkloadKind::ConvStackFp16 => "npu-fp16",
            WorkloadKind::ConvStackInt8 => "npu-int8",
        }
    }

    pub fn from_name(name: &str) -> BenchmarkResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| BenchmarkError::UnknownWorkload {
                name: name.to_string(),
            })
    }

    pub fn description(self) -> &'static str {
        match self {
            WorkloadKind::MatMulFp32Cpu => "FP32 matrix multiply on all CPU cores",
            WorkloadKind::MatMulFp16Gpu => "FP16 matrix multiply on the selected GPU",
            WorkloadKind::ConvStackFp16 => "FP16 convolution stack on the neural toolkit",
            WorkloadKind::ConvStackInt8 => "INT8-weight (W8A16) convolution stack on the neural toolkit",
        }
    }

    /// Label used in progress lines and scores.
    pub fn label(self) -> String {
        match self {
            WorkloadKind::MatMulFp32Cpu => format!("CPU BASELINE ({})", self.precision()),
            WorkloadKind::MatMulFp16Gpu => format!("GPU COMPUTE ({})", self.precision()),
            WorkloadKind::ConvStackFp16 | WorkloadKind::ConvStackInt8 => {
                format!("NPU NEURAL ({})", self.precision())
            }
        }
    }

    /// Precision the workload is configured for.
    pub fn precision(self) -> Precision {
        match self {
            WorkloadKind::MatMulFp32Cpu => Precision::Fp32,
            WorkloadKind::MatMulFp16Gpu | WorkloadKind::ConvStackFp16 => Precision::Fp16,
            WorkloadKind::ConvStackInt8 => Precision::Int8,
        }
    }

    pub fn unit(self) -> ThroughputUnit {
        match self {
            WorkloadKind::MatMulFp32Cpu => ThroughputUnit::Gflops,
            _ => ThroughputUnit::Tops,
        }
    }

    /// Backend family the workload needs.
    pub fn backend(self) -> Backend {
        match self {
            WorkloadKind::MatMulFp32Cpu => Backend::Cpu,
            WorkloadKind::MatMulFp16Gpu => Backend::GenericParallel,
            WorkloadKind::ConvStackFp16 | WorkloadKind::ConvStackInt8 => Backend::NeuralAccelerator,
        }
    }

    pub fn is_npu(self) -> bool {
        self.backend() == Backend::NeuralAccelerator
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// `2 * n^3` multiply-adds of an `n x n` by `n x n` product, saturating at
/// `u64::MAX`. Validated configurations never reach the bound.
pub fn matmul_operation_count(n: u64) -> u64 {
    checked_matmul_operation_count(n).unwrap_or(u64::MAX)
}

/// `2 * n^3`, or `None` when it does not fit in a `u64`.
pub fn checked_matmul_operation_count(n: u64) -> Option<u64> {
    n.checked_mul(n)?.checked_mul(n)?.checked_mul(2)
}

/// A workload variant with its shape-derived parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    pub kind: WorkloadKind,
    pub operation_count: u64,
    pub protocol: TimingProtocol,
    pub shape: Vec<usize>,
}

impl Workload {
    pub fn from_config(kind: WorkloadKind, config: &SuiteConfig) -> Self {
        match kind {
            WorkloadKind::MatMulFp32Cpu | WorkloadKind::MatMulFp16Gpu => {
                let matmul = if kind == WorkloadKind::MatMulFp32Cpu {
                    config.cpu
                } else {
                    config.gpu
                };
                let n = matmul.matrix_size;
                Self {
                    kind,
                    operation_count: matmul_operation_count(n as u64),
                    protocol: TimingProtocol {
                        warmup_iters: matmul.warmup_iters,
                        measure_iters: matmul.measure_iters,
                    },
                    shape: vec![n, n],
                }
            }
            WorkloadKind::ConvStackFp16 | WorkloadKind::ConvStackInt8 => {
                let spec = config.npu.spec();
                Self {
                    kind,
                    // Same logical count for both precisions.
                    operation_count: spec.operation_count(),
                    protocol: TimingProtocol {
                        warmup_iters: config.npu.warmup_iters,
                        measure_iters: config.npu.measure_iters,
                    },
                    shape: spec.input_shape().to_vec(),
                }
            }
        }
    }
}
