//! Benchmark type definitions and configuration structures.

use super::benchmark_errors::{BenchmarkError, BenchmarkResult};
use super::workloads::checked_matmul_operation_count;
use crate::activation::Activation;
use crate::model::{ConvStackSpec, DEFAULT_WEIGHT_THRESHOLD};
use crate::toolkit::ComputeUnits;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for a square matrix-multiply workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatMulConfig {
    pub matrix_size: usize,
    pub warmup_iters: u32,
    pub measure_iters: u32,
}

impl MatMulConfig {
    /// 2048 x 2048 FP32 on the CPU, 1 warmup + 10 timed iterations
    pub fn cpu_default() -> Self {
        Self {
            matrix_size: 2048,
            warmup_iters: 1,
            measure_iters: 10,
        }
    }

    /// 4096 x 4096 FP16 on the GPU, 3 warmup + 20 timed iterations
    pub fn gpu_default() -> Self {
        Self {
            matrix_size: 4096,
            warmup_iters: 3,
            measure_iters: 20,
        }
    }

    /// Validates the configuration
    pub fn validate(&self, section: &str) -> BenchmarkResult<()> {
        if self.matrix_size == 0 {
            return Err(BenchmarkError::invalid(
                &format!("{}.matrix_size", section),
                "Matrix size must be greater than 0",
            ));
        }
        if self.measure_iters == 0 {
            return Err(BenchmarkError::invalid(
                &format!("{}.measure_iters", section),
                "At least one measured iteration is required",
            ));
        }
        if checked_matmul_operation_count(self.matrix_size as u64).is_none() {
            return Err(BenchmarkError::invalid(
                &format!("{}.matrix_size", section),
                "Operation count overflows u64",
            ));
        }
        Ok(())
    }
}

/// Configuration for the neural accelerator convolution stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvStackConfig {
    pub batch: usize,
    pub channels: usize,
    pub size: usize,
    pub kernel: usize,
    pub layers: usize,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default = "default_weight_threshold")]
    pub weight_threshold: usize,
    #[serde(default)]
    pub compute_units: ComputeUnits,
    pub warmup_iters: u32,
    pub measure_iters: u32,
}

fn default_weight_threshold() -> usize {
    DEFAULT_WEIGHT_THRESHOLD
}

impl Default for ConvStackConfig {
    fn default() -> Self {
        let spec = ConvStackSpec::default();
        Self {
            batch: spec.batch,
            channels: spec.channels,
            size: spec.size,
            kernel: spec.kernel,
            layers: spec.layers,
            activation: spec.activation,
            weight_threshold: DEFAULT_WEIGHT_THRESHOLD,
            compute_units: ComputeUnits::All,
            warmup_iters: 5,
            measure_iters: 15,
        }
    }
}

impl ConvStackConfig {
    pub fn spec(&self) -> ConvStackSpec {
        ConvStackSpec {
            batch: self.batch,
            channels: self.channels,
            size: self.size,
            kernel: self.kernel,
            layers: self.layers,
            activation: self.activation,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> BenchmarkResult<()> {
        let dims = [
            ("npu.batch", self.batch),
            ("npu.channels", self.channels),
            ("npu.size", self.size),
            ("npu.kernel", self.kernel),
            ("npu.layers", self.layers),
        ];
        for (field, value) in dims {
            if value == 0 {
                return Err(BenchmarkError::invalid(field, "Must be greater than 0"));
            }
        }
        if self.kernel % 2 == 0 {
            return Err(BenchmarkError::invalid(
                "npu.kernel",
                "Kernel must be odd so that same padding preserves the spatial size",
            ));
        }
        if self.measure_iters == 0 {
            return Err(BenchmarkError::invalid(
                "npu.measure_iters",
                "At least one measured iteration is required",
            ));
        }
        if self.spec().checked_operation_count().is_none() {
            return Err(BenchmarkError::invalid("npu", "Operation count overflows u64"));
        }
        Ok(())
    }
}

/// Per-workload parameter table for a full run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    pub cpu: MatMulConfig,
    pub gpu: MatMulConfig,
    pub npu: ConvStackConfig,
    /// Explicit path of the neural toolkit shared library.
    pub toolkit_library: Option<String>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            cpu: MatMulConfig::cpu_default(),
            gpu: MatMulConfig::gpu_default(),
            npu: ConvStackConfig::default(),
            toolkit_library: None,
        }
    }
}

impl SuiteConfig {
    /// Validates the configuration
    pub fn validate(&self) -> BenchmarkResult<()> {
        self.cpu.validate("cpu")?;
        self.gpu.validate("gpu")?;
        self.npu.validate()
    }
}

/// Reporting unit of a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThroughputUnit {
    Gflops,
    Tops,
}

impl ThroughputUnit {
    /// Operations per second in one unit.
    pub fn divisor(self) -> f64 {
        match self {
            ThroughputUnit::Gflops => 1e9,
            ThroughputUnit::Tops => 1e12,
        }
    }
}

impl fmt::Display for ThroughputUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThroughputUnit::Gflops => write!(f, "GFLOPS"),
            ThroughputUnit::Tops => write!(f, "TOPS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreStatus {
    Measured,
    Unavailable { reason: String },
}

/// Throughput of one workload
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub label: String,
    pub unit: ThroughputUnit,
    pub value: f64,
    pub status: ScoreStatus,
}

impl Score {
    pub fn measured(label: &str, unit: ThroughputUnit, value: f64) -> Self {
        Self {
            label: label.to_string(),
            unit,
            value: if value.is_finite() { value.max(0.0) } else { 0.0 },
            status: ScoreStatus::Measured,
        }
    }

    /// A zero score flagged as unavailable.
    pub fn unavailable(label: &str, unit: ThroughputUnit, reason: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            unit,
            value: 0.0,
            status: ScoreStatus::Unavailable {
                reason: reason.into(),
            },
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == ScoreStatus::Measured
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.status {
            ScoreStatus::Measured => None,
            ScoreStatus::Unavailable { reason } => Some(reason),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            ScoreStatus::Measured => write!(f, "{:.2} {}", self.value, self.unit),
            ScoreStatus::Unavailable { .. } => write!(f, "unavailable"),
        }
    }
}

/// Raw timing of a measured loop
#[derive(Debug, Clone)]
pub struct TimingResults {
    pub label: String,
    pub total_time_ns: u128,
    pub average_time_ns: u128,
    pub average_time_ms: f64,
    pub iterations: u32,
}

impl TimingResults {
    pub fn new(label: String, total_time_ns: u128, iterations: u32) -> Self {
        let average_time_ns = total_time_ns / iterations.max(1) as u128;
        let average_time_ms = average_time_ns as f64 / 1_000_000.0;

        Self {
            label,
            total_time_ns,
            average_time_ns,
            average_time_ms,
            iterations,
        }
    }
}
