//! Core benchmark execution logic.

use super::benchmark_errors::{BenchmarkError, BenchmarkResult};
use super::benchmark_types::{Score, SuiteConfig};
use super::performance_metrics::measure;
use super::workloads::{
    ConvStackInference, CpuMatMul, GpuMatMulOperation, Workload, WorkloadKind,
};
use crate::backend::{self, BackendSelection};
use crate::gpu::{GpuContext, GpuMatMul};
use crate::model::{BuildOutcome, ModelBuilder};
use crate::system_probe::{self, SystemInfo};
use crate::toolkit::{self, NeuralRuntime};
use log::{error, info, warn};
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Reason reported for NPU workloads when the toolkit did not load.
pub const NO_TOOLKIT: &str = "neural toolkit not available";
/// Reason reported for the GPU workload when selection fell back to the CPU.
pub const NO_GPU: &str = "no GPU backend selected";

const OPERAND_SEED: u64 = 42;

/// Configuration loader that handles JSON files with fallbacks
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a configuration file with fallback to defaults
    pub fn load_config<T>(path: &str, config_name: &str) -> BenchmarkResult<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| BenchmarkError::ConfigParseError {
                    path: path.to_string(),
                    source: e,
                })
            }
            Err(_) => {
                warn!(
                    "Config file '{}' not found, using default configuration for {}",
                    path, config_name
                );
                Ok(T::default())
            }
        }
    }

    /// Load and validate the suite configuration
    pub fn load_suite_config(path: &str) -> BenchmarkResult<SuiteConfig> {
        let config: SuiteConfig = Self::load_config(path, "suite")?;
        config.validate()?;
        Ok(config)
    }
}

/// Execution context fixed once before any workload runs.
pub struct Environment {
    pub system: SystemInfo,
    pub selection: BackendSelection,
    pub runtime: Option<Arc<dyn NeuralRuntime>>,
}

impl Environment {
    /// Probes the live machine: toolkit load, backend selection, system facts.
    pub fn detect(config: &SuiteConfig) -> Self {
        toolkit::init(config.toolkit_library.as_deref());
        let runtime = toolkit::runtime();
        let selection = backend::select();
        let system = system_probe::probe(&selection.display_name(), runtime.is_some());
        Self {
            system,
            selection,
            runtime,
        }
    }

    /// No GPU adapter and no neural toolkit.
    pub fn cpu_only() -> Self {
        Self {
            system: system_probe::probe("CPU", false),
            selection: BackendSelection::cpu_only(),
            runtime: None,
        }
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn NeuralRuntime>) -> Self {
        self.system.neural_toolkit = true;
        self.runtime = Some(runtime);
        self
    }
}

/// Progress notifications emitted while a suite runs.
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    Started {
        index: usize,
        kind: WorkloadKind,
        label: &'a str,
    },
    Quantizing {
        kind: WorkloadKind,
    },
    Finished {
        kind: WorkloadKind,
        score: &'a Score,
    },
}

/// Scores of a run, in run order.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub system: SystemInfo,
    pub scores: Vec<(WorkloadKind, Score)>,
}

impl SuiteReport {
    pub fn score(&self, kind: WorkloadKind) -> Option<&Score> {
        self.scores
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, score)| score)
    }

    pub fn available_count(&self) -> usize {
        self.scores
            .iter()
            .filter(|(_, score)| score.is_available())
            .count()
    }
}

/// Runs workloads one at a time against a fixed environment.
pub struct SuiteRunner {
    env: Environment,
    config: SuiteConfig,
}

impl SuiteRunner {
    pub fn new(env: Environment, config: SuiteConfig) -> BenchmarkResult<Self> {
        config.validate()?;
        Ok(Self { env, config })
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Runs every workload in order.
    pub fn run_all(&self) -> SuiteReport {
        self.run_all_with(|_| {})
    }

    pub fn run_all_with<F>(&self, observer: F) -> SuiteReport
    where
        F: FnMut(RunEvent<'_>),
    {
        self.run_selected_with(&WorkloadKind::ALL, observer)
    }

    /// Runs `kinds` in the given order.
    pub fn run_selected_with<F>(&self, kinds: &[WorkloadKind], mut observer: F) -> SuiteReport
    where
        F: FnMut(RunEvent<'_>),
    {
        info!("Starting benchmark suite ({} workloads)", kinds.len());
        let mut scores = Vec::with_capacity(kinds.len());
        for (index, &kind) in kinds.iter().enumerate() {
            let label = self.label_for(kind);
            observer(RunEvent::Started {
                index: index + 1,
                kind,
                label: &label,
            });
            let score = self.run_workload_with(kind, &mut observer);
            observer(RunEvent::Finished {
                kind,
                score: &score,
            });
            scores.push((kind, score));
        }

        SuiteReport {
            system: self.env.system.clone(),
            scores,
        }
    }

    /// Runs one workload. Never fails: errors and panics become unavailable scores.
    pub fn run_workload(&self, kind: WorkloadKind) -> Score {
        self.run_workload_with(kind, &mut |_| {})
    }

    fn run_workload_with(&self, kind: WorkloadKind, observer: &mut dyn FnMut(RunEvent<'_>)) -> Score {
        let label = self.label_for(kind);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(kind, &label, observer)));

        match outcome {
            Ok(Ok(score)) => score,
            Ok(Err(e)) => {
                error!("{} failed: {}", label, e);
                Score::unavailable(&label, kind.unit(), e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("{} panicked: {}", label, message);
                Score::unavailable(&label, kind.unit(), format!("panicked: {}", message))
            }
        }
    }

    fn label_for(&self, kind: WorkloadKind) -> String {
        match (kind, self.env.selection.summary()) {
            (WorkloadKind::MatMulFp16Gpu, Some(summary)) => {
                format!("GPU {} ({})", summary.api.name(), kind.precision())
            }
            _ => kind.label(),
        }
    }

    fn execute(
        &self,
        kind: WorkloadKind,
        label: &str,
        observer: &mut dyn FnMut(RunEvent<'_>),
    ) -> BenchmarkResult<Score> {
        let workload = Workload::from_config(kind, &self.config);
        let unit = kind.unit();

        match kind {
            WorkloadKind::MatMulFp32Cpu => {
                let mut op = CpuMatMul::new(self.config.cpu.matrix_size, OPERAND_SEED);
                measure(label, &mut op, workload.operation_count, unit, workload.protocol)
            }
            WorkloadKind::MatMulFp16Gpu => {
                let adapter = match self.env.selection.adapter() {
                    Some(adapter) if self.env.selection.backend().is_gpu() => adapter,
                    _ => {
                        info!("Skipping {}: {}", label, NO_GPU);
                        return Ok(Score::unavailable(label, unit, NO_GPU));
                    }
                };
                let size = u32::try_from(self.config.gpu.matrix_size).map_err(|_| {
                    BenchmarkError::invalid("gpu.matrix_size", "Matrix size does not fit in u32")
                })?;

                let context = GpuContext::from_adapter(adapter, true)?;
                let matmul = GpuMatMul::new(context, size, OPERAND_SEED)?;
                // Records the precision actually used after any FP32 fallback.
                let label = match self.env.selection.summary() {
                    Some(summary) => format!("GPU {} ({})", summary.api.name(), matmul.precision()),
                    None => label.to_string(),
                };
                let mut op = GpuMatMulOperation::new(matmul);
                measure(&label, &mut op, workload.operation_count, unit, workload.protocol)
            }
            WorkloadKind::ConvStackFp16 | WorkloadKind::ConvStackInt8 => {
                let Some(runtime) = &self.env.runtime else {
                    info!("Skipping {}: {}", label, NO_TOOLKIT);
                    return Ok(Score::unavailable(label, unit, NO_TOOLKIT));
                };

                let quantize = kind == WorkloadKind::ConvStackInt8;
                if quantize {
                    observer(RunEvent::Quantizing { kind });
                }

                let builder = ModelBuilder::new(self.config.npu.spec(), Some(Arc::clone(runtime)))
                    .with_weight_threshold(self.config.npu.weight_threshold)
                    .with_compute_units(self.config.npu.compute_units);

                match builder.build(quantize) {
                    BuildOutcome::Built {
                        model,
                        sample_input,
                        operation_count,
                    } => {
                        let mut op = ConvStackInference::new(model, &sample_input)?;
                        info!("{} running on {}", label, op.device());
                        measure(label, &mut op, operation_count, unit, workload.protocol)
                    }
                    BuildOutcome::Unavailable { reason } => {
                        Ok(Score::unavailable(label, unit, reason.to_string()))
                    }
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload = panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 1");
    }

    #[test]
    fn test_runner_rejects_invalid_config() {
        let mut config = SuiteConfig::default();
        config.cpu.measure_iters = 0;
        assert!(SuiteRunner::new(Environment::cpu_only(), config).is_err());
    }
}
