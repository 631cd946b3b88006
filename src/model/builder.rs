//! Trace, optionally quantize, then compile the convolution stack.

use crate::errors::{ModelBuildError, ModelBuildResult};
use crate::model::conv_stack::ConvStackSpec;
use crate::model::quantize::{DEFAULT_WEIGHT_THRESHOLD, quantize_model};
use crate::toolkit::{CompiledModel, ComputeUnits, NeuralRuntime};
use half::f16;
use log::{info, warn};
use std::fmt;
use std::sync::Arc;

const DEFAULT_SEED: u64 = 0x5EED;

/// Result of a build: a runnable model, or the reason there is none.
pub enum BuildOutcome {
    Built {
        model: Box<dyn CompiledModel>,
        sample_input: Vec<f16>,
        operation_count: u64,
    },
    Unavailable {
        reason: ModelBuildError,
    },
}

impl BuildOutcome {
    /// Operation count of one inference; 0 when the build failed.
    pub fn operation_count(&self) -> u64 {
        match self {
            BuildOutcome::Built {
                operation_count, ..
            } => *operation_count,
            BuildOutcome::Unavailable { .. } => 0,
        }
    }

    pub fn is_built(&self) -> bool {
        matches!(self, BuildOutcome::Built { .. })
    }
}

impl fmt::Debug for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildOutcome::Built {
                model,
                sample_input,
                operation_count,
            } => f
                .debug_struct("Built")
                .field("device", &model.device())
                .field("input_len", &sample_input.len())
                .field("operation_count", operation_count)
                .finish(),
            BuildOutcome::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

pub struct ModelBuilder {
    spec: ConvStackSpec,
    runtime: Option<Arc<dyn NeuralRuntime>>,
    weight_threshold: usize,
    compute_units: ComputeUnits,
    seed: u64,
}

impl ModelBuilder {
    pub fn new(spec: ConvStackSpec, runtime: Option<Arc<dyn NeuralRuntime>>) -> Self {
        Self {
            spec,
            runtime,
            weight_threshold: DEFAULT_WEIGHT_THRESHOLD,
            compute_units: ComputeUnits::All,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_weight_threshold(mut self, threshold: usize) -> Self {
        self.weight_threshold = threshold;
        self
    }

    pub fn with_compute_units(mut self, units: ComputeUnits) -> Self {
        self.compute_units = units;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn spec(&self) -> &ConvStackSpec {
        &self.spec
    }

    /// Builds the stack. Every failure is captured in [`BuildOutcome::Unavailable`].
    pub fn build(&self, quantize: bool) -> BuildOutcome {
        match self.try_build(quantize) {
            Ok((model, sample_input)) => BuildOutcome::Built {
                model,
                sample_input,
                operation_count: self.spec.operation_count(),
            },
            Err(reason) => {
                warn!("Model build unavailable: {}", reason);
                BuildOutcome::Unavailable { reason }
            }
        }
    }

    fn try_build(&self, quantize: bool) -> ModelBuildResult<(Box<dyn CompiledModel>, Vec<f16>)> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or(ModelBuildError::ToolkitUnavailable)?;

        let mut traced = self.spec.trace(self.seed)?;
        if quantize {
            let converted = quantize_model(&mut traced, self.weight_threshold)?;
            info!(
                "Quantized {} of {} layers to INT8 (threshold {} elements)",
                converted,
                traced.layers.len(),
                self.weight_threshold
            );
        }

        let model = runtime.compile(&traced, self.compute_units)?;
        let sample_input = self.spec.sample_input(self.seed.wrapping_add(u64::MAX / 2));
        Ok((model, sample_input))
    }
}
