//! Tests for building the convolution stack against a neural runtime.

mod common;

use accel_bench::errors::ModelBuildError;
use accel_bench::model::{BuildOutcome, ConvStackSpec, ModelBuilder, quantize_model};
use accel_bench::toolkit::{ComputeUnits, NeuralRuntime};
use common::{CompileBehavior, MockRuntime};
use std::sync::Arc;

fn small_spec() -> ConvStackSpec {
    ConvStackSpec {
        batch: 1,
        channels: 8,
        size: 4,
        kernel: 3,
        layers: 3,
        ..ConvStackSpec::default()
    }
}

#[cfg(test)]
mod builder_tests {
    use super::*;

    #[test]
    fn test_no_runtime_is_unavailable() {
        let outcome = ModelBuilder::new(small_spec(), None).build(false);
        assert_eq!(outcome.operation_count(), 0);
        assert!(matches!(
            outcome,
            BuildOutcome::Unavailable {
                reason: ModelBuildError::ToolkitUnavailable
            }
        ));
    }

    #[test]
    fn test_compile_failure_is_unavailable() {
        let runtime: Arc<dyn NeuralRuntime> = Arc::new(MockRuntime::new(CompileBehavior::Fail));
        let outcome = ModelBuilder::new(small_spec(), Some(runtime)).build(true);
        assert!(!outcome.is_built());
        assert!(matches!(
            outcome,
            BuildOutcome::Unavailable {
                reason: ModelBuildError::CompileFailed(_)
            }
        ));
    }

    #[test]
    fn test_invalid_topology_is_unavailable() {
        let runtime: Arc<dyn NeuralRuntime> = Arc::new(MockRuntime::new(CompileBehavior::Succeed));
        let spec = ConvStackSpec {
            channels: 0,
            ..small_spec()
        };
        let outcome = ModelBuilder::new(spec, Some(runtime)).build(false);
        assert!(matches!(
            outcome,
            BuildOutcome::Unavailable {
                reason: ModelBuildError::InvalidTopology { .. }
            }
        ));
    }

    #[test]
    fn test_built_model_accepts_sample_input() {
        let runtime: Arc<dyn NeuralRuntime> = Arc::new(MockRuntime::new(CompileBehavior::Succeed));
        let outcome = ModelBuilder::new(small_spec(), Some(runtime))
            .with_compute_units(ComputeUnits::CpuOnly)
            .with_seed(7)
            .build(false);

        match outcome {
            BuildOutcome::Built {
                mut model,
                sample_input,
                operation_count,
            } => {
                assert_eq!(model.device(), "CPU");
                assert_eq!(sample_input.len(), small_spec().input_len());
                assert_eq!(model.input_len(), sample_input.len());
                assert_eq!(operation_count, small_spec().operation_count());
                model.predict(&sample_input).unwrap();
                assert!(model.set_input(&sample_input[1..]).is_err());
            }
            BuildOutcome::Unavailable { reason } => panic!("build failed: {}", reason),
        }
    }

    #[test]
    fn test_threshold_controls_quantized_layers() {
        let runtime = Arc::new(MockRuntime::new(CompileBehavior::Succeed));
        let shared: Arc<dyn NeuralRuntime> = runtime.clone();

        // 576 weights per layer: quantized at 512, kept in FP16 at 1024.
        ModelBuilder::new(small_spec(), Some(shared.clone())).build(true);
        ModelBuilder::new(small_spec(), Some(shared))
            .with_weight_threshold(1024)
            .build(true);
        assert_eq!(*runtime.compiled.lock().unwrap(), vec![3, 0]);
    }

    #[test]
    fn test_quantize_is_deterministic_per_seed() {
        let mut first = small_spec().trace(11).unwrap();
        let mut second = small_spec().trace(11).unwrap();
        assert_eq!(quantize_model(&mut first, 512).unwrap(), 3);
        quantize_model(&mut second, 512).unwrap();
        assert_eq!(first, second);
        assert_ne!(small_spec().trace(12).unwrap(), small_spec().trace(11).unwrap());
    }
}
