//! Tests for the shape-derived operation counts of each workload.

mod common;

use accel_bench::benchmarks::{SuiteConfig, Workload, WorkloadKind, matmul_operation_count};
use accel_bench::model::{ConvStackSpec, ModelBuilder};
use common::{CompileBehavior, MockRuntime};
use std::sync::Arc;

#[cfg(test)]
mod matmul_count_tests {
    use super::*;

    #[test]
    fn test_matmul_counts() {
        assert_eq!(matmul_operation_count(2), 16);
        assert_eq!(matmul_operation_count(2048), 17_179_869_184);
        assert_eq!(matmul_operation_count(4096), 137_438_953_472);
    }

    #[test]
    fn test_gpu_workload_uses_gpu_size() {
        let workload = Workload::from_config(WorkloadKind::MatMulFp16Gpu, &SuiteConfig::default());
        assert_eq!(workload.operation_count, 137_438_953_472);
        assert_eq!(workload.shape, vec![4096, 4096]);
        assert_eq!(workload.protocol.warmup_iters, 3);
        assert_eq!(workload.protocol.measure_iters, 20);
    }
}

#[cfg(test)]
mod conv_count_tests {
    use super::*;

    #[test]
    fn test_default_conv_stack_count() {
        assert_eq!(ConvStackSpec::default().operation_count(), 3_478_923_509_760);
    }

    #[test]
    fn test_conv_count_scales_linearly_with_layers_and_batch() {
        let base = ConvStackSpec {
            batch: 1,
            channels: 8,
            size: 4,
            kernel: 3,
            layers: 1,
            ..ConvStackSpec::default()
        };
        // 2 * 8 * 9 * 16 * 8
        assert_eq!(base.operation_count(), 18_432);

        let doubled = ConvStackSpec {
            batch: 2,
            layers: 3,
            ..base
        };
        assert_eq!(doubled.operation_count(), 6 * base.operation_count());
    }

    #[test]
    fn test_quantized_build_keeps_operation_count() {
        let spec = ConvStackSpec {
            batch: 1,
            channels: 8,
            size: 4,
            kernel: 3,
            layers: 2,
            ..ConvStackSpec::default()
        };
        let runtime = Arc::new(MockRuntime::new(CompileBehavior::Succeed));
        let builder = ModelBuilder::new(spec, Some(runtime.clone()));

        let fp16 = builder.build(false);
        let int8 = builder.build(true);
        assert!(fp16.is_built());
        assert!(int8.is_built());
        assert_eq!(fp16.operation_count(), spec.operation_count());
        assert_eq!(int8.operation_count(), fp16.operation_count());

        // 8 * 8 * 9 = 576 weights per layer, above the default threshold.
        assert_eq!(*runtime.compiled.lock().unwrap(), vec![0, 2]);
    }
}
