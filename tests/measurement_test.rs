//! Tests for the warmup-then-measure protocol.

use accel_bench::benchmarks::{
    BenchmarkError, FnOperation, Operation, ThroughputUnit, TimingProtocol, measure,
};
use accel_bench::gpu::GpuError;
use accel_bench::toolkit::ToolkitError;
use std::time::Duration;

fn sleeping_op(millis: u64) -> FnOperation<impl FnMut() -> Result<(), BenchmarkError>> {
    FnOperation(move || {
        std::thread::sleep(Duration::from_millis(millis));
        Ok(())
    })
}

#[cfg(test)]
mod protocol_tests {
    use super::*;

    #[test]
    fn test_zero_measured_iterations_is_invalid() {
        let mut op = sleeping_op(0);
        let protocol = TimingProtocol {
            warmup_iters: 2,
            measure_iters: 0,
        };
        let result = measure("empty", &mut op, 1_000, ThroughputUnit::Gflops, protocol);
        assert!(matches!(
            result,
            Err(BenchmarkError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_score_independent_of_iteration_count() {
        let operation_count = 1_000_000_000;
        let run = |measure_iters| {
            let protocol = TimingProtocol {
                warmup_iters: 1,
                measure_iters,
            };
            measure(
                "sleep",
                &mut sleeping_op(2),
                operation_count,
                ThroughputUnit::Gflops,
                protocol,
            )
            .unwrap()
            .value
        };

        let short = run(5);
        let long = run(10);
        assert!(short > 0.0 && long > 0.0);
        let ratio = long / short;
        assert!(
            (0.8..=1.2).contains(&ratio),
            "doubling iterations changed the score: {} vs {}",
            short,
            long
        );
        // About 2 ms per call for 1e9 operations is at most 500 GFLOPS.
        assert!(short <= 500.0);
    }

    #[test]
    fn test_failing_operation_propagates() {
        let mut calls = 0;
        let mut op = FnOperation(|| {
            calls += 1;
            if calls > 2 {
                return Err(BenchmarkError::Toolkit(ToolkitError::CallFailed {
                    function: "ov_infer_request_infer",
                    status: -1,
                    message: "device lost".to_string(),
                }));
            }
            Ok(())
        });
        let protocol = TimingProtocol {
            warmup_iters: 1,
            measure_iters: 5,
        };
        let result = measure("flaky", &mut op, 10, ThroughputUnit::Tops, protocol);
        assert!(matches!(
            result,
            Err(BenchmarkError::Toolkit(ToolkitError::CallFailed { .. }))
        ));
    }

    #[test]
    fn test_synchronize_failure_propagates() {
        struct BrokenBarrier;

        impl Operation for BrokenBarrier {
            fn run(&mut self) -> Result<(), BenchmarkError> {
                Ok(())
            }

            fn synchronize(&mut self) -> Result<(), BenchmarkError> {
                Err(GpuError::ExecutionFailed {
                    message: "queue timed out".to_string(),
                }
                .into())
            }
        }

        let protocol = TimingProtocol {
            warmup_iters: 0,
            measure_iters: 1,
        };
        let result = measure("barrier", &mut BrokenBarrier, 10, ThroughputUnit::Tops, protocol);
        assert!(matches!(
            result,
            Err(BenchmarkError::Gpu(GpuError::ExecutionFailed { .. }))
        ));
    }
}
