//! End-to-end suite runs against CPU-only and mocked environments.

mod common;

use accel_bench::benchmarks::{
    Environment, NO_GPU, NO_TOOLKIT, RunEvent, SuiteRunner, ThroughputUnit, WorkloadKind,
};
use common::{CompileBehavior, INFERENCES_BEFORE_LOSS, MockRuntime, small_config};
use std::sync::Arc;

fn runner_with(behavior: Option<CompileBehavior>) -> SuiteRunner {
    let env = match behavior {
        Some(behavior) => Environment::cpu_only().with_runtime(Arc::new(MockRuntime::new(behavior))),
        None => Environment::cpu_only(),
    };
    SuiteRunner::new(env, small_config()).unwrap()
}

#[cfg(test)]
mod cpu_only_tests {
    use super::*;

    #[test]
    fn test_cpu_only_run_reports_four_scores() {
        let report = runner_with(None).run_all();

        assert_eq!(report.scores.len(), 4);
        let kinds: Vec<_> = report.scores.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(kinds, WorkloadKind::ALL.to_vec());
        assert_eq!(report.available_count(), 1);

        let cpu = report.score(WorkloadKind::MatMulFp32Cpu).unwrap();
        assert!(cpu.is_available());
        assert!(cpu.value > 0.0);
        assert_eq!(cpu.unit, ThroughputUnit::Gflops);

        let gpu = report.score(WorkloadKind::MatMulFp16Gpu).unwrap();
        assert_eq!(gpu.unavailable_reason(), Some(NO_GPU));
        assert_eq!(gpu.value, 0.0);

        for kind in [WorkloadKind::ConvStackFp16, WorkloadKind::ConvStackInt8] {
            let score = report.score(kind).unwrap();
            assert_eq!(score.unavailable_reason(), Some(NO_TOOLKIT));
            assert_eq!(score.unit, ThroughputUnit::Tops);
        }
        assert_eq!(report.system.npu_summary(), "Disabled");
    }

    #[test]
    fn test_events_arrive_in_order() {
        let mut events = Vec::new();
        runner_with(None).run_all_with(|event| {
            let tag = match event {
                RunEvent::Started { index, .. } => format!("start {}", index),
                RunEvent::Quantizing { .. } => "quantize".to_string(),
                RunEvent::Finished { kind, .. } => format!("finish {}", kind),
            };
            events.push(tag);
        });
        assert_eq!(
            events,
            vec![
                "start 1",
                "finish cpu",
                "start 2",
                "finish gpu",
                "start 3",
                "finish npu-fp16",
                "start 4",
                "finish npu-int8",
            ]
        );
    }
}

#[cfg(test)]
mod neural_runtime_tests {
    use super::*;

    #[test]
    fn test_mock_runtime_measures_both_precisions() {
        let runner = runner_with(Some(CompileBehavior::Succeed));
        let mut quantize_events = 0;
        let report = runner.run_selected_with(
            &[WorkloadKind::ConvStackFp16, WorkloadKind::ConvStackInt8],
            |event| {
                if let RunEvent::Quantizing { kind } = event {
                    assert_eq!(kind, WorkloadKind::ConvStackInt8);
                    quantize_events += 1;
                }
            },
        );

        assert_eq!(quantize_events, 1);
        assert_eq!(report.available_count(), 2);
        assert_eq!(report.system.npu_summary(), "Enabled");
        let int8 = report.score(WorkloadKind::ConvStackInt8).unwrap();
        assert_eq!(int8.label, "NPU NEURAL (INT8)");
        assert!(int8.value > 0.0);
    }

    #[test]
    fn test_compile_failure_is_unavailable() {
        let score = runner_with(Some(CompileBehavior::Fail)).run_workload(WorkloadKind::ConvStackFp16);
        assert!(!score.is_available());
        assert!(score.unavailable_reason().unwrap().contains("mock compiler rejected"));
    }

    #[test]
    fn test_compile_panic_is_contained() {
        let runner = runner_with(Some(CompileBehavior::Panic));
        let report = runner.run_all();

        assert_eq!(report.scores.len(), 4);
        assert!(report.score(WorkloadKind::MatMulFp32Cpu).unwrap().is_available());
        let fp16 = report.score(WorkloadKind::ConvStackFp16).unwrap();
        assert!(fp16.unavailable_reason().unwrap().starts_with("panicked"));
        let int8 = report.score(WorkloadKind::ConvStackInt8).unwrap();
        assert!(int8.unavailable_reason().unwrap().contains("mock compiler crashed"));
    }

    #[test]
    fn test_inference_failure_mid_loop_is_isolated() {
        let config = small_config();
        // Fails inside the measured loop, after warmup succeeded.
        assert!(config.npu.warmup_iters < INFERENCES_BEFORE_LOSS);
        assert!(config.npu.warmup_iters + config.npu.measure_iters > INFERENCES_BEFORE_LOSS);

        let report = runner_with(Some(CompileBehavior::FailInfer)).run_all();

        assert_eq!(report.scores.len(), 4);
        let cpu = report.score(WorkloadKind::MatMulFp32Cpu).unwrap();
        assert!(cpu.is_available());
        assert!(cpu.value > 0.0);
        for kind in [WorkloadKind::ConvStackFp16, WorkloadKind::ConvStackInt8] {
            let score = report.score(kind).unwrap();
            assert_eq!(score.value, 0.0);
            let reason = score.unavailable_reason().unwrap();
            assert!(reason.contains("device lost"), "reason: {}", reason);
        }
    }
}
