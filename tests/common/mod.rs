//! In-process stand-in for the neural toolkit.

#![allow(dead_code)]

use accel_bench::benchmarks::{ConvStackConfig, MatMulConfig, SuiteConfig};
use accel_bench::model::TracedModel;
use accel_bench::toolkit::{
    CompiledModel, ComputeUnits, NeuralRuntime, ToolkitError, ToolkitResult,
};
use half::f16;
use std::sync::Mutex;
use std::time::Duration;

/// What [`MockRuntime::compile`] does.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompileBehavior {
    Succeed,
    Fail,
    Panic,
    /// Compiles, then loses the device on the third inference.
    FailInfer,
}

/// Inferences a `FailInfer` model completes before failing.
pub const INFERENCES_BEFORE_LOSS: u32 = 2;

pub struct MockRuntime {
    behavior: CompileBehavior,
    /// Quantized layer count of every compiled model, in compile order.
    pub compiled: Mutex<Vec<usize>>,
}

impl MockRuntime {
    pub fn new(behavior: CompileBehavior) -> Self {
        Self {
            behavior,
            compiled: Mutex::new(Vec::new()),
        }
    }
}

impl NeuralRuntime for MockRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    fn compile(
        &self,
        model: &TracedModel,
        units: ComputeUnits,
    ) -> ToolkitResult<Box<dyn CompiledModel>> {
        match self.behavior {
            CompileBehavior::Succeed | CompileBehavior::FailInfer => {
                self.compiled.lock().unwrap().push(model.quantized_layers());
                let fail_after = match self.behavior {
                    CompileBehavior::FailInfer => Some(INFERENCES_BEFORE_LOSS),
                    _ => None,
                };
                Ok(Box::new(MockModel {
                    device: units.device_name().to_string(),
                    input: vec![f16::ZERO; model.spec.input_len()],
                    inferences: 0,
                    fail_after,
                }))
            }
            CompileBehavior::Fail => Err(ToolkitError::InvalidModel {
                message: "mock compiler rejected the graph".to_string(),
            }),
            CompileBehavior::Panic => panic!("mock compiler crashed"),
        }
    }
}

struct MockModel {
    device: String,
    input: Vec<f16>,
    inferences: u32,
    fail_after: Option<u32>,
}

impl CompiledModel for MockModel {
    fn device(&self) -> &str {
        &self.device
    }

    fn input_len(&self) -> usize {
        self.input.len()
    }

    fn set_input(&mut self, input: &[f16]) -> ToolkitResult<()> {
        if input.len() != self.input.len() {
            return Err(ToolkitError::InputSizeMismatch {
                expected: self.input.len(),
                actual: input.len(),
            });
        }
        self.input.copy_from_slice(input);
        Ok(())
    }

    fn infer(&mut self) -> ToolkitResult<()> {
        if self.fail_after.is_some_and(|limit| self.inferences >= limit) {
            return Err(ToolkitError::CallFailed {
                function: "ov_infer_request_infer",
                status: -1,
                message: "device lost".to_string(),
            });
        }
        self.inferences += 1;
        std::thread::sleep(Duration::from_micros(200));
        Ok(())
    }
}

/// A suite small enough to run in a unit test.
pub fn small_config() -> SuiteConfig {
    SuiteConfig {
        cpu: MatMulConfig {
            matrix_size: 64,
            warmup_iters: 1,
            measure_iters: 3,
        },
        gpu: MatMulConfig {
            matrix_size: 64,
            warmup_iters: 1,
            measure_iters: 3,
        },
        npu: ConvStackConfig {
            batch: 1,
            channels: 8,
            size: 4,
            kernel: 3,
            layers: 2,
            warmup_iters: 1,
            measure_iters: 3,
            ..ConvStackConfig::default()
        },
        toolkit_library: None,
    }
}
