//! Convolution-stack inference on the neural toolkit.

use crate::benchmarks::benchmark_errors::BenchmarkResult;
use crate::benchmarks::performance_metrics::Operation;
use crate::toolkit::CompiledModel;
use half::f16;

/// One synchronous inference per call.
///
/// The sample input is copied into the model's resident tensor once, so the
/// timed loop measures inference only.
pub struct ConvStackInference {
    model: Box<dyn CompiledModel>,
}

impl ConvStackInference {
    pub fn new(mut model: Box<dyn CompiledModel>, sample_input: &[f16]) -> BenchmarkResult<Self> {
        model.set_input(sample_input)?;
        Ok(Self { model })
    }

    pub fn device(&self) -> &str {
        self.model.device()
    }
}

impl Operation for ConvStackInference {
    fn run(&mut self) -> BenchmarkResult<()> {
        self.model.infer()?;
        Ok(())
    }
}
