use crate::benchmarks::benchmark_errors::BenchmarkResult;
use crate::benchmarks::performance_metrics::Operation;
use crate::gpu::GpuMatMul;

/// One asynchronous dispatch per call; the barrier waits for the queue.
pub struct GpuMatMulOperation {
    matmul: GpuMatMul,
}

impl GpuMatMulOperation {
    pub fn new(matmul: GpuMatMul) -> Self {
        Self { matmul }
    }

    pub fn matmul(&self) -> &GpuMatMul {
        &self.matmul
    }
}

impl Operation for GpuMatMulOperation {
    fn run(&mut self) -> BenchmarkResult<()> {
        self.matmul.dispatch();
        Ok(())
    }

    fn synchronize(&mut self) -> BenchmarkResult<()> {
        self.matmul.synchronize()?;
        Ok(())
    }
}
