//! FP32 matrix multiply on all CPU cores.

use crate::benchmarks::benchmark_errors::BenchmarkResult;
use crate::benchmarks::performance_metrics::Operation;
use crate::utils::dot::{DotKernel, dot};
use crate::utils::rng::uniform_f32;
use log::debug;
use rayon::prelude::*;

/// Rows of the product computed by one rayon task.
const ROW_BLOCK: usize = 8;
/// Columns swept per pass so a block of `rhs_t` rows stays in cache.
const COL_BLOCK: usize = 64;

/// `product = lhs * rhs` for row-major N x N operands.
///
/// `rhs` is stored transposed so every output element is a contiguous dot
/// product.
pub struct CpuMatMul {
    size: usize,
    lhs: Vec<f32>,
    rhs_t: Vec<f32>,
    product: Vec<f32>,
    kernel: DotKernel,
}

impl CpuMatMul {
    /// Seeded operands uniform in `[-1, 1)`.
    pub fn new(size: usize, seed: u64) -> Self {
        let len = size * size;
        let lhs = uniform_f32(len, 1.0, seed);
        let rhs = uniform_f32(len, 1.0, seed.wrapping_add(1));
        Self::from_operands(size, lhs, &rhs)
    }

    /// Uses explicit row-major operands; panics if either is not `size * size`.
    pub fn from_operands(size: usize, lhs: Vec<f32>, rhs: &[f32]) -> Self {
        assert_eq!(lhs.len(), size * size, "lhs must be size x size");
        assert_eq!(rhs.len(), size * size, "rhs must be size x size");

        let mut rhs_t = vec![0.0f32; size * size];
        for row in 0..size {
            for col in 0..size {
                rhs_t[col * size + row] = rhs[row * size + col];
            }
        }

        let kernel = DotKernel::detect();
        debug!("CPU matmul {}x{} using {} dot kernel", size, size, kernel.name());

        Self {
            size,
            lhs,
            rhs_t,
            product: vec![0.0f32; size * size],
            kernel,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn kernel(&self) -> DotKernel {
        self.kernel
    }

    pub fn product(&self) -> &[f32] {
        &self.product
    }

    /// Computes the product once.
    pub fn multiply(&mut self) {
        let n = self.size;
        if n == 0 {
            return;
        }
        let kernel = self.kernel;
        let lhs = &self.lhs;
        let rhs_t = &self.rhs_t;

        self.product
            .par_chunks_mut(ROW_BLOCK * n)
            .enumerate()
            .for_each(|(block, out)| {
                let first_row = block * ROW_BLOCK;
                let rows = out.len() / n;
                for col_start in (0..n).step_by(COL_BLOCK) {
                    let col_end = (col_start + COL_BLOCK).min(n);
                    for r in 0..rows {
                        let a = &lhs[(first_row + r) * n..(first_row + r + 1) * n];
                        let out_row = &mut out[r * n..(r + 1) * n];
                        for col in col_start..col_end {
                            out_row[col] = dot(kernel, a, &rhs_t[col * n..(col + 1) * n]);
                        }
                    }
                }
            });
    }
}

impl Operation for CpuMatMul {
    fn run(&mut self) -> BenchmarkResult<()> {
        self.multiply();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_product() {
        // [[1, 2], [3, 4]] * [[5, 6], [7, 8]]
        let mut matmul = CpuMatMul::from_operands(2, vec![1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0]);
        matmul.multiply();
        assert_eq!(matmul.product(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matches_naive_product_across_blocks() {
        let n = 70;
        let mut matmul = CpuMatMul::new(n, 9);
        let lhs = matmul.lhs.clone();
        let rhs = uniform_f32(n * n, 1.0, 10);
        matmul.multiply();

        for (row, col) in [(0, 0), (7, 8), (9, 63), (69, 64), (69, 69), (33, 17)] {
            let expected: f32 = (0..n).map(|k| lhs[row * n + k] * rhs[k * n + col]).sum();
            let got = matmul.product()[row * n + col];
            assert!((got - expected).abs() < 1e-3, "({row}, {col}): {got} vs {expected}");
        }
    }
}
