//! Seeded operand generation shared by all workloads.

use half::f16;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `len` values drawn uniformly from `[-bound, bound)` with a fixed seed.
pub fn uniform_f32(len: usize, bound: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-bound..bound)).collect()
}

/// Same distribution as [`uniform_f32`], rounded to half precision.
pub fn uniform_f16(len: usize, bound: f32, seed: u64) -> Vec<f16> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| f16::from_f32(rng.gen_range(-bound..bound)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_is_deterministic_and_bounded() {
        let a = uniform_f32(1000, 0.5, 7);
        let b = uniform_f32(1000, 0.5, 7);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (-0.5..0.5).contains(v)));
        assert_ne!(a, uniform_f32(1000, 0.5, 8));
    }

    #[test]
    fn test_uniform_f16_bounded() {
        let values = uniform_f16(256, 1.0, 3);
        assert_eq!(values.len(), 256);
        assert!(values.iter().all(|v| v.to_f32().abs() <= 1.0));
    }
}
