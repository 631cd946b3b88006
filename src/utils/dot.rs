//! SIMD-aware dot-product kernels used by the CPU matrix multiply.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotKernel {
    Scalar,
    #[cfg(target_arch = "x86_64")]
    Avx2Fma,
    #[cfg(target_arch = "x86_64")]
    Avx512Fma,
    #[cfg(target_arch = "aarch64")]
    Neon,
}

impl DotKernel {
    /// Picks the widest kernel the running CPU supports.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if std::is_x86_feature_detected!("avx512f") && std::is_x86_feature_detected!("fma") {
                return DotKernel::Avx512Fma;
            }
            if std::is_x86_feature_detected!("avx2") && std::is_x86_feature_detected!("fma") {
                return DotKernel::Avx2Fma;
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                return DotKernel::Neon;
            }
        }

        DotKernel::Scalar
    }

    pub fn name(self) -> &'static str {
        match self {
            DotKernel::Scalar => "scalar",
            #[cfg(target_arch = "x86_64")]
            DotKernel::Avx2Fma => "avx2+fma",
            #[cfg(target_arch = "x86_64")]
            DotKernel::Avx512Fma => "avx512+fma",
            #[cfg(target_arch = "aarch64")]
            DotKernel::Neon => "neon",
        }
    }
}

/// Dot product of two equally sized slices.
///
/// Panics if the lengths differ.
#[inline(always)]
pub fn dot(kernel: DotKernel, a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "dot operands must have equal length");
    let len = a.len();
    let (a, b) = (a.as_ptr(), b.as_ptr());
    // SAFETY: both pointers cover `len` elements and the SIMD variants are
    // only constructed by `detect()` after a runtime feature check.
    match kernel {
        DotKernel::Scalar => unsafe { dot_scalar(a, b, len) },
        #[cfg(target_arch = "x86_64")]
        DotKernel::Avx2Fma => unsafe { x86_64::dot_avx2_fma(a, b, len) },
        #[cfg(target_arch = "x86_64")]
        DotKernel::Avx512Fma => unsafe { x86_64::dot_avx512_fma(a, b, len) },
        #[cfg(target_arch = "aarch64")]
        DotKernel::Neon => unsafe { aarch64::dot_neon(a, b, len) },
    }
}

#[inline(always)]
unsafe fn dot_scalar(a: *const f32, b: *const f32, len: usize) -> f32 {
    let mut sum0 = 0.0f32;
    let mut sum1 = 0.0f32;
    let mut sum2 = 0.0f32;
    let mut sum3 = 0.0f32;

    let mut i = 0usize;
    while i + 4 <= len {
        unsafe {
            sum0 = (*a.add(i)).mul_add(*b.add(i), sum0);
            sum1 = (*a.add(i + 1)).mul_add(*b.add(i + 1), sum1);
            sum2 = (*a.add(i + 2)).mul_add(*b.add(i + 2), sum2);
            sum3 = (*a.add(i + 3)).mul_add(*b.add(i + 3), sum3);
        }
        i += 4;
    }

    let mut sum = (sum0 + sum1) + (sum2 + sum3);
    unsafe { tail(a, b, i, len, &mut sum) };
    sum
}

#[inline(always)]
unsafe fn tail(a: *const f32, b: *const f32, mut i: usize, len: usize, sum: &mut f32) {
    while i < len {
        unsafe { *sum = (*a.add(i)).mul_add(*b.add(i), *sum) };
        i += 1;
    }
}

#[cfg(target_arch = "x86_64")]
mod x86_64 {
    use core::arch::x86_64::*;

    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn dot_avx2_fma(a: *const f32, b: *const f32, len: usize) -> f32 {
        let mut acc0 = _mm256_setzero_ps();
        let mut acc1 = _mm256_setzero_ps();
        let mut i = 0usize;

        while i + 16 <= len {
            unsafe {
                acc0 = _mm256_fmadd_ps(_mm256_loadu_ps(a.add(i)), _mm256_loadu_ps(b.add(i)), acc0);
                acc1 = _mm256_fmadd_ps(
                    _mm256_loadu_ps(a.add(i + 8)),
                    _mm256_loadu_ps(b.add(i + 8)),
                    acc1,
                );
            }
            i += 16;
        }

        let mut lanes = [0.0f32; 8];
        unsafe { _mm256_storeu_ps(lanes.as_mut_ptr(), _mm256_add_ps(acc0, acc1)) };
        let mut sum: f32 = lanes.iter().sum();
        unsafe { super::tail(a, b, i, len, &mut sum) };
        sum
    }

    #[target_feature(enable = "avx512f,fma")]
    pub(super) unsafe fn dot_avx512_fma(a: *const f32, b: *const f32, len: usize) -> f32 {
        let mut acc = _mm512_setzero_ps();
        let mut i = 0usize;

        while i + 16 <= len {
            unsafe {
                acc = _mm512_fmadd_ps(_mm512_loadu_ps(a.add(i)), _mm512_loadu_ps(b.add(i)), acc);
            }
            i += 16;
        }

        let mut lanes = [0.0f32; 16];
        unsafe { _mm512_storeu_ps(lanes.as_mut_ptr(), acc) };
        let mut sum: f32 = lanes.iter().sum();
        unsafe { super::tail(a, b, i, len, &mut sum) };
        sum
    }
}

#[cfg(target_arch = "aarch64")]
mod aarch64 {
    use core::arch::aarch64::*;

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn dot_neon(a: *const f32, b: *const f32, len: usize) -> f32 {
        let mut acc0 = vdupq_n_f32(0.0);
        let mut acc1 = vdupq_n_f32(0.0);
        let mut i = 0usize;

        while i + 8 <= len {
            unsafe {
                acc0 = vfmaq_f32(acc0, vld1q_f32(a.add(i)), vld1q_f32(b.add(i)));
                acc1 = vfmaq_f32(acc1, vld1q_f32(a.add(i + 4)), vld1q_f32(b.add(i + 4)));
            }
            i += 8;
        }

        let mut sum = vaddvq_f32(vaddq_f32(acc0, acc1));
        unsafe { super::tail(a, b, i, len, &mut sum) };
        sum
    }
}
