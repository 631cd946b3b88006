//! WGSL shader sources for the GPU workloads.

use crate::precision::Precision;

/// Side length of the square workgroup tile in `matmul.wgsl`.
pub const MATMUL_TILE: u32 = 16;

const MATMUL_TEMPLATE: &str = include_str!("matmul.wgsl");

/// Get the tiled matrix-multiply shader specialized for `precision`.
///
/// FP16 enables the `f16` extension; the device must have been created with
/// `Features::SHADER_F16`. INT8 is not a valid shader precision and maps to FP32.
pub fn matmul_wgsl(precision: Precision) -> String {
    let (extensions, scalar) = match precision {
        Precision::Fp16 => ("enable f16;", "f16"),
        Precision::Fp32 | Precision::Int8 => ("", "f32"),
    };

    MATMUL_TEMPLATE
        .replace("// ENABLE_EXTENSIONS", extensions)
        .replace("SCALAR_TYPE", scalar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_wgsl_fp16() {
        let wgsl = matmul_wgsl(Precision::Fp16);
        assert!(wgsl.contains("enable f16;"));
        assert!(wgsl.contains("alias scalar = f16;"));
        assert!(wgsl.contains("fn main("));
        assert!(!wgsl.contains("SCALAR_TYPE"));
    }

    #[test]
    fn test_matmul_wgsl_fp32() {
        let wgsl = matmul_wgsl(Precision::Fp32);
        assert!(!wgsl.contains("enable f16;"));
        assert!(wgsl.contains("alias scalar = f32;"));
        assert!(wgsl.contains("@workgroup_size(16, 16, 1)"));
    }
}
