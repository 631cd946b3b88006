//! Tests for loading the suite configuration from JSON files.

use accel_bench::activation::Activation;
use accel_bench::benchmarks::{BenchmarkError, ConfigLoader, SuiteConfig};
use accel_bench::toolkit::ComputeUnits;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[cfg(test)]
mod config_loader_tests {
    use super::*;

    #[test]
    fn test_load_valid_config() {
        let file = write_config(
            r#"{
                "cpu": {"matrix_size": 512, "warmup_iters": 0, "measure_iters": 4},
                "npu": {
                    "batch": 2, "channels": 64, "size": 8, "kernel": 3, "layers": 2,
                    "activation": "SIGMOID", "compute_units": "cpu_only",
                    "warmup_iters": 1, "measure_iters": 2
                },
                "toolkit_library": "/opt/toolkit/libruntime_c.so"
            }"#,
        );
        let config = ConfigLoader::load_suite_config(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.cpu.matrix_size, 512);
        assert_eq!(config.gpu, SuiteConfig::default().gpu);
        assert_eq!(config.npu.activation, Activation::Sigmoid);
        assert_eq!(config.npu.compute_units, ComputeUnits::CpuOnly);
        assert_eq!(config.npu.weight_threshold, 512);
        assert_eq!(
            config.toolkit_library.as_deref(),
            Some("/opt/toolkit/libruntime_c.so")
        );
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/configs/suite.json");
        let config = ConfigLoader::load_suite_config(path).unwrap();
        assert_eq!(config, SuiteConfig::default());
    }

    #[test]
    fn test_malformed_config_is_a_parse_error() {
        let file = write_config(r#"{"cpu": {"matrix_size": "big"}}"#);
        let result = ConfigLoader::load_suite_config(file.path().to_str().unwrap());
        assert!(matches!(
            result,
            Err(BenchmarkError::ConfigParseError { .. })
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let file = write_config(
            r#"{"gpu": {"matrix_size": 1024, "warmup_iters": 1, "measure_iters": 0}}"#,
        );
        let result = ConfigLoader::load_suite_config(file.path().to_str().unwrap());
        assert!(matches!(
            result,
            Err(BenchmarkError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = ConfigLoader::load_suite_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config, SuiteConfig::default());
    }
}
