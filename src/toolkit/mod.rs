//! Optional neural accelerator toolkit.
//!
//! The toolkit is a shared library loaded at runtime. Whether it is present is
//! decided once per process by [`init`] and then read through [`is_available`]
//! and [`runtime`]; nothing else in the crate retries the load. Absence is the
//! expected state on machines without the toolkit and only disables the NPU
//! workloads.

pub mod errors;
pub mod ir;
pub mod openvino;

pub use errors::{ToolkitError, ToolkitResult};

use crate::model::TracedModel;
use half::f16;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// Compute units the toolkit may schedule a compiled model on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeUnits {
    /// Any available unit, preferring the neural accelerator.
    #[default]
    All,
    CpuOnly,
    CpuAndGpu,
    CpuAndNeuralEngine,
}

impl ComputeUnits {
    /// Toolkit device string.
    pub fn device_name(self) -> &'static str {
        match self {
            ComputeUnits::All => "AUTO:NPU,GPU,CPU",
            ComputeUnits::CpuOnly => "CPU",
            ComputeUnits::CpuAndGpu => "AUTO:GPU,CPU",
            ComputeUnits::CpuAndNeuralEngine => "AUTO:NPU,CPU",
        }
    }
}

/// A loaded inference runtime able to compile traced models.
pub trait NeuralRuntime: Send + Sync {
    fn name(&self) -> &str;

    fn compile(
        &self,
        model: &TracedModel,
        units: ComputeUnits,
    ) -> ToolkitResult<Box<dyn CompiledModel>>;
}

/// A model compiled for one device, with a resident FP16 input tensor.
pub trait CompiledModel: Send {
    /// Device string the model was compiled for.
    fn device(&self) -> &str;

    /// Number of FP16 elements the input tensor holds.
    fn input_len(&self) -> usize;

    /// Copies `input` into the resident input tensor.
    fn set_input(&mut self, input: &[f16]) -> ToolkitResult<()>;

    /// Runs one synchronous inference on the resident input.
    fn infer(&mut self) -> ToolkitResult<()>;

    fn predict(&mut self, input: &[f16]) -> ToolkitResult<()> {
        self.set_input(input)?;
        self.infer()
    }
}

static RUNTIME: OnceLock<Option<Arc<dyn NeuralRuntime>>> = OnceLock::new();

fn load(library_override: Option<&str>) -> Option<Arc<dyn NeuralRuntime>> {
    match openvino::OpenVinoRuntime::load(library_override) {
        Ok(runtime) => {
            info!("Neural toolkit loaded: {}", runtime.name());
            Some(Arc::new(runtime))
        }
        Err(e) => {
            info!("Neural toolkit not available: {}", e);
            None
        }
    }
}

/// Attempts to load the toolkit. Only the first call has any effect.
pub fn init(library_override: Option<&str>) -> bool {
    RUNTIME.get_or_init(|| load(library_override)).is_some()
}

/// The loaded runtime, initializing with the default search if needed.
pub fn runtime() -> Option<Arc<dyn NeuralRuntime>> {
    RUNTIME.get_or_init(|| load(None)).clone()
}

pub fn is_available() -> bool {
    runtime().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_names() {
        assert_eq!(ComputeUnits::All.device_name(), "AUTO:NPU,GPU,CPU");
        assert_eq!(ComputeUnits::CpuOnly.device_name(), "CPU");
        assert_eq!(ComputeUnits::CpuAndNeuralEngine.device_name(), "AUTO:NPU,CPU");
    }

    #[test]
    fn test_compute_units_serde() {
        let units: ComputeUnits = serde_json::from_str("\"cpu_and_gpu\"").unwrap();
        assert_eq!(units, ComputeUnits::CpuAndGpu);
        assert_eq!(serde_json::to_string(&ComputeUnits::All).unwrap(), "\"all\"");
    }

    #[test]
    fn test_capability_is_stable() {
        assert_eq!(is_available(), is_available());
        assert_eq!(init(None), is_available());
    }
}
