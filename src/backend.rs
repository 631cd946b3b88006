//! Accelerated backend discovery.
//!
//! Selection runs once per process and follows a fixed priority:
//! a unified-memory GPU API (Metal) first, then any generic parallel GPU API
//! (Vulkan, DX12, GL), then the CPU. The decision is never revisited; if the
//! chosen adapter later fails to produce a device, the GPU workload is reported
//! unavailable instead of falling back.

use log::{debug, info};
use std::fmt;

/// Compute backend a workload runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Cpu,
    /// GPU sharing memory with the host through an accelerator-specific API.
    UnifiedMemoryGpu,
    /// GPU reached through a generic parallel compute API.
    GenericParallel,
    /// Dedicated neural accelerator, reached through the neural toolkit.
    NeuralAccelerator,
}

impl Backend {
    pub fn is_gpu(self) -> bool {
        matches!(self, Backend::UnifiedMemoryGpu | Backend::GenericParallel)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => write!(f, "CPU"),
            Backend::UnifiedMemoryGpu => write!(f, "Unified-memory GPU"),
            Backend::GenericParallel => write!(f, "Generic parallel GPU"),
            Backend::NeuralAccelerator => write!(f, "Neural accelerator"),
        }
    }
}

/// Graphics API an adapter is exposed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphicsApi {
    Metal,
    Vulkan,
    Dx12,
    Gl,
    Other,
}

impl GraphicsApi {
    pub fn name(self) -> &'static str {
        match self {
            GraphicsApi::Metal => "METAL",
            GraphicsApi::Vulkan => "VULKAN",
            GraphicsApi::Dx12 => "DX12",
            GraphicsApi::Gl => "GL",
            GraphicsApi::Other => "OTHER",
        }
    }

    fn generic_rank(self) -> Option<u8> {
        match self {
            GraphicsApi::Vulkan => Some(0),
            GraphicsApi::Dx12 => Some(1),
            GraphicsApi::Gl => Some(2),
            GraphicsApi::Metal | GraphicsApi::Other => None,
        }
    }
}

impl From<wgpu::Backend> for GraphicsApi {
    fn from(backend: wgpu::Backend) -> Self {
        match backend {
            wgpu::Backend::Metal => GraphicsApi::Metal,
            wgpu::Backend::Vulkan => GraphicsApi::Vulkan,
            wgpu::Backend::Dx12 => GraphicsApi::Dx12,
            wgpu::Backend::Gl => GraphicsApi::Gl,
            _ => GraphicsApi::Other,
        }
    }
}

/// Physical class of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Discrete,
    Integrated,
    Virtual,
    /// Software rasterizer; never selected.
    Software,
    Other,
}

impl DeviceClass {
    fn rank(self) -> Option<u8> {
        match self {
            DeviceClass::Discrete => Some(0),
            DeviceClass::Integrated => Some(1),
            DeviceClass::Virtual => Some(2),
            DeviceClass::Other => Some(3),
            DeviceClass::Software => None,
        }
    }
}

impl From<wgpu::DeviceType> for DeviceClass {
    fn from(device_type: wgpu::DeviceType) -> Self {
        match device_type {
            wgpu::DeviceType::DiscreteGpu => DeviceClass::Discrete,
            wgpu::DeviceType::IntegratedGpu => DeviceClass::Integrated,
            wgpu::DeviceType::VirtualGpu => DeviceClass::Virtual,
            wgpu::DeviceType::Cpu => DeviceClass::Software,
            wgpu::DeviceType::Other => DeviceClass::Other,
        }
    }
}

/// Backend-neutral description of an enumerated adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterSummary {
    pub name: String,
    pub api: GraphicsApi,
    pub device_class: DeviceClass,
}

impl AdapterSummary {
    pub fn new(name: &str, api: GraphicsApi, device_class: DeviceClass) -> Self {
        Self {
            name: name.to_string(),
            api,
            device_class,
        }
    }

    pub fn from_info(info: &wgpu::AdapterInfo) -> Self {
        Self::new(&info.name, info.backend.into(), info.device_type.into())
    }
}

/// Applies the selection priority to a list of adapters.
///
/// Returns the chosen backend and the index of the adapter backing it
/// (`None` for the CPU).
pub fn select_from(adapters: &[AdapterSummary]) -> (Backend, Option<usize>) {
    let unified = adapters
        .iter()
        .position(|a| a.api == GraphicsApi::Metal && a.device_class.rank().is_some());
    if let Some(index) = unified {
        return (Backend::UnifiedMemoryGpu, Some(index));
    }

    let generic = adapters
        .iter()
        .enumerate()
        .filter_map(|(index, a)| {
            let device_rank = a.device_class.rank()?;
            let api_rank = a.api.generic_rank()?;
            Some(((device_rank, api_rank), index))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, index)| index);

    match generic {
        Some(index) => (Backend::GenericParallel, Some(index)),
        None => (Backend::Cpu, None),
    }
}

/// Outcome of backend selection, fixed for the whole run.
#[derive(Debug)]
pub struct BackendSelection {
    backend: Backend,
    summary: Option<AdapterSummary>,
    adapter: Option<wgpu::Adapter>,
    // Keeps the adapter's instance alive for the lifetime of the selection.
    _instance: Option<wgpu::Instance>,
}

impl BackendSelection {
    /// Selection without any GPU adapter.
    pub fn cpu_only() -> Self {
        Self {
            backend: Backend::Cpu,
            summary: None,
            adapter: None,
            _instance: None,
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn summary(&self) -> Option<&AdapterSummary> {
        self.summary.as_ref()
    }

    pub fn adapter(&self) -> Option<&wgpu::Adapter> {
        self.adapter.as_ref()
    }

    /// Short name used in reports: the graphics API, or `CPU`.
    pub fn display_name(&self) -> String {
        match &self.summary {
            Some(summary) => summary.api.name().to_string(),
            None => "CPU".to_string(),
        }
    }
}

/// Enumerates adapters on every native API and applies [`select_from`].
pub fn select() -> BackendSelection {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
    let mut adapters = instance.enumerate_adapters(wgpu::Backends::all());
    let summaries: Vec<AdapterSummary> = adapters
        .iter()
        .map(|adapter| AdapterSummary::from_info(&adapter.get_info()))
        .collect();

    for summary in &summaries {
        debug!(
            "Found adapter '{}' ({}, {:?})",
            summary.name,
            summary.api.name(),
            summary.device_class
        );
    }

    let (backend, index) = select_from(&summaries);
    match index {
        Some(index) => {
            let summary = summaries[index].clone();
            info!(
                "Selected {} backend: '{}' via {}",
                backend,
                summary.name,
                summary.api.name()
            );
            BackendSelection {
                backend,
                summary: Some(summary),
                adapter: Some(adapters.swap_remove(index)),
                _instance: Some(instance),
            }
        }
        None => {
            info!("No hardware GPU adapter found, using CPU backend");
            BackendSelection::cpu_only()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(api: GraphicsApi, class: DeviceClass) -> AdapterSummary {
        AdapterSummary::new("test", api, class)
    }

    #[test]
    fn test_metal_wins_over_everything() {
        let adapters = [
            adapter(GraphicsApi::Vulkan, DeviceClass::Discrete),
            adapter(GraphicsApi::Metal, DeviceClass::Integrated),
        ];
        assert_eq!(
            select_from(&adapters),
            (Backend::UnifiedMemoryGpu, Some(1))
        );
    }

    #[test]
    fn test_generic_prefers_discrete_then_api() {
        let adapters = [
            adapter(GraphicsApi::Gl, DeviceClass::Discrete),
            adapter(GraphicsApi::Vulkan, DeviceClass::Integrated),
            adapter(GraphicsApi::Vulkan, DeviceClass::Discrete),
        ];
        assert_eq!(select_from(&adapters), (Backend::GenericParallel, Some(2)));
    }

    #[test]
    fn test_software_adapters_fall_back_to_cpu() {
        let adapters = [
            adapter(GraphicsApi::Vulkan, DeviceClass::Software),
            adapter(GraphicsApi::Metal, DeviceClass::Software),
        ];
        assert_eq!(select_from(&adapters), (Backend::Cpu, None));
        assert_eq!(select_from(&[]), (Backend::Cpu, None));
    }

    #[test]
    fn test_cpu_only_selection() {
        let selection = BackendSelection::cpu_only();
        assert_eq!(selection.backend(), Backend::Cpu);
        assert!(selection.adapter().is_none());
        assert_eq!(selection.display_name(), "CPU");
        assert!(!selection.backend().is_gpu());
    }
}
