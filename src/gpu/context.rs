//! Device and queue for the selected adapter.

use crate::gpu::errors::{GpuError, GpuResult};
use crate::precision::Precision;
use log::{error, info, warn};
use pollster::FutureExt;
use std::sync::{Arc, Mutex};

/// First GPU error raised outside an error scope, kept until the next barrier.
#[derive(Clone, Default)]
pub(crate) struct ErrorSink {
    first: Arc<Mutex<Option<String>>>,
}

impl ErrorSink {
    pub(crate) fn record(&self, message: String) {
        let mut slot = self.first.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_none() {
            *slot = Some(message);
        }
    }

    pub(crate) fn take(&self) -> Option<String> {
        self.first.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    /// Drains the sink into a result.
    pub(crate) fn check(&self) -> GpuResult<()> {
        match self.take() {
            Some(message) => Err(GpuError::ExecutionFailed { message }),
            None => Ok(()),
        }
    }
}

/// A device opened on the adapter chosen by the backend selector.
pub struct GpuContext {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    precision: Precision,
    adapter_name: String,
    errors: ErrorSink,
}

impl GpuContext {
    /// Opens a device with the adapter's full limits.
    ///
    /// With `prefer_f16` the device requests `SHADER_F16`; adapters without it
    /// get an FP32 device instead and a warning is logged.
    pub fn from_adapter(adapter: &wgpu::Adapter, prefer_f16: bool) -> GpuResult<Self> {
        let info = adapter.get_info();
        let supports_f16 = adapter.features().contains(wgpu::Features::SHADER_F16);

        let precision = if prefer_f16 && supports_f16 {
            Precision::Fp16
        } else {
            if prefer_f16 {
                warn!(
                    "Adapter '{}' does not support FP16 shaders, falling back to FP32",
                    info.name
                );
            }
            Precision::Fp32
        };

        let required_features = match precision {
            Precision::Fp16 => wgpu::Features::SHADER_F16,
            _ => wgpu::Features::empty(),
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("accel-bench device"),
                    required_features,
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .block_on()
            .map_err(|e| GpuError::DeviceNotAvailable {
                message: e.to_string(),
            })?;

        let errors = ErrorSink::default();
        let sink = errors.clone();
        device.on_uncaptured_error(Box::new(move |e: wgpu::Error| {
            error!("Uncaptured GPU error: {}", e);
            sink.record(e.to_string());
        }));

        info!(
            "Opened {} device on '{}' ({:?})",
            precision, info.name, info.backend
        );

        Ok(Self {
            device,
            queue,
            precision,
            adapter_name: info.name,
            errors,
        })
    }

    /// Precision the device computes in.
    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Blocks until every submitted command buffer has retired.
    ///
    /// Fails with the first error the device raised since the last barrier.
    pub fn synchronize(&self) -> GpuResult<()> {
        let _ = self.device.poll(wgpu::Maintain::Wait);
        self.errors.check()
    }
}
