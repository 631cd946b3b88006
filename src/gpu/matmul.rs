//! Square matrix multiply on the GPU.

use crate::gpu::context::GpuContext;
use crate::gpu::errors::{GpuError, GpuResult};
use crate::gpu::shaders::{MATMUL_TILE, matmul_wgsl};
use crate::precision::Precision;
use crate::utils::rng::{uniform_f16, uniform_f32};
use half::f16;
use log::debug;
use pollster::FutureExt;
use std::sync::mpsc;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct MatMulParams {
    size: u32,
    _pad: [u32; 3],
}

/// `product = lhs * rhs` for resident N x N operands.
///
/// Operands are uploaded once at construction. Every [`dispatch`](Self::dispatch)
/// submits one compute pass and returns without waiting for it.
pub struct GpuMatMul {
    context: GpuContext,
    size: u32,
    workgroups: u32,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    product: wgpu::Buffer,
}

impl GpuMatMul {
    pub fn new(context: GpuContext, size: u32, seed: u64) -> GpuResult<Self> {
        if size == 0 {
            return Err(GpuError::InvalidMatrixSize);
        }

        let precision = context.precision();
        let limits = context.limits();
        let elements = size as u64 * size as u64;
        let buffer_bytes = elements * precision.element_bytes() as u64;
        let max_size = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        if buffer_bytes > max_size {
            return Err(GpuError::BufferTooLarge {
                required: buffer_bytes,
                max_size,
            });
        }

        let workgroups = size.div_ceil(MATMUL_TILE);
        if workgroups > limits.max_compute_workgroups_per_dimension {
            return Err(GpuError::DispatchTooLarge {
                workgroups,
                max: limits.max_compute_workgroups_per_dimension,
            });
        }

        let device = &context.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("MatMul Shader"),
            source: wgpu::ShaderSource::Wgsl(matmul_wgsl(precision).into()),
        });

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("MatMul Bind Group Layout"),
            entries: &[
                storage(0, true),
                storage(1, true),
                storage(2, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("MatMul Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("MatMul Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(e) = device.pop_error_scope().block_on() {
            return Err(GpuError::ShaderCompilationFailed {
                message: e.to_string(),
            });
        }

        // Scopes are a stack: Validation pops first.
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let elements = elements as usize;
        let lhs = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("MatMul Lhs"),
            contents: &operand_bytes(elements, seed, precision),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let rhs = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("MatMul Rhs"),
            contents: &operand_bytes(elements, seed.wrapping_add(1), precision),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let product = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("MatMul Product"),
            size: buffer_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("MatMul Params"),
            contents: bytemuck::bytes_of(&MatMulParams { size, _pad: [0; 3] }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("MatMul Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: lhs.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: rhs.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: product.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        let validation = device.pop_error_scope().block_on();
        let out_of_memory = device.pop_error_scope().block_on();
        if let Some(e) = out_of_memory.or(validation) {
            return Err(GpuError::BufferCreationFailed {
                message: e.to_string(),
            });
        }

        debug!(
            "GPU matmul {}x{} ({}) dispatching {}x{} workgroups",
            size, size, precision, workgroups, workgroups
        );

        Ok(Self {
            context,
            size,
            workgroups,
            pipeline,
            bind_group,
            product,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn precision(&self) -> Precision {
        self.context.precision()
    }

    pub fn adapter_name(&self) -> &str {
        self.context.adapter_name()
    }

    /// Encodes and submits one multiply without waiting for completion.
    pub fn dispatch(&self) {
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor::default());
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(self.workgroups, self.workgroups, 1);
        }
        self.context.queue.submit(Some(encoder.finish()));
    }

    /// Waits for submitted dispatches and surfaces any error they raised.
    pub fn synchronize(&self) -> GpuResult<()> {
        self.context.synchronize()
    }

    /// Copies the product back to the host, widened to `f32`.
    pub fn read_output_f32(&self) -> GpuResult<Vec<f32>> {
        let device = &self.context.device;
        let size = self.product.size();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("MatMul Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        encoder.copy_buffer_to_buffer(&self.product, 0, &staging, 0, size);
        self.context.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context.synchronize()?;

        receiver
            .recv()
            .map_err(|e| GpuError::MapFailed {
                message: e.to_string(),
            })?
            .map_err(|e| GpuError::MapFailed {
                message: e.to_string(),
            })?;

        let output = {
            let data = slice.get_mapped_range();
            match self.context.precision() {
                Precision::Fp16 => bytemuck::cast_slice::<u8, f16>(&data)
                    .iter()
                    .map(|v| v.to_f32())
                    .collect(),
                _ => bytemuck::cast_slice::<u8, f32>(&data).to_vec(),
            }
        };
        staging.unmap();
        Ok(output)
    }
}

/// Seeded operand in `[-1, 1)`, encoded at the device precision.
fn operand_bytes(elements: usize, seed: u64, precision: Precision) -> Vec<u8> {
    match precision {
        Precision::Fp16 => bytemuck::cast_slice(&uniform_f16(elements, 1.0, seed)).to_vec(),
        _ => bytemuck::cast_slice(&uniform_f32(elements, 1.0, seed)).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_bytes_width() {
        assert_eq!(operand_bytes(10, 1, Precision::Fp16).len(), 20);
        assert_eq!(operand_bytes(10, 1, Precision::Fp32).len(), 40);
    }

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<MatMulParams>(), 16);
    }
}
