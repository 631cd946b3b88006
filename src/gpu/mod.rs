//! GPU compute through `wgpu`.
//!
//! The benchmark only ever opens one device: the adapter picked by
//! [`crate::backend::select`]. [`GpuContext`] wraps that device and decides the
//! shader precision; [`GpuMatMul`] owns the pipeline and resident operands for
//! the matrix-multiply workload.
//!
//! # Usage
//!
//! ```ignore
//! use accel_bench::backend;
//! use accel_bench::gpu::{GpuContext, GpuMatMul};
//!
//! let selection = backend::select();
//! if let Some(adapter) = selection.adapter() {
//!     let context = GpuContext::from_adapter(adapter, true)?;
//!     let matmul = GpuMatMul::new(context, 4096, 42)?;
//!     matmul.dispatch();
//!     matmul.synchronize()?;
//! }
//! ```

pub mod context;
pub mod errors;
pub mod matmul;
pub mod shaders;

pub use context::GpuContext;
pub use errors::{GpuError, GpuResult};
pub use matmul::GpuMatMul;
pub use shaders::matmul_wgsl;
