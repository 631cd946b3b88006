//! The convolution stack run on the neural accelerator.
//!
//! [`ConvStackSpec::trace`] produces a backend-neutral [`TracedModel`] with
//! concrete FP16 weights. [`quantize_model`] rewrites its large weight tensors
//! to INT8 in place, and [`ModelBuilder`] hands the result to the toolkit for
//! compilation.

pub mod builder;
pub mod conv_stack;
pub mod quantize;

pub use builder::{BuildOutcome, ModelBuilder};
pub use conv_stack::{ConvLayer, ConvStackSpec, LayerWeights, TracedModel};
pub use quantize::{DEFAULT_WEIGHT_THRESHOLD, QuantizeError, QuantizedTensor, quantize_model};
