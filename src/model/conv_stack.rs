//! Fixed-topology convolution stack and its traced, backend-neutral form.

use crate::activation::Activation;
use crate::errors::{ModelBuildError, ModelBuildResult};
use crate::model::quantize::QuantizedTensor;
use crate::utils::rng::uniform_f16;
use half::f16;
use serde::{Deserialize, Serialize};

/// Shape of the stack: `layers` blocks of `conv(k x k, C -> C) + activation`
/// over a `batch x C x size x size` input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvStackSpec {
    pub batch: usize,
    pub channels: usize,
    pub size: usize,
    pub kernel: usize,
    pub layers: usize,
    #[serde(default)]
    pub activation: Activation,
}

impl Default for ConvStackSpec {
    fn default() -> Self {
        Self {
            batch: 16,
            channels: 1536,
            size: 32,
            kernel: 3,
            layers: 5,
            activation: Activation::Relu,
        }
    }
}

impl ConvStackSpec {
    pub fn validate(&self) -> ModelBuildResult<()> {
        let dims = [
            ("batch", self.batch),
            ("channels", self.channels),
            ("size", self.size),
            ("kernel", self.kernel),
            ("layers", self.layers),
        ];
        for (name, value) in dims {
            if value == 0 {
                return Err(ModelBuildError::topology(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        if self.kernel % 2 == 0 {
            return Err(ModelBuildError::topology(format!(
                "kernel must be odd for same padding, got {}",
                self.kernel
            )));
        }
        if self.checked_operation_count().is_none() {
            return Err(ModelBuildError::topology(
                "operation count does not fit in 64 bits".to_string(),
            ));
        }
        Ok(())
    }

    /// Multiply-adds of the whole stack, counted as two operations each:
    /// `layers * 2 * C * k^2 * size^2 * C * batch`.
    ///
    /// Saturates at `u64::MAX`; [`validate`](Self::validate) rejects such shapes.
    pub fn operation_count(&self) -> u64 {
        self.checked_operation_count().unwrap_or(u64::MAX)
    }

    pub fn checked_operation_count(&self) -> Option<u64> {
        [
            self.channels,
            self.kernel,
            self.kernel,
            self.size,
            self.size,
            self.channels,
            self.batch,
        ]
        .into_iter()
        .try_fold((self.layers as u64).checked_mul(2)?, |count, dim| {
            count.checked_mul(dim as u64)
        })
    }

    /// `[batch, C, size, size]`; every layer preserves it.
    pub fn input_shape(&self) -> [usize; 4] {
        [self.batch, self.channels, self.size, self.size]
    }

    /// `[C_out, C_in, k, k]`.
    pub fn weight_shape(&self) -> [usize; 4] {
        [self.channels, self.channels, self.kernel, self.kernel]
    }

    pub fn padding(&self) -> usize {
        self.kernel / 2
    }

    pub fn input_len(&self) -> usize {
        self.input_shape().iter().product()
    }

    /// Materializes seeded FP16 weights for every layer.
    ///
    /// Weights are uniform in `±1/sqrt(C * k * k)`, the default fan-in bound
    /// for convolutions.
    pub fn trace(&self, seed: u64) -> ModelBuildResult<TracedModel> {
        self.validate()?;

        let weight_len = self
            .weight_shape()
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| ModelBuildError::TraceFailed {
                message: format!("weight tensor of {:?} overflows", self.weight_shape()),
            })?;
        if self.input_shape().iter().try_fold(1usize, |acc, &d| acc.checked_mul(d)).is_none() {
            return Err(ModelBuildError::TraceFailed {
                message: format!("input tensor of {:?} overflows", self.input_shape()),
            });
        }

        let fan_in = (self.channels * self.kernel * self.kernel) as f32;
        let bound = 1.0 / fan_in.sqrt();

        let layers = (0..self.layers)
            .map(|index| ConvLayer {
                shape: self.weight_shape(),
                weights: LayerWeights::Float(uniform_f16(
                    weight_len,
                    bound,
                    seed.wrapping_add(index as u64),
                )),
            })
            .collect();

        Ok(TracedModel { spec: *self, layers })
    }

    /// Seeded FP16 input in `[-1, 1)` matching [`input_shape`](Self::input_shape).
    pub fn sample_input(&self, seed: u64) -> Vec<f16> {
        uniform_f16(self.input_len(), 1.0, seed)
    }
}

/// Weights of one convolution, either as traced or after quantization.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerWeights {
    Float(Vec<f16>),
    Quantized(QuantizedTensor),
}

impl LayerWeights {
    pub fn len(&self) -> usize {
        match self {
            LayerWeights::Float(values) => values.len(),
            LayerWeights::Quantized(tensor) => tensor.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_quantized(&self) -> bool {
        matches!(self, LayerWeights::Quantized(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvLayer {
    pub shape: [usize; 4],
    pub weights: LayerWeights,
}

/// The stack with concrete weights, ready for quantization or compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedModel {
    pub spec: ConvStackSpec,
    pub layers: Vec<ConvLayer>,
}

impl TracedModel {
    pub fn operation_count(&self) -> u64 {
        self.spec.operation_count()
    }

    pub fn quantized_layers(&self) -> usize {
        self.layers
            .iter()
            .filter(|layer| layer.weights.is_quantized())
            .count()
    }
}
