//! Linear symmetric INT8 weight quantization (W8A16).
//!
//! Each output channel gets its own scale `max|w| / 127` and no zero point.
//! Values are rounded to nearest and clamped to `[-127, 127]`, so the grid is
//! symmetric around zero. Activations are untouched.

use crate::errors::{ModelBuildError, ModelBuildResult};
use crate::model::conv_stack::{LayerWeights, TracedModel};
use half::f16;
use log::debug;
use rayon::prelude::*;
use thiserror::Error;

/// Tensors with at most this many elements stay in floating point.
pub const DEFAULT_WEIGHT_THRESHOLD: usize = 512;

const QMAX: f32 = 127.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantizeError {
    #[error("{len} elements cannot be split into {channels} channels")]
    ChannelMismatch { len: usize, channels: usize },

    #[error("Non-finite weight at index {index}")]
    NonFinite { index: usize },
}

/// INT8 values with one scale per output channel.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedTensor {
    pub values: Vec<i8>,
    pub scales: Vec<f32>,
    pub channels: usize,
}

impl QuantizedTensor {
    pub fn per_channel(&self) -> usize {
        self.values.len() / self.channels
    }

    pub fn dequantize(&self) -> Vec<f32> {
        let per_channel = self.per_channel();
        self.values
            .chunks(per_channel)
            .zip(&self.scales)
            .flat_map(|(chunk, &scale)| chunk.iter().map(move |&q| q as f32 * scale))
            .collect()
    }
}

/// Quantizes `weights`, laid out with the output channel outermost.
pub fn quantize_symmetric(weights: &[f32], channels: usize) -> Result<QuantizedTensor, QuantizeError> {
    if channels == 0 || weights.is_empty() || weights.len() % channels != 0 {
        return Err(QuantizeError::ChannelMismatch {
            len: weights.len(),
            channels,
        });
    }
    if let Some(index) = weights.iter().position(|w| !w.is_finite()) {
        return Err(QuantizeError::NonFinite { index });
    }

    let per_channel = weights.len() / channels;
    let quantized: Vec<(f32, Vec<i8>)> = weights
        .par_chunks(per_channel)
        .map(quantize_channel)
        .collect();

    let mut values = Vec::with_capacity(weights.len());
    let mut scales = Vec::with_capacity(channels);
    for (scale, channel) in quantized {
        scales.push(scale);
        values.extend(channel);
    }

    Ok(QuantizedTensor {
        values,
        scales,
        channels,
    })
}

fn quantize_channel(channel: &[f32]) -> (f32, Vec<i8>) {
    let max_abs = channel.iter().fold(0.0f32, |acc, w| acc.max(w.abs()));
    // All-zero channel: any scale reproduces it exactly.
    let scale = if max_abs > 0.0 { max_abs / QMAX } else { 1.0 };
    let values = channel
        .iter()
        .map(|w| (w / scale).round().clamp(-QMAX, QMAX) as i8)
        .collect();
    (scale, values)
}

/// Quantizes every float layer larger than `threshold` elements in place.
///
/// Returns the number of layers converted.
pub fn quantize_model(model: &mut TracedModel, threshold: usize) -> ModelBuildResult<usize> {
    let mut converted = 0;
    for (index, layer) in model.layers.iter_mut().enumerate() {
        let LayerWeights::Float(values) = &layer.weights else {
            continue;
        };
        if values.len() <= threshold {
            debug!(
                "Layer {} has {} weights, keeping FP16 (threshold {})",
                index,
                values.len(),
                threshold
            );
            continue;
        }

        let widened: Vec<f32> = values.iter().map(|v| f16::to_f32(*v)).collect();
        let tensor = quantize_symmetric(&widened, layer.shape[0])
            .map_err(|source| ModelBuildError::QuantizationFailed { layer: index, source })?;
        layer.weights = LayerWeights::Quantized(tensor);
        converted += 1;
    }
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::conv_stack::ConvStackSpec;

    #[test]
    fn test_per_channel_scales() {
        let weights = [0.75, -1.0, 0.25, 0.0, 2.0, -0.5, 1.5, 0.0];
        let tensor = quantize_symmetric(&weights, 2).unwrap();
        assert_eq!(tensor.scales, vec![1.0 / 127.0, 2.0 / 127.0]);
        assert_eq!(tensor.values, vec![95, -127, 32, 0, 127, -32, 95, 0]);
    }

    #[test]
    fn test_dequantize_error_is_bounded_by_half_step() {
        let weights: Vec<f32> = (0..64).map(|i| ((i as f32) * 0.7).sin() * 0.3).collect();
        let tensor = quantize_symmetric(&weights, 4).unwrap();
        let restored = tensor.dequantize();
        for (channel, (orig, back)) in weights.chunks(16).zip(restored.chunks(16)).enumerate() {
            let half_step = tensor.scales[channel] / 2.0 + 1e-6;
            for (a, b) in orig.iter().zip(back) {
                assert!((a - b).abs() <= half_step);
            }
        }
    }

    #[test]
    fn test_zero_channel_and_errors() {
        let tensor = quantize_symmetric(&[0.0; 6], 2).unwrap();
        assert_eq!(tensor.scales, vec![1.0, 1.0]);
        assert!(tensor.values.iter().all(|&q| q == 0));

        assert_eq!(
            quantize_symmetric(&[1.0; 5], 2),
            Err(QuantizeError::ChannelMismatch { len: 5, channels: 2 })
        );
        assert_eq!(
            quantize_symmetric(&[1.0, f32::NAN], 1),
            Err(QuantizeError::NonFinite { index: 1 })
        );
    }

    #[test]
    fn test_quantize_model_respects_threshold() {
        let spec = ConvStackSpec {
            batch: 1,
            channels: 8,
            size: 4,
            kernel: 3,
            layers: 3,
            ..Default::default()
        };
        // 8 * 8 * 9 = 576 weights per layer.
        let mut model = spec.trace(5).unwrap();
        assert_eq!(quantize_model(&mut model, 576).unwrap(), 0);
        assert_eq!(model.quantized_layers(), 0);

        assert_eq!(quantize_model(&mut model, DEFAULT_WEIGHT_THRESHOLD).unwrap(), 3);
        assert_eq!(model.quantized_layers(), 3);
        let LayerWeights::Quantized(tensor) = &model.layers[0].weights else {
            panic!("layer should be quantized");
        };
        assert_eq!(tensor.channels, 8);
        assert_eq!(tensor.per_channel(), 72);

        // Already quantized layers are left alone.
        assert_eq!(quantize_model(&mut model, DEFAULT_WEIGHT_THRESHOLD).unwrap(), 0);
    }
}
