//! Non-linearities that follow each convolution block.
//!
//! Only element-wise activations are supported: they map one-to-one onto an
//! element-wise layer of the neural toolkit's graph format and leave tensor
//! shapes untouched, so the operation count of the stack is independent of
//! the chosen activation.

use serde::{Deserialize, Serialize};

/// Represents the activation applied after every convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Activation {
    /// Rectified Linear Unit activation function: f(x) = max(0, x).
    #[default]
    Relu,
    /// Sigmoid activation function: f(x) = 1 / (1 + exp(-x)).
    Sigmoid,
    /// Hyperbolic tangent activation function: f(x) = tanh(x).
    Tanh,
}

impl Activation {
    /// Layer type and opset of the equivalent element-wise graph operation.
    pub fn graph_op(self) -> (&'static str, &'static str) {
        match self {
            Activation::Relu => ("ReLU", "opset1"),
            Activation::Sigmoid => ("Sigmoid", "opset1"),
            Activation::Tanh => ("Tanh", "opset1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_op_names() {
        assert_eq!(Activation::Relu.graph_op().0, "ReLU");
        assert_eq!(Activation::Tanh.graph_op().0, "Tanh");
    }

    #[test]
    fn test_serde_uppercase() {
        let json = serde_json::to_string(&Activation::Sigmoid).unwrap();
        assert_eq!(json, "\"SIGMOID\"");
        let parsed: Activation = serde_json::from_str("\"RELU\"").unwrap();
        assert_eq!(parsed, Activation::Relu);
        assert!(serde_json::from_str::<Activation>("\"SOFTMAX\"").is_err());
    }
}
