//! Numeric precision a workload computes in.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Precision {
    Fp32,
    Fp16,
    /// 8-bit weights with 16-bit activations (W8A16).
    Int8,
}

impl Precision {
    /// Storage size of one element in bytes.
    pub fn element_bytes(self) -> usize {
        match self {
            Precision::Fp32 => 4,
            Precision::Fp16 => 2,
            Precision::Int8 => 1,
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Fp32 => write!(f, "FP32"),
            Precision::Fp16 => write!(f, "FP16"),
            Precision::Int8 => write!(f, "INT8"),
        }
    }
}
