pub mod dot;
pub mod rng;
