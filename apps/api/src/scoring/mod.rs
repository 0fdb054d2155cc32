pub mod fusion;
pub mod similarity;

pub use fusion::{fuse, FusionWeights};
pub use similarity::similarity_percentage;

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
