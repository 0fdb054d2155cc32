//! Weighted combination of the semantic and structural scores.

use serde::{Deserialize, Serialize};

use super::round2;

pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.6;
pub const DEFAULT_STRUCTURAL_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub semantic: f64,
    pub structural: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            semantic: DEFAULT_SEMANTIC_WEIGHT,
            structural: DEFAULT_STRUCTURAL_WEIGHT,
        }
    }
}

/// Final score in `[0, 100]`, rounded to two decimals.
///
/// Without a semantic score (no job description) the structural score stands
/// alone.
pub fn fuse(structural: f64, semantic: Option<f64>, weights: &FusionWeights) -> f64 {
    let raw = match semantic {
        Some(semantic) => weights.semantic * semantic + weights.structural * structural,
        None => structural,
    };
    round2(raw).clamp(0.0, 100.0)
}
