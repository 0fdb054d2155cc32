//! Cosine similarity between embeddings and its 0-100 percentage form.

use super::round2;

/// Cosine similarity of `a` and `b`, clipped to `[-1, 1]`.
///
/// Returns 0.0 when either vector is empty, the lengths differ, or either has
/// zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}

/// Maps a similarity in `[-1, 1]` linearly onto `[0, 100]`.
pub fn to_percentage(similarity: f64) -> f64 {
    round2(((similarity + 1.0) / 2.0) * 100.0)
}

pub fn similarity_percentage(a: &[f32], b: &[f32]) -> f64 {
    to_percentage(cosine_similarity(a, b))
}
