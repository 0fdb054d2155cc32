//! Hashed bag-of-words embeddings used when no model is available.
//!
//! Each lowercase whitespace token is hashed with SHA-256; the first eight
//! bytes pick a base index and the token increments [`HASHES_PER_TOKEN`]
//! consecutive slots from there. Output is unit-normalized and depends only on
//! the token multiset and the dimension.

use sha2::{Digest, Sha256};

use super::normalize;

/// Indices touched per token. Distinct as long as `dims >= HASHES_PER_TOKEN`.
pub const HASHES_PER_TOKEN: usize = 3;

pub fn hashed_embedding(text: &str, dims: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dims];
    if dims == 0 {
        return vector;
    }

    for token in text.to_lowercase().split_whitespace() {
        let base = token_base_index(token, dims);
        for offset in 0..HASHES_PER_TOKEN {
            vector[(base + offset) % dims] += 1.0;
        }
    }

    normalize(&mut vector);
    vector
}

fn token_base_index(token: &str, dims: usize) -> usize {
    let digest = Sha256::digest(token.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(head) % dims as u64) as usize
}
