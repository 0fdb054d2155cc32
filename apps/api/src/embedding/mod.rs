//! Text embeddings for resumes and job descriptions.
//!
//! [`EmbeddingEngine`] turns text into a fixed-dimension, L2-normalized vector.
//! Long text is chunked on whitespace, each chunk embedded independently, and
//! the chunk vectors averaged. The model is loaded lazily, once per engine; if
//! it cannot be loaded, or a call into it fails, the engine falls back to
//! [`hashed::hashed_embedding`] instead of failing the caller.

pub mod hashed;
#[cfg(feature = "local-embeddings")]
pub mod local;

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

pub use hashed::hashed_embedding;

pub const DEFAULT_MODEL: &str = "all-minilm-l6-v2";
pub const DEFAULT_DIMS: usize = 384;
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 5000;

/// Embedding configuration. One `dims` per deployment: every stored vector
/// has this length.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingSettings {
    pub model: String,
    pub dims: usize,
    pub max_chunk_chars: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            dims: DEFAULT_DIMS,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

/// A loaded embedding model. Calls are blocking and run on the blocking pool.
pub trait EmbeddingModel: Send + Sync {
    fn model_name(&self) -> &str;
    fn dims(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Loads the model. Invoked at most once per engine.
pub type ModelLoader = Arc<dyn Fn() -> Result<Arc<dyn EmbeddingModel>> + Send + Sync>;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub struct EmbeddingEngine {
    settings: EmbeddingSettings,
    loader: ModelLoader,
    model: OnceCell<Option<Arc<dyn EmbeddingModel>>>,
}

impl EmbeddingEngine {
    pub fn new(settings: EmbeddingSettings, loader: ModelLoader) -> Self {
        Self {
            settings,
            loader,
            model: OnceCell::new(),
        }
    }

    /// Engine backed by the compiled-in local model support.
    pub fn from_settings(settings: EmbeddingSettings) -> Self {
        let loader = default_loader(&settings);
        Self::new(settings, loader)
    }

    pub fn dims(&self) -> usize {
        self.settings.dims
    }

    pub fn model_name(&self) -> &str {
        &self.settings.model
    }

    /// True once initialization has run and no model could be loaded.
    pub fn is_degraded(&self) -> bool {
        matches!(self.model.get(), Some(None))
    }

    pub fn is_initialized(&self) -> bool {
        self.model.initialized()
    }

    /// Forces model initialization. Returns whether a real model is in use.
    pub async fn warm_up(&self) -> bool {
        self.model().await.is_some()
    }

    /// Embeds `text` into a vector of length `dims()`.
    ///
    /// Blank input yields the zero vector. Only a panicked or cancelled
    /// blocking task is reported as an error; model failures degrade to the
    /// hashed embedding.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let dims = self.settings.dims;
        if text.trim().is_empty() {
            return Ok(vec![0.0; dims]);
        }

        let chunks = chunk_words(text, self.settings.max_chunk_chars);

        if let Some(model) = self.model().await {
            let batch = chunks.clone();
            let result = tokio::task::spawn_blocking(move || model.embed_batch(&batch)).await?;
            match result {
                Ok(vectors) if valid_batch(&vectors, chunks.len(), dims) => {
                    return Ok(mean_normalized(&vectors, dims));
                }
                Ok(vectors) => warn!(
                    expected_chunks = chunks.len(),
                    returned = vectors.len(),
                    "Embedding model returned malformed output, using hashed fallback"
                ),
                Err(e) => warn!("Embedding model call failed, using hashed fallback: {e:#}"),
            }
        }

        let mut vectors: Vec<Vec<f32>> = chunks
            .iter()
            .map(|chunk| hashed_embedding(chunk, dims))
            .collect();
        // Hashed vectors are already unit length.
        if vectors.len() == 1 {
            return Ok(vectors.swap_remove(0));
        }
        Ok(mean_normalized(&vectors, dims))
    }

    async fn model(&self) -> Option<Arc<dyn EmbeddingModel>> {
        self.model
            .get_or_init(|| async {
                let loader = self.loader.clone();
                let expected_dims = self.settings.dims;
                let name = self.settings.model.clone();

                match tokio::task::spawn_blocking(move || loader()).await {
                    Ok(Ok(model)) if model.dims() == expected_dims => {
                        info!(model = %model.model_name(), dims = expected_dims, "Embedding model loaded");
                        Some(model)
                    }
                    Ok(Ok(model)) => {
                        warn!(
                            model = %name,
                            model_dims = model.dims(),
                            configured_dims = expected_dims,
                            "Embedding model dimension mismatch, running in hashed mode"
                        );
                        None
                    }
                    Ok(Err(e)) => {
                        warn!(model = %name, "Embedding model unavailable, running in hashed mode: {e:#}");
                        None
                    }
                    Err(e) => {
                        warn!(model = %name, "Embedding model loader panicked, running in hashed mode: {e}");
                        None
                    }
                }
            })
            .await
            .clone()
    }
}

fn valid_batch(vectors: &[Vec<f32>], chunks: usize, dims: usize) -> bool {
    vectors.len() == chunks && vectors.iter().all(|v| v.len() == dims)
}

#[cfg(feature = "local-embeddings")]
pub fn default_loader(settings: &EmbeddingSettings) -> ModelLoader {
    let model = settings.model.clone();
    Arc::new(move || {
        let loaded = local::FastEmbedModel::load(&model)?;
        Ok(Arc::new(loaded) as Arc<dyn EmbeddingModel>)
    })
}

#[cfg(not(feature = "local-embeddings"))]
pub fn default_loader(settings: &EmbeddingSettings) -> ModelLoader {
    let model = settings.model.clone();
    Arc::new(move || {
        Err(anyhow::anyhow!(
            "model '{model}' requested but local embeddings were not compiled in \
             (enable the `local-embeddings` feature)"
        ))
    })
}

/// Greedily packs whole words, joined by single spaces, into chunks of at most
/// `max_chars` characters. A word longer than the limit is its own chunk.
pub fn chunk_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        if current_chars == 0 {
            current.push_str(word);
            current_chars = word_chars;
        } else if current_chars + 1 + word_chars <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_chars += 1 + word_chars;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
            current_chars = word_chars;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Scales `v` to unit length in place. Zero vectors are left as they are.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Arithmetic mean of `vectors`, re-normalized unless the mean is zero.
pub fn mean_normalized(vectors: &[Vec<f32>], dims: usize) -> Vec<f32> {
    let mut mean = vec![0.0f32; dims];
    if vectors.is_empty() {
        return mean;
    }
    for v in vectors {
        for (acc, x) in mean.iter_mut().zip(v) {
            *acc += x;
        }
    }
    let count = vectors.len() as f32;
    for x in mean.iter_mut() {
        *x /= count;
    }
    normalize(&mut mean);
    mean
}
