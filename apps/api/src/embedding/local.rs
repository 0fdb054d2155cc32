//! Local ONNX sentence embeddings through fastembed.
//!
//! Models are downloaded from Hugging Face on first load and cached; after
//! that inference is fully offline. `TextEmbedding::embed` needs `&mut self`,
//! so the session sits behind a mutex and calls run on the blocking pool.

use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};

use super::EmbeddingModel;

pub struct FastEmbedModel {
    model_name: String,
    dims: usize,
    inner: Mutex<fastembed::TextEmbedding>,
}

impl FastEmbedModel {
    /// Loads the model. Blocking: may download weights.
    pub fn load(model_name: &str) -> Result<Self> {
        let (model, dims) = resolve_model(model_name)?;
        let inner = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(model).with_show_download_progress(false),
        )
        .map_err(|e| anyhow!("Failed to initialize local embedding model: {e}"))?;

        Ok(Self {
            model_name: model_name.to_string(),
            dims,
            inner: Mutex::new(inner),
        })
    }
}

impl EmbeddingModel for FastEmbedModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut model = self
            .inner
            .lock()
            .map_err(|_| anyhow!("embedding model lock poisoned"))?;
        model
            .embed(texts.to_vec(), None)
            .map_err(|e| anyhow!("Local embedding failed: {e}"))
    }
}

fn resolve_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    match name {
        "all-minilm-l6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" => Ok((fastembed::EmbeddingModel::BGELargeENV15, 1024)),
        "nomic-embed-text-v1.5" => Ok((fastembed::EmbeddingModel::NomicEmbedTextV15, 768)),
        "multilingual-e5-small" => Ok((fastembed::EmbeddingModel::MultilingualE5Small, 384)),
        other => bail!(
            "Unknown local embedding model: '{other}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small"
        ),
    }
}
