use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::embedding::EmbeddingSettings;
use crate::scoring::fusion::FusionWeights;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub anthropic_api_key: String,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub embedding: EmbeddingSettings,
    pub fusion_weights: FusionWeights,
    pub analysis_concurrency: usize,
    pub analysis_queue_capacity: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = EmbeddingSettings::default();
        let embedding = EmbeddingSettings {
            model: optional_env("EMBEDDING_MODEL").unwrap_or(defaults.model),
            dims: parse_env("EMBEDDING_DIMS", defaults.dims)?,
            max_chunk_chars: parse_env("EMBEDDING_MAX_CHUNK_CHARS", defaults.max_chunk_chars)?,
        };
        if embedding.dims < 3 {
            bail!("EMBEDDING_DIMS must be at least 3, got {}", embedding.dims);
        }
        if embedding.max_chunk_chars == 0 {
            bail!("EMBEDDING_MAX_CHUNK_CHARS must be positive");
        }

        let default_weights = FusionWeights::default();
        let fusion_weights = FusionWeights {
            semantic: parse_env("FUSION_SEMANTIC_WEIGHT", default_weights.semantic)?,
            structural: parse_env("FUSION_STRUCTURAL_WEIGHT", default_weights.structural)?,
        };
        validate_weights(&fusion_weights)?;

        let analysis_concurrency: usize = parse_env("ANALYSIS_CONCURRENCY", 3)?;
        if analysis_concurrency == 0 {
            bail!("ANALYSIS_CONCURRENCY must be at least 1");
        }

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            llm_model: optional_env("LLM_MODEL")
                .unwrap_or_else(|| crate::llm_client::DEFAULT_MODEL.to_string()),
            llm_timeout: Duration::from_secs(parse_env("LLM_TIMEOUT_SECS", 60u64)?),
            embedding,
            fusion_weights,
            analysis_concurrency,
            analysis_queue_capacity: parse_env("ANALYSIS_QUEUE_CAPACITY", 64usize)?.max(1),
            port: parse_env("PORT", 8080u16)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn validate_weights(weights: &FusionWeights) -> Result<()> {
    let valid = |w: f64| w.is_finite() && w >= 0.0;
    if !valid(weights.semantic) || !valid(weights.structural) {
        bail!("fusion weights must be finite and non-negative: {weights:?}");
    }
    Ok(())
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has invalid value '{raw}': {e}")),
        None => Ok(default),
    }
}
