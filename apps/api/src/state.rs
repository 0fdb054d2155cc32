use std::sync::Arc;

use crate::analysis::Orchestrator;
use crate::embedding::EmbeddingEngine;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    /// Entry point for analysis runs and background job embedding.
    pub orchestrator: Orchestrator,
    /// Same engine the worker uses; read here only for health reporting.
    pub embeddings: Arc<EmbeddingEngine>,
}
