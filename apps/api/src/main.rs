mod analysis;
mod candidates;
mod config;
mod db;
mod embedding;
mod errors;
mod jobs;
mod llm_client;
mod models;
mod routes;
mod scoring;
mod state;
mod store;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::{worker, AnalysisServices, StructuralAnalyzer, WorkerOptions};
use crate::config::Config;
use crate::db::create_pool;
use crate::embedding::EmbeddingEngine;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::postgres::PgStore;
use crate::store::{Store, INTERRUPTED_MESSAGE};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting match API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let pool = create_pool(&config.database_url).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    // Runs do not survive a restart; release candidates left mid-analysis
    let recovered = store.recover_interrupted(INTERRUPTED_MESSAGE).await?;
    if recovered > 0 {
        warn!(recovered, "Marked interrupted analyses as errored");
    }

    // Embedding engine; the model loads on first use
    let embeddings = Arc::new(EmbeddingEngine::from_settings(config.embedding.clone()));
    info!(
        "Embedding engine configured (model: {}, dims: {})",
        embeddings.model_name(),
        embeddings.dims()
    );
    {
        let embeddings = embeddings.clone();
        tokio::spawn(async move {
            let loaded = embeddings.warm_up().await;
            info!(loaded, "Embedding model warm-up finished");
        });
    }

    // Initialize LLM client; the analyzer bounds each call including retries
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.llm_model.clone(),
        config.llm_timeout,
    )?;
    info!("LLM client initialized (model: {})", llm.model());
    let analyzer = Arc::new(StructuralAnalyzer::new(Arc::new(llm), config.llm_timeout));

    // Analysis worker
    let (orchestrator, _worker) = worker::start(
        AnalysisServices {
            store: store.clone(),
            embeddings: embeddings.clone(),
            analyzer,
            weights: config.fusion_weights,
        },
        WorkerOptions {
            concurrency: config.analysis_concurrency,
            queue_capacity: config.analysis_queue_capacity,
        },
    );
    info!(
        "Analysis worker started (concurrency: {}, fusion weights: {:?})",
        config.analysis_concurrency, config.fusion_weights
    );

    let state = AppState {
        store,
        orchestrator,
        embeddings,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
