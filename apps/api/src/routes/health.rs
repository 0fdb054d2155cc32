use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Service status plus which embedding backend is active.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let embeddings = &state.embeddings;
    let mode = if !embeddings.is_initialized() {
        "uninitialized"
    } else if embeddings.is_degraded() {
        "hashed"
    } else {
        "model"
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "embedding": {
            "mode": mode,
            "model": embeddings.model_name(),
            "dims": embeddings.dims(),
        },
        "analyses_in_flight": state.orchestrator.in_flight(),
    }))
}
