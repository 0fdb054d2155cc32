use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{JobRef, TriggerOutcome};
use crate::errors::AppError;
use crate::models::ProcessingStatus;
use crate::state::AppState;

/// Body of an analyze request. At most one of the two may be set.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeRequest {
    pub job_id: Option<Uuid>,
    pub job_text: Option<String>,
}

impl AnalyzeRequest {
    fn into_job_ref(self) -> Result<JobRef, AppError> {
        match (self.job_id, self.job_text) {
            (Some(_), Some(_)) => Err(AppError::Validation(
                "provide either job_id or job_text, not both".to_string(),
            )),
            (Some(id), None) => Ok(JobRef::Id(id)),
            (None, Some(text)) => Ok(JobRef::Text(text)),
            (None, None) => Ok(JobRef::None),
        }
    }

    /// An empty body means a quality-only run. Anything else must be a JSON
    /// object of this shape.
    fn from_body(headers: &HeaderMap, body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let is_json = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Err(AppError::Validation(
                "analyze request body must be sent as application/json".to_string(),
            ));
        }

        serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("invalid analyze request: {e}")))
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub candidate_id: Uuid,
    pub status: ProcessingStatus,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub candidate_id: Uuid,
    pub cancelled: bool,
}

/// POST /api/v1/candidates/:id/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<AnalyzeResponse>), AppError> {
    let job = AnalyzeRequest::from_body(&headers, &body)?.into_job_ref()?;

    match state.orchestrator.trigger(id, job).await? {
        TriggerOutcome::Accepted => Ok((
            StatusCode::ACCEPTED,
            Json(AnalyzeResponse {
                candidate_id: id,
                status: ProcessingStatus::Analyzing,
            }),
        )),
        TriggerOutcome::Rejected => Err(AppError::Conflict(format!(
            "Analysis already in progress for candidate {id}"
        ))),
    }
}

/// POST /api/v1/candidates/:id/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    if state.store.get_candidate(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Candidate {id} not found")));
    }
    let cancelled = state.orchestrator.cancel(id).await?;
    Ok(Json(CancelResponse {
        candidate_id: id,
        cancelled,
    }))
}
