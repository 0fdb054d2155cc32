use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::candidates::contact::extract_contact_info;
use crate::candidates::extract::extract_text;
use crate::errors::AppError;
use crate::models::{Candidate, NewCandidate, ProcessingStatus};
use crate::state::AppState;

/// Multipart field carrying the resume file.
const RESUME_FIELD: &str = "resume";

#[derive(Debug, Deserialize)]
pub struct CreateCandidateRequest {
    pub resume_text: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub candidate: Candidate,
    /// Items listed under the resume's own skills heading, if any.
    pub listed_skills: Vec<String>,
}

/// Row in the candidate list.
#[derive(Debug, Serialize)]
pub struct CandidateSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub resume_filename: Option<String>,
    pub job_id: Option<Uuid>,
    pub status: ProcessingStatus,
    pub final_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<Candidate> for CandidateSummary {
    fn from(c: Candidate) -> Self {
        Self {
            id: c.id,
            name: c.name,
            email: c.email,
            resume_filename: c.resume_filename,
            job_id: c.job_id,
            status: c.status,
            final_score: c.final_score,
            created_at: c.created_at,
        }
    }
}

/// POST /api/v1/candidates
pub async fn handle_create_candidate(
    State(state): State<AppState>,
    Json(req): Json<CreateCandidateRequest>,
) -> Result<(StatusCode, Json<Candidate>), AppError> {
    let resume_text = req.resume_text.trim();
    if resume_text.is_empty() {
        return Err(AppError::Validation("resume_text must not be empty".to_string()));
    }

    let contact = extract_contact_info(resume_text);
    let candidate = state
        .store
        .insert_candidate(NewCandidate {
            name: req.name.or(contact.name),
            email: req.email.or(contact.email),
            phone: contact.phone,
            linkedin_url: contact.linkedin_url,
            resume_filename: None,
            resume_text: resume_text.to_string(),
        })
        .await?;

    info!(candidate_id = %candidate.id, "Candidate created");
    Ok((StatusCode::CREATED, Json(candidate)))
}

/// POST /api/v1/candidates/upload
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(RESUME_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("resume field has no filename".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("failed to read upload: {e}")))?;
        upload = Some((filename, bytes));
        break;
    }

    let (filename, bytes) = upload.ok_or_else(|| {
        AppError::Validation(format!("multipart field '{RESUME_FIELD}' is required"))
    })?;

    let name_for_extract = filename.clone();
    let text = tokio::task::spawn_blocking(move || extract_text(&bytes, &name_for_extract))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("extraction task failed: {e}")))??;

    let contact = extract_contact_info(&text);
    let candidate = state
        .store
        .insert_candidate(NewCandidate {
            name: contact.name,
            email: contact.email,
            phone: contact.phone,
            linkedin_url: contact.linkedin_url,
            resume_filename: Some(filename),
            resume_text: text,
        })
        .await?;

    info!(
        candidate_id = %candidate.id,
        filename = candidate.resume_filename.as_deref().unwrap_or_default(),
        "Resume uploaded"
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            candidate,
            listed_skills: contact.skills,
        }),
    ))
}

/// GET /api/v1/candidates
pub async fn handle_list_candidates(
    State(state): State<AppState>,
) -> Result<Json<Vec<CandidateSummary>>, AppError> {
    let candidates = state.store.list_candidates().await?;
    Ok(Json(candidates.into_iter().map(CandidateSummary::from).collect()))
}

/// GET /api/v1/candidates/:id
pub async fn handle_get_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Candidate>, AppError> {
    state
        .store
        .get_candidate(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Candidate {id} not found")))
}

/// DELETE /api/v1/candidates/:id
pub async fn handle_delete_candidate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    // Stop any run first so it cannot write to a deleted row.
    state.orchestrator.cancel(id).await?;
    if !state.store.delete_candidate(id).await? {
        return Err(AppError::NotFound(format!("Candidate {id} not found")));
    }
    info!(candidate_id = %id, "Candidate deleted");
    Ok(StatusCode::NO_CONTENT)
}
