use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{JobDescription, NewJobDescription};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    pub description_text: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub description_text: Option<String>,
}

/// Full record. The vector itself is never returned.
#[derive(Debug, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: JobDescription,
    pub has_embedding: bool,
}

impl From<JobDescription> for JobDetail {
    fn from(job: JobDescription) -> Self {
        let has_embedding = job.has_embedding();
        Self { job, has_embedding }
    }
}

#[derive(Debug, Serialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub title: String,
    pub preview: String,
    pub has_embedding: bool,
    pub created_at: DateTime<Utc>,
}

impl From<JobDescription> for JobSummary {
    fn from(job: JobDescription) -> Self {
        Self {
            preview: job.preview(),
            has_embedding: job.has_embedding(),
            id: job.id,
            title: job.title,
            created_at: job.created_at,
        }
    }
}

fn non_blank(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobDetail>), AppError> {
    let input = NewJobDescription {
        title: non_blank("title", &req.title)?,
        description_text: non_blank("description_text", &req.description_text)?,
    };
    let job = state.store.insert_job(input).await?;
    state.orchestrator.schedule_job_embedding(job.id);

    info!(job_id = %job.id, "Job description created");
    Ok((StatusCode::CREATED, Json(job.into())))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobSummary>>, AppError> {
    let jobs = state.store.list_jobs().await?;
    Ok(Json(jobs.into_iter().map(JobSummary::from).collect()))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobDetail>, AppError> {
    state
        .store
        .get_job(id)
        .await?
        .map(|job| Json(job.into()))
        .ok_or_else(|| AppError::NotFound(format!("Job description {id} not found")))
}

/// PUT /api/v1/jobs/:id
pub async fn handle_update_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<JobDetail>, AppError> {
    let title = req.title.as_deref().map(|t| non_blank("title", t)).transpose()?;
    let text = req
        .description_text
        .as_deref()
        .map(|t| non_blank("description_text", t))
        .transpose()?;
    let text_changed = text.is_some();

    let job = state
        .store
        .update_job(id, title, text)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job description {id} not found")))?;

    if text_changed {
        state.orchestrator.schedule_job_embedding(job.id);
    }
    info!(job_id = %id, text_changed, "Job description updated");
    Ok(Json(job.into()))
}

/// DELETE /api/v1/jobs/:id
pub async fn handle_delete_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.store.delete_job(id).await? {
        return Err(AppError::NotFound(format!("Job description {id} not found")));
    }
    info!(job_id = %id, "Job description deleted");
    Ok(StatusCode::NO_CONTENT)
}
