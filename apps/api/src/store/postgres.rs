use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{BeginOutcome, Store};
use crate::models::{
    AnalysisRecord, Candidate, Findings, JobDescription, NewCandidate, NewJobDescription,
    ProcessingStatus,
};

/// PostgreSQL-backed [`Store`]. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CandidateRow {
    id: Uuid,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    linkedin_url: Option<String>,
    resume_filename: Option<String>,
    resume_text: String,
    resume_embedding: Option<Vec<f32>>,
    job_id: Option<Uuid>,
    semantic_match_score: Option<f64>,
    structural_score: Option<f64>,
    final_score: Option<f64>,
    matched_skills: Vec<String>,
    missing_skills: Vec<String>,
    findings: Option<Json<Findings>>,
    status: String,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CandidateRow> for Candidate {
    type Error = anyhow::Error;

    fn try_from(row: CandidateRow) -> Result<Self> {
        Ok(Candidate {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            linkedin_url: row.linkedin_url,
            resume_filename: row.resume_filename,
            resume_text: row.resume_text,
            resume_embedding: row.resume_embedding,
            job_id: row.job_id,
            semantic_match_score: row.semantic_match_score,
            structural_score: row.structural_score,
            final_score: row.final_score,
            matched_skills: row.matched_skills,
            missing_skills: row.missing_skills,
            findings: row.findings.map(|Json(f)| f),
            status: row
                .status
                .parse()
                .with_context(|| format!("candidate {} has a corrupt status", row.id))?,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    title: String,
    description_text: String,
    embedding: Option<Vec<f32>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<JobRow> for JobDescription {
    fn from(row: JobRow) -> Self {
        JobDescription {
            id: row.id,
            title: row.title,
            description_text: row.description_text,
            embedding: row.embedding,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_candidate(&self, input: NewCandidate) -> Result<Candidate> {
        let row = sqlx::query_as::<_, CandidateRow>(
            r#"
            INSERT INTO candidates
                (id, name, email, phone, linkedin_url, resume_filename, resume_text, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(&input.linkedin_url)
        .bind(&input.resume_filename)
        .bind(&input.resume_text)
        .bind(ProcessingStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Candidate::try_from)
            .transpose()
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>> {
        sqlx::query_as::<_, CandidateRow>("SELECT * FROM candidates ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Candidate::try_from)
            .collect()
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM candidates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn begin_analysis(&self, id: Uuid, job_id: Option<Uuid>) -> Result<BeginOutcome> {
        // Single statement: the status check and the transition cannot interleave
        // with a concurrent trigger.
        let started: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE candidates
            SET status = 'analyzing',
                job_id = $2,
                semantic_match_score = NULL,
                structural_score = NULL,
                final_score = NULL,
                matched_skills = '{}',
                missing_skills = '{}',
                findings = NULL,
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status <> 'analyzing'
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        if started.is_some() {
            return Ok(BeginOutcome::Started);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM candidates WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(if exists {
            BeginOutcome::AlreadyAnalyzing
        } else {
            BeginOutcome::NotFound
        })
    }

    async fn finish_analysis(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        last_error: Option<&str>,
    ) -> Result<bool> {
        if !status.is_terminal() {
            anyhow::bail!("{status} is not a terminal analysis status");
        }
        let result = sqlx::query(
            r#"
            UPDATE candidates
            SET status = $2, last_error = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'analyzing'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(last_error)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn recover_interrupted(&self, last_error: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE candidates
            SET status = 'error', last_error = $1, updated_at = NOW()
            WHERE status = 'analyzing'
            "#,
        )
        .bind(last_error)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn save_resume_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        sqlx::query("UPDATE candidates SET resume_embedding = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(embedding)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_semantic_score(&self, id: Uuid, score: f64) -> Result<()> {
        sqlx::query(
            "UPDATE candidates SET semantic_match_score = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_analysis(&self, id: Uuid, record: &AnalysisRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE candidates
            SET structural_score = $2,
                final_score = $3,
                matched_skills = $4,
                missing_skills = $5,
                findings = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(record.structural_score)
        .bind(record.final_score)
        .bind(&record.matched_skills)
        .bind(&record.missing_skills)
        .bind(Json(&record.findings))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_job(&self, input: NewJobDescription) -> Result<JobDescription> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO job_descriptions (id, title, description_text)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.title)
        .bind(&input.description_text)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobDescription>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM job_descriptions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(JobDescription::from))
    }

    async fn list_jobs(&self) -> Result<Vec<JobDescription>> {
        let rows =
            sqlx::query_as::<_, JobRow>("SELECT * FROM job_descriptions ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(JobDescription::from).collect())
    }

    async fn update_job(
        &self,
        id: Uuid,
        title: Option<String>,
        description_text: Option<String>,
    ) -> Result<Option<JobDescription>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE job_descriptions
            SET title = COALESCE($2, title),
                description_text = COALESCE($3, description_text),
                embedding = CASE WHEN $3::TEXT IS NULL THEN embedding ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(description_text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(JobDescription::from))
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM job_descriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_job_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        sqlx::query(
            "UPDATE job_descriptions SET embedding = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(embedding)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
