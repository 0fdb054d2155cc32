//! Persistence for candidates and job descriptions.
//!
//! [`Store`] is the only state shared between the HTTP handlers and the
//! analysis worker. Backends: [`postgres::PgStore`] in production and
//! [`memory::InMemoryStore`] for tests.

#[cfg(test)]
pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    AnalysisRecord, Candidate, JobDescription, NewCandidate, NewJobDescription, ProcessingStatus,
};

/// `last_error` for runs that were in flight when the process stopped.
pub const INTERRUPTED_MESSAGE: &str = "interrupted by restart";

/// Result of the compare-and-set that starts an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Status is now `Analyzing` and previous results were cleared.
    Started,
    /// A run is already active; nothing changed.
    AlreadyAnalyzing,
    NotFound,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_candidate(&self, input: NewCandidate) -> Result<Candidate>;
    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>>;
    /// Newest first.
    async fn list_candidates(&self) -> Result<Vec<Candidate>>;
    async fn delete_candidate(&self, id: Uuid) -> Result<bool>;

    /// Atomically moves a non-`Analyzing` candidate to `Analyzing`, records the
    /// job reference and clears the previous run's results.
    async fn begin_analysis(&self, id: Uuid, job_id: Option<Uuid>) -> Result<BeginOutcome>;

    /// Moves an `Analyzing` candidate to a terminal status. Returns false (and
    /// changes nothing) if the candidate is missing or no longer `Analyzing`.
    async fn finish_analysis(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        last_error: Option<&str>,
    ) -> Result<bool>;

    /// Moves every `Analyzing` candidate to `Error` with `last_error`. Runs
    /// live only in process memory, so at startup none of them has a task
    /// behind it. Returns how many candidates were recovered.
    async fn recover_interrupted(&self, last_error: &str) -> Result<u64>;

    async fn save_resume_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()>;
    async fn save_semantic_score(&self, id: Uuid, score: f64) -> Result<()>;
    async fn save_analysis(&self, id: Uuid, record: &AnalysisRecord) -> Result<()>;

    async fn insert_job(&self, input: NewJobDescription) -> Result<JobDescription>;
    async fn get_job(&self, id: Uuid) -> Result<Option<JobDescription>>;
    /// Newest first.
    async fn list_jobs(&self) -> Result<Vec<JobDescription>>;
    /// Updates title and/or text. A text change drops the stored embedding.
    async fn update_job(
        &self,
        id: Uuid,
        title: Option<String>,
        description_text: Option<String>,
    ) -> Result<Option<JobDescription>>;
    async fn delete_job(&self, id: Uuid) -> Result<bool>;
    async fn set_job_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()>;
}
