//! Back half of the analysis pipeline: the worker task that executes runs.
//!
//! The worker drains a bounded channel and spawns one task per work item.
//! A semaphore bounds how many run at once. Each run persists its progress as
//! it goes and ends by moving the candidate out of `Analyzing`.

use std::sync::Arc;

use anyhow::Context;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::orchestrator::{lock, JobRef, Orchestrator, SharedRegistry, WorkItem};
use crate::analysis::structural::StructuralAnalyzer;
use crate::embedding::EmbeddingEngine;
use crate::models::{AnalysisRecord, Findings, JobDescription, ProcessingStatus};
use crate::scoring::{fuse, similarity_percentage, FusionWeights};
use crate::store::Store;

/// Everything a run needs, constructed once at startup.
pub struct AnalysisServices {
    pub store: Arc<dyn Store>,
    pub embeddings: Arc<EmbeddingEngine>,
    pub analyzer: Arc<StructuralAnalyzer>,
    pub weights: FusionWeights,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub concurrency: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            queue_capacity: 64,
        }
    }
}

#[derive(Debug, Error)]
enum RunError {
    /// The run cannot proceed for a domain reason. Status becomes `Failed`.
    #[error("{0}")]
    Failed(String),
    /// Store or embedding task failure. Status becomes `Error`.
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

enum RunOutcome {
    Completed { final_score: f64, degraded: bool },
    /// Candidate deleted or no longer `Analyzing` when the run started.
    Skipped,
}

/// Creates the work channel, spawns the worker, and returns the handle used
/// by request handlers.
pub fn start(services: AnalysisServices, options: WorkerOptions) -> (Orchestrator, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(options.queue_capacity.max(1));
    let registry = SharedRegistry::default();
    let orchestrator = Orchestrator::new(services.store.clone(), sender, registry.clone());
    let handle = spawn_worker(receiver, Arc::new(services), registry, options.concurrency);
    (orchestrator, handle)
}

pub(crate) fn spawn_worker(
    mut receiver: mpsc::Receiver<WorkItem>,
    services: Arc<AnalysisServices>,
    registry: SharedRegistry,
    concurrency: usize,
) -> JoinHandle<()> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    tokio::spawn(async move {
        info!(concurrency, "Analysis worker started");
        while let Some(item) = receiver.recv().await {
            match item {
                WorkItem::Analyze {
                    candidate_id,
                    run_id,
                    job,
                } => dispatch_analysis(&services, &registry, &semaphore, candidate_id, run_id, job),
                WorkItem::EmbedJob { job_id } => {
                    tokio::spawn(embed_job_task(services.clone(), semaphore.clone(), job_id));
                }
            }
        }
        info!("Analysis worker stopped");
    })
}

fn dispatch_analysis(
    services: &Arc<AnalysisServices>,
    registry: &SharedRegistry,
    semaphore: &Arc<Semaphore>,
    candidate_id: Uuid,
    run_id: u64,
    job: JobRef,
) {
    let mut runs = lock(registry);
    if !runs.is_current(candidate_id, run_id) {
        debug!(%candidate_id, run_id, "Skipping superseded analysis run");
        return;
    }
    if runs.is_in_flight(candidate_id) {
        warn!(%candidate_id, run_id, "Analysis already running for candidate, dropping duplicate");
        return;
    }

    // Registered under the lock so the task cannot finish before it is known.
    let handle = tokio::spawn(analysis_task(
        services.clone(),
        registry.clone(),
        semaphore.clone(),
        candidate_id,
        run_id,
        job,
    ));
    runs.register(candidate_id, run_id, handle.abort_handle());
}

async fn analysis_task(
    services: Arc<AnalysisServices>,
    registry: SharedRegistry,
    semaphore: Arc<Semaphore>,
    candidate_id: Uuid,
    run_id: u64,
    job: JobRef,
) {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return;
    };

    let result = run_pipeline(&services, candidate_id, &job).await;
    lock(&registry).finish(candidate_id, run_id);
    settle(services.store.as_ref(), candidate_id, result).await;
}

async fn settle(store: &dyn Store, candidate_id: Uuid, result: Result<RunOutcome, RunError>) {
    let (status, last_error) = match result {
        Ok(RunOutcome::Skipped) => return,
        Ok(RunOutcome::Completed {
            final_score,
            degraded,
        }) => {
            info!(%candidate_id, final_score, degraded, "Analysis completed");
            (ProcessingStatus::Completed, None)
        }
        Err(RunError::Failed(reason)) => {
            warn!(%candidate_id, "Analysis failed: {reason}");
            (ProcessingStatus::Failed, Some(reason))
        }
        Err(RunError::Infrastructure(e)) => {
            error!(%candidate_id, "Analysis errored: {e:#}");
            (ProcessingStatus::Error, Some(format!("{e:#}")))
        }
    };

    match store
        .finish_analysis(candidate_id, status, last_error.as_deref())
        .await
    {
        Ok(true) => {}
        Ok(false) => info!(%candidate_id, %status, "Candidate left Analyzing during the run, result status not applied"),
        Err(e) => error!(%candidate_id, "Failed to record analysis status {status}: {e:#}"),
    }
}

async fn run_pipeline(
    services: &AnalysisServices,
    candidate_id: Uuid,
    job: &JobRef,
) -> Result<RunOutcome, RunError> {
    let store = services.store.as_ref();

    let candidate = match store.get_candidate(candidate_id).await? {
        Some(c) if c.status == ProcessingStatus::Analyzing => c,
        Some(c) => {
            debug!(%candidate_id, status = %c.status, "Candidate no longer analyzing, skipping run");
            return Ok(RunOutcome::Skipped);
        }
        None => {
            debug!(%candidate_id, "Candidate deleted before run started");
            return Ok(RunOutcome::Skipped);
        }
    };
    info!(%candidate_id, "Analysis started");

    let resume_embedding = services
        .embeddings
        .embed(&candidate.resume_text)
        .await
        .context("resume embedding failed")?;
    store
        .save_resume_embedding(candidate_id, &resume_embedding)
        .await?;

    let (job_text, job_embedding) = match job {
        JobRef::None => (None, None),
        JobRef::Id(job_id) => {
            let description = store.get_job(*job_id).await?.ok_or_else(|| {
                RunError::Failed(format!("job description {job_id} no longer exists"))
            })?;
            let embedding = job_embedding(services, &description).await?;
            (Some(description.description_text), Some(embedding))
        }
        JobRef::Text(text) => {
            let embedding = services
                .embeddings
                .embed(text)
                .await
                .context("job text embedding failed")?;
            (Some(text.clone()), Some(embedding))
        }
    };

    let semantic = match &job_embedding {
        Some(job_embedding) => {
            let score = similarity_percentage(&resume_embedding, job_embedding);
            store.save_semantic_score(candidate_id, score).await?;
            debug!(%candidate_id, semantic = score, "Semantic score recorded");
            Some(score)
        }
        None => None,
    };

    let assessment = services
        .analyzer
        .analyze(&candidate.resume_text, job_text.as_deref())
        .await;

    let final_score = fuse(assessment.model_fit_score, semantic, &services.weights);
    let degraded = assessment.degraded;
    let record = AnalysisRecord {
        structural_score: assessment.model_fit_score,
        final_score,
        matched_skills: assessment.matched_skills,
        missing_skills: assessment.missing_skills,
        findings: Findings {
            strengths: assessment.strengths,
            gaps: assessment.gaps,
            recommended_questions: assessment.recommended_questions,
            summary: assessment.summary,
            degraded,
        },
    };
    store.save_analysis(candidate_id, &record).await?;

    Ok(RunOutcome::Completed {
        final_score,
        degraded,
    })
}

/// Stored embedding when it has the engine's dimension, otherwise computed
/// now and persisted on the job description.
async fn job_embedding(
    services: &AnalysisServices,
    description: &JobDescription,
) -> anyhow::Result<Vec<f32>> {
    if let Some(existing) = &description.embedding {
        if existing.len() == services.embeddings.dims() {
            return Ok(existing.clone());
        }
    }

    let embedding = services
        .embeddings
        .embed(&description.description_text)
        .await
        .context("job description embedding failed")?;
    services
        .store
        .set_job_embedding(description.id, &embedding)
        .await?;
    Ok(embedding)
}

async fn embed_job_task(services: Arc<AnalysisServices>, semaphore: Arc<Semaphore>, job_id: Uuid) {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return;
    };
    if let Err(e) = embed_job(&services, job_id).await {
        warn!(%job_id, "Job description embedding failed: {e:#}");
    }
}

async fn embed_job(services: &AnalysisServices, job_id: Uuid) -> anyhow::Result<()> {
    let Some(description) = services.store.get_job(job_id).await? else {
        return Ok(());
    };
    let embedding = services
        .embeddings
        .embed(&description.description_text)
        .await?;

    // An update during embedding queues its own pass; don't store a stale vector.
    match services.store.get_job(job_id).await? {
        Some(current) if current.description_text == description.description_text => {
            services.store.set_job_embedding(job_id, &embedding).await?;
            debug!(%job_id, "Job description embedded");
        }
        _ => debug!(%job_id, "Job description changed or deleted while embedding"),
    }
    Ok(())
}
