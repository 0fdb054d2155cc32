//! Front half of the analysis pipeline: validation, the `Analyzing`
//! transition, queueing, and cancellation.
//!
//! `trigger` runs on the request path and only does cheap work. The
//! transition to `Analyzing` is a compare-and-set in the store, so concurrent
//! triggers for one candidate cannot both be accepted. The run itself happens
//! on the worker (see [`super::worker`]).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::AbortHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::ProcessingStatus;
use crate::store::{BeginOutcome, Store};

pub const CANCELLED_MESSAGE: &str = "analysis cancelled";

/// What the candidate is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRef {
    /// Resume quality only; no semantic score.
    None,
    /// A stored job description.
    Id(Uuid),
    /// Ad-hoc job text, embedded for this run and not persisted.
    Text(String),
}

impl JobRef {
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            JobRef::Id(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Candidate moved to `Analyzing` and the run is queued.
    Accepted,
    /// A run is already active. Nothing changed.
    Rejected,
}

#[derive(Debug)]
pub(crate) enum WorkItem {
    Analyze {
        candidate_id: Uuid,
        run_id: u64,
        job: JobRef,
    },
    EmbedJob {
        job_id: Uuid,
    },
}

/// Runs issued per candidate. A queued run only executes while it is the
/// latest one issued for its candidate; at most one executes at a time.
#[derive(Default)]
pub(crate) struct RunRegistry {
    next_run_id: u64,
    latest: HashMap<Uuid, u64>,
    in_flight: HashMap<Uuid, (u64, AbortHandle)>,
}

pub(crate) type SharedRegistry = Arc<Mutex<RunRegistry>>;

pub(crate) fn lock(registry: &SharedRegistry) -> MutexGuard<'_, RunRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunRegistry {
    fn issue(&mut self, candidate_id: Uuid) -> u64 {
        self.next_run_id += 1;
        self.latest.insert(candidate_id, self.next_run_id);
        self.next_run_id
    }

    pub(crate) fn is_current(&self, candidate_id: Uuid, run_id: u64) -> bool {
        self.latest.get(&candidate_id) == Some(&run_id)
    }

    pub(crate) fn is_in_flight(&self, candidate_id: Uuid) -> bool {
        self.in_flight.contains_key(&candidate_id)
    }

    pub(crate) fn register(&mut self, candidate_id: Uuid, run_id: u64, handle: AbortHandle) {
        self.in_flight.insert(candidate_id, (run_id, handle));
    }

    /// Forgets `run_id`. Leaves newer runs for the candidate alone.
    pub(crate) fn finish(&mut self, candidate_id: Uuid, run_id: u64) {
        if self.in_flight.get(&candidate_id).map(|(id, _)| *id) == Some(run_id) {
            self.in_flight.remove(&candidate_id);
        }
        if self.latest.get(&candidate_id) == Some(&run_id) {
            self.latest.remove(&candidate_id);
        }
    }

    /// Forgets every run for the candidate, returning the executing one.
    fn take(&mut self, candidate_id: Uuid) -> Option<AbortHandle> {
        self.latest.remove(&candidate_id);
        self.in_flight
            .remove(&candidate_id)
            .map(|(_, handle)| handle)
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn Store>,
    sender: mpsc::Sender<WorkItem>,
    registry: SharedRegistry,
}

impl Orchestrator {
    pub(crate) fn new(
        store: Arc<dyn Store>,
        sender: mpsc::Sender<WorkItem>,
        registry: SharedRegistry,
    ) -> Self {
        Self {
            store,
            sender,
            registry,
        }
    }

    /// Starts an analysis run for `candidate_id`.
    ///
    /// Unknown candidates or job descriptions and blank job text are errors
    /// and change nothing. A candidate that is already `Analyzing` yields
    /// [`TriggerOutcome::Rejected`].
    pub async fn trigger(&self, candidate_id: Uuid, job: JobRef) -> Result<TriggerOutcome, AppError> {
        if self.store.get_candidate(candidate_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Candidate {candidate_id} not found")));
        }

        match &job {
            JobRef::None => {}
            JobRef::Id(job_id) => {
                if self.store.get_job(*job_id).await?.is_none() {
                    return Err(AppError::NotFound(format!(
                        "Job description {job_id} not found"
                    )));
                }
            }
            JobRef::Text(text) => {
                if text.trim().is_empty() {
                    return Err(AppError::Validation("job_text must not be blank".to_string()));
                }
            }
        }

        match self.store.begin_analysis(candidate_id, job.job_id()).await? {
            BeginOutcome::Started => {}
            BeginOutcome::AlreadyAnalyzing => {
                info!(%candidate_id, "Analysis already in progress, trigger rejected");
                return Ok(TriggerOutcome::Rejected);
            }
            BeginOutcome::NotFound => {
                return Err(AppError::NotFound(format!("Candidate {candidate_id} not found")));
            }
        }

        let run_id = lock(&self.registry).issue(candidate_id);
        let item = WorkItem::Analyze {
            candidate_id,
            run_id,
            job,
        };

        if let Err(e) = self.sender.try_send(item) {
            lock(&self.registry).finish(candidate_id, run_id);
            let reason = match e {
                TrySendError::Full(_) => "analysis queue is full",
                TrySendError::Closed(_) => "analysis worker is not running",
            };
            self.store
                .finish_analysis(candidate_id, ProcessingStatus::Error, Some(reason))
                .await?;
            return Err(AppError::ServiceUnavailable(reason.to_string()));
        }

        info!(%candidate_id, run_id, "Analysis queued");
        Ok(TriggerOutcome::Accepted)
    }

    /// Cancels the candidate's run, queued or executing, and marks it
    /// `Failed`. Returns whether there was a run to cancel.
    pub async fn cancel(&self, candidate_id: Uuid) -> Result<bool, AppError> {
        let aborted = match lock(&self.registry).take(candidate_id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        };

        let marked = self
            .store
            .finish_analysis(candidate_id, ProcessingStatus::Failed, Some(CANCELLED_MESSAGE))
            .await?;

        if aborted || marked {
            info!(%candidate_id, aborted, "Analysis cancelled");
        }
        Ok(aborted || marked)
    }

    /// Queues a background embedding of a job description. A full queue is
    /// logged and skipped; the next run that needs the embedding computes it.
    pub fn schedule_job_embedding(&self, job_id: Uuid) {
        if let Err(e) = self.sender.try_send(WorkItem::EmbedJob { job_id }) {
            warn!(%job_id, "Could not queue job description embedding: {e}");
        }
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.registry).in_flight_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCandidate, NewJobDescription};
    use crate::store::memory::InMemoryStore;

    fn orchestrator(capacity: usize) -> (Orchestrator, mpsc::Receiver<WorkItem>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let (tx, rx) = mpsc::channel(capacity);
        let orch = Orchestrator::new(store.clone(), tx, SharedRegistry::default());
        (orch, rx, store)
    }

    async fn candidate(store: &InMemoryStore) -> Uuid {
        store
            .insert_candidate(NewCandidate {
                resume_text: "Rust engineer".to_string(),
                ..NewCandidate::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_trigger_queues_and_marks_analyzing() {
        let (orch, mut rx, store) = orchestrator(4);
        let id = candidate(&store).await;

        assert_eq!(orch.trigger(id, JobRef::None).await.unwrap(), TriggerOutcome::Accepted);

        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert_eq!(c.status, ProcessingStatus::Analyzing);
        match rx.try_recv().unwrap() {
            WorkItem::Analyze { candidate_id, job, .. } => {
                assert_eq!(candidate_id, id);
                assert_eq!(job, JobRef::None);
            }
            other => panic!("unexpected work item: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_second_trigger_is_rejected_without_queueing() {
        let (orch, mut rx, store) = orchestrator(4);
        let id = candidate(&store).await;

        orch.trigger(id, JobRef::None).await.unwrap();
        let second = orch
            .trigger(id, JobRef::Text("Go developer".to_string()))
            .await
            .unwrap();

        assert_eq!(second, TriggerOutcome::Rejected);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert_eq!(c.status, ProcessingStatus::Analyzing);
        assert_eq!(c.job_id, None);
    }

    #[tokio::test]
    async fn test_unknown_candidate_is_not_found() {
        let (orch, _rx, _store) = orchestrator(4);
        let err = orch.trigger(Uuid::new_v4(), JobRef::None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_job_leaves_status_unchanged() {
        let (orch, mut rx, store) = orchestrator(4);
        let id = candidate(&store).await;

        let err = orch.trigger(id, JobRef::Id(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(rx.try_recv().is_err());
        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert_eq!(c.status, ProcessingStatus::Pending);
    }

    #[tokio::test]
    async fn test_blank_job_text_is_validation_error() {
        let (orch, _rx, store) = orchestrator(4);
        let id = candidate(&store).await;
        let err = orch.trigger(id, JobRef::Text("  \n".to_string())).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert_eq!(c.status, ProcessingStatus::Pending);
    }

    #[tokio::test]
    async fn test_trigger_with_job_records_job_id() {
        let (orch, _rx, store) = orchestrator(4);
        let id = candidate(&store).await;
        let job = store
            .insert_job(NewJobDescription {
                title: "Backend".to_string(),
                description_text: "Rust services".to_string(),
            })
            .await
            .unwrap();

        orch.trigger(id, JobRef::Id(job.id)).await.unwrap();
        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert_eq!(c.job_id, Some(job.id));
    }

    #[tokio::test]
    async fn test_full_queue_marks_error() {
        let (orch, _rx, store) = orchestrator(1);
        let first = candidate(&store).await;
        let second = candidate(&store).await;

        orch.trigger(first, JobRef::None).await.unwrap();
        let err = orch.trigger(second, JobRef::None).await.unwrap_err();

        assert!(matches!(err, AppError::ServiceUnavailable(_)));
        let c = store.get_candidate(second).await.unwrap().unwrap();
        assert_eq!(c.status, ProcessingStatus::Error);
        assert!(c.last_error.is_some());
    }

    #[tokio::test]
    async fn test_cancel_queued_run_marks_failed_and_makes_it_stale() {
        let (orch, mut rx, store) = orchestrator(4);
        let id = candidate(&store).await;
        orch.trigger(id, JobRef::None).await.unwrap();

        assert!(orch.cancel(id).await.unwrap());

        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert_eq!(c.status, ProcessingStatus::Failed);
        assert_eq!(c.last_error.as_deref(), Some(CANCELLED_MESSAGE));
        match rx.try_recv().unwrap() {
            WorkItem::Analyze {
                candidate_id,
                run_id,
                ..
            } => assert!(!lock(&orch.registry).is_current(candidate_id, run_id)),
            other => panic!("unexpected work item: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_without_run_returns_false() {
        let (orch, _rx, store) = orchestrator(4);
        let id = candidate(&store).await;
        assert!(!orch.cancel(id).await.unwrap());
        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert_eq!(c.status, ProcessingStatus::Pending);
    }

    #[tokio::test]
    async fn test_retrigger_after_cancel_supersedes_old_run() {
        let (orch, mut rx, store) = orchestrator(4);
        let id = candidate(&store).await;
        orch.trigger(id, JobRef::None).await.unwrap();
        orch.cancel(id).await.unwrap();
        assert_eq!(orch.trigger(id, JobRef::None).await.unwrap(), TriggerOutcome::Accepted);

        let mut current = Vec::new();
        while let Ok(WorkItem::Analyze { candidate_id, run_id, .. }) = rx.try_recv() {
            current.push(lock(&orch.registry).is_current(candidate_id, run_id));
        }
        assert_eq!(current, vec![false, true]);
    }

    #[test]
    fn test_registry_finish_ignores_newer_run() {
        let mut registry = RunRegistry::default();
        let id = Uuid::new_v4();
        let old = registry.issue(id);
        let new = registry.issue(id);
        registry.finish(id, old);
        assert!(registry.is_current(id, new));
    }
}
