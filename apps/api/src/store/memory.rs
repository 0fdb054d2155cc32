//! In-memory [`Store`] used by tests.
//!
//! Every operation takes a single write lock, so the compare-and-set in
//! `begin_analysis` is atomic the same way the SQL `UPDATE ... WHERE` is.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{BeginOutcome, Store};
use crate::models::{
    AnalysisRecord, Candidate, JobDescription, NewCandidate, NewJobDescription, ProcessingStatus,
};

#[derive(Default)]
pub struct InMemoryStore {
    candidates: RwLock<HashMap<Uuid, Candidate>>,
    jobs: RwLock<HashMap<Uuid, JobDescription>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

async fn with_candidate<F>(store: &InMemoryStore, id: Uuid, f: F) -> Result<()>
where
    F: FnOnce(&mut Candidate) + Send,
{
    let mut candidates = store.candidates.write().await;
    if let Some(candidate) = candidates.get_mut(&id) {
        f(candidate);
        candidate.updated_at = Utc::now();
    }
    Ok(())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_candidate(&self, input: NewCandidate) -> Result<Candidate> {
        let candidate = Candidate::new(input);
        self.candidates
            .write()
            .await
            .insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        Ok(self.candidates.read().await.get(&id).cloned())
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>> {
        let mut all: Vec<Candidate> = self.candidates.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool> {
        Ok(self.candidates.write().await.remove(&id).is_some())
    }

    async fn begin_analysis(&self, id: Uuid, job_id: Option<Uuid>) -> Result<BeginOutcome> {
        let mut candidates = self.candidates.write().await;
        let Some(candidate) = candidates.get_mut(&id) else {
            return Ok(BeginOutcome::NotFound);
        };
        if !candidate.status.can_transition_to(ProcessingStatus::Analyzing) {
            return Ok(BeginOutcome::AlreadyAnalyzing);
        }
        candidate.clear_analysis();
        candidate.job_id = job_id;
        candidate.status = ProcessingStatus::Analyzing;
        candidate.updated_at = Utc::now();
        Ok(BeginOutcome::Started)
    }

    async fn finish_analysis(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        last_error: Option<&str>,
    ) -> Result<bool> {
        let mut candidates = self.candidates.write().await;
        match candidates.get_mut(&id) {
            Some(candidate)
                if candidate.status == ProcessingStatus::Analyzing
                    && candidate.status.can_transition_to(status) =>
            {
                candidate.status = status;
                candidate.last_error = last_error.map(str::to_string);
                candidate.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn recover_interrupted(&self, last_error: &str) -> Result<u64> {
        let mut recovered = 0;
        for candidate in self.candidates.write().await.values_mut() {
            if candidate.status == ProcessingStatus::Analyzing {
                candidate.status = ProcessingStatus::Error;
                candidate.last_error = Some(last_error.to_string());
                candidate.updated_at = Utc::now();
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn save_resume_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        with_candidate(self, id, |c| c.resume_embedding = Some(embedding.to_vec())).await
    }

    async fn save_semantic_score(&self, id: Uuid, score: f64) -> Result<()> {
        with_candidate(self, id, |c| c.semantic_match_score = Some(score)).await
    }

    async fn save_analysis(&self, id: Uuid, record: &AnalysisRecord) -> Result<()> {
        with_candidate(self, id, |c| c.apply_analysis(record)).await
    }

    async fn insert_job(&self, input: NewJobDescription) -> Result<JobDescription> {
        let job = JobDescription::new(input);
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobDescription>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<JobDescription>> {
        let mut all: Vec<JobDescription> = self.jobs.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn update_job(
        &self,
        id: Uuid,
        title: Option<String>,
        description_text: Option<String>,
    ) -> Result<Option<JobDescription>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = title {
            job.title = title;
        }
        if let Some(text) = description_text {
            job.description_text = text;
            job.embedding = None;
        }
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool> {
        let removed = self.jobs.write().await.remove(&id).is_some();
        if removed {
            // mirrors ON DELETE SET NULL
            for candidate in self.candidates.write().await.values_mut() {
                if candidate.job_id == Some(id) {
                    candidate.job_id = None;
                }
            }
        }
        Ok(removed)
    }

    async fn set_job_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            job.embedding = Some(embedding.to_vec());
            job.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Findings;

    async fn seeded() -> (InMemoryStore, Uuid) {
        let store = InMemoryStore::new();
        let candidate = store
            .insert_candidate(NewCandidate {
                resume_text: "Senior Rust engineer".to_string(),
                ..NewCandidate::default()
            })
            .await
            .unwrap();
        (store, candidate.id)
    }

    #[tokio::test]
    async fn test_begin_analysis_is_compare_and_set() {
        let (store, id) = seeded().await;
        assert_eq!(
            store.begin_analysis(id, None).await.unwrap(),
            BeginOutcome::Started
        );
        assert_eq!(
            store.begin_analysis(id, None).await.unwrap(),
            BeginOutcome::AlreadyAnalyzing
        );
        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert_eq!(c.status, ProcessingStatus::Analyzing);
    }

    #[tokio::test]
    async fn test_begin_analysis_unknown_candidate() {
        let store = InMemoryStore::new();
        assert_eq!(
            store.begin_analysis(Uuid::new_v4(), None).await.unwrap(),
            BeginOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_begin_analysis_clears_previous_results() {
        let (store, id) = seeded().await;
        store.begin_analysis(id, None).await.unwrap();
        store.save_semantic_score(id, 77.0).await.unwrap();
        store
            .save_analysis(
                id,
                &AnalysisRecord {
                    structural_score: 60.0,
                    final_score: 70.0,
                    matched_skills: vec!["Rust".to_string()],
                    missing_skills: vec![],
                    findings: Findings::default(),
                },
            )
            .await
            .unwrap();
        store
            .finish_analysis(id, ProcessingStatus::Completed, None)
            .await
            .unwrap();

        store.begin_analysis(id, None).await.unwrap();
        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert!(c.semantic_match_score.is_none());
        assert!(c.final_score.is_none());
        assert!(c.matched_skills.is_empty());
    }

    #[tokio::test]
    async fn test_finish_requires_analyzing() {
        let (store, id) = seeded().await;
        assert!(!store
            .finish_analysis(id, ProcessingStatus::Completed, None)
            .await
            .unwrap());
        store.begin_analysis(id, None).await.unwrap();
        assert!(store
            .finish_analysis(id, ProcessingStatus::Failed, Some("cancelled"))
            .await
            .unwrap());
        // a late completion after cancellation must not overwrite the terminal state
        assert!(!store
            .finish_analysis(id, ProcessingStatus::Completed, None)
            .await
            .unwrap());
        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert_eq!(c.status, ProcessingStatus::Failed);
        assert_eq!(c.last_error.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_recover_interrupted_releases_stuck_runs() {
        let (store, stuck) = seeded().await;
        let idle = store
            .insert_candidate(NewCandidate {
                resume_text: "Go developer".to_string(),
                ..NewCandidate::default()
            })
            .await
            .unwrap()
            .id;
        store.begin_analysis(stuck, None).await.unwrap();

        assert_eq!(
            store.recover_interrupted(crate::store::INTERRUPTED_MESSAGE).await.unwrap(),
            1
        );
        let c = store.get_candidate(stuck).await.unwrap().unwrap();
        assert_eq!(c.status, ProcessingStatus::Error);
        assert_eq!(c.last_error.as_deref(), Some("interrupted by restart"));
        let untouched = store.get_candidate(idle).await.unwrap().unwrap();
        assert_eq!(untouched.status, ProcessingStatus::Pending);

        // the candidate can be analyzed again
        assert_eq!(
            store.begin_analysis(stuck, None).await.unwrap(),
            BeginOutcome::Started
        );
        assert_eq!(store.recover_interrupted("again").await.unwrap(), 1);
        assert_eq!(store.recover_interrupted("again").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_job_text_drops_embedding() {
        let store = InMemoryStore::new();
        let job = store
            .insert_job(NewJobDescription {
                title: "SRE".to_string(),
                description_text: "Kubernetes".to_string(),
            })
            .await
            .unwrap();
        store.set_job_embedding(job.id, &[1.0, 0.0, 0.0]).await.unwrap();

        let renamed = store
            .update_job(job.id, Some("Senior SRE".to_string()), None)
            .await
            .unwrap()
            .unwrap();
        assert!(renamed.has_embedding());

        let rewritten = store
            .update_job(job.id, None, Some("Terraform".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert!(!rewritten.has_embedding());
        assert_eq!(rewritten.title, "Senior SRE");
    }

    #[tokio::test]
    async fn test_delete_job_unlinks_candidates() {
        let (store, id) = seeded().await;
        let job = store
            .insert_job(NewJobDescription {
                title: "SRE".to_string(),
                description_text: "Kubernetes".to_string(),
            })
            .await
            .unwrap();
        store.begin_analysis(id, Some(job.id)).await.unwrap();
        assert!(store.delete_job(job.id).await.unwrap());
        let c = store.get_candidate(id).await.unwrap().unwrap();
        assert!(c.job_id.is_none());
    }
}
