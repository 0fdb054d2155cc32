//! Test doubles shared across module tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::analysis::{AnalysisServices, StructuralAnalyzer};
use crate::embedding::{
    hashed_embedding, EmbeddingEngine, EmbeddingModel, EmbeddingSettings, ModelLoader,
};
use crate::llm_client::{LlmError, TextGenerator};
use crate::models::{
    AnalysisRecord, Candidate, JobDescription, NewCandidate, NewJobDescription, ProcessingStatus,
};
use crate::scoring::FusionWeights;
use crate::store::memory::InMemoryStore;
use crate::store::{BeginOutcome, Store};

pub const TEST_DIMS: usize = 64;

enum Behavior {
    Reply(String),
    Fail,
    Hang,
    Gated(String, Arc<Notify>),
}

/// `TextGenerator` with a fixed behavior that records every prompt.
pub struct ScriptedGenerator {
    behavior: Behavior,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self::with(Behavior::Reply(reply.to_string()))
    }

    pub fn failing() -> Self {
        Self::with(Behavior::Fail)
    }

    pub fn hanging() -> Self {
        Self::with(Behavior::Hang)
    }

    /// Replies only after the returned `Notify` is signalled.
    pub fn gated(reply: &str) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (
            Self::with(Behavior::Gated(reply.to_string(), gate.clone())),
            gate,
        )
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub async fn wait_for_call(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("generator was never called");
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match &self.behavior {
            Behavior::Reply(reply) => Ok(reply.clone()),
            Behavior::Fail => Err(LlmError::Api {
                status: 529,
                message: "overloaded".to_string(),
            }),
            Behavior::Hang => std::future::pending().await,
            Behavior::Gated(reply, gate) => {
                gate.notified().await;
                Ok(reply.clone())
            }
        }
    }
}

/// Deterministic stand-in for a sentence model.
pub struct HashModel {
    pub dims: usize,
}

impl EmbeddingModel for HashModel {
    fn model_name(&self) -> &str {
        "hash-test-model"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hashed_embedding(t, self.dims)).collect())
    }
}

/// Loads fine, fails every call.
pub struct FailingModel {
    pub dims: usize,
}

impl EmbeddingModel for FailingModel {
    fn model_name(&self) -> &str {
        "failing-test-model"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(anyhow!("inference session crashed"))
    }
}

pub fn hash_model_loader(dims: usize) -> ModelLoader {
    Arc::new(move || Ok(Arc::new(HashModel { dims }) as Arc<dyn EmbeddingModel>))
}

pub fn failing_model_loader() -> ModelLoader {
    Arc::new(|| Err(anyhow!("model files missing")))
}

/// In-memory store whose `save_analysis` always fails, as if the database went
/// away partway through a run.
#[derive(Default)]
pub struct SaveFailingStore {
    pub inner: InMemoryStore,
}

#[async_trait]
impl Store for SaveFailingStore {
    async fn insert_candidate(&self, input: NewCandidate) -> Result<Candidate> {
        self.inner.insert_candidate(input).await
    }

    async fn get_candidate(&self, id: Uuid) -> Result<Option<Candidate>> {
        self.inner.get_candidate(id).await
    }

    async fn list_candidates(&self) -> Result<Vec<Candidate>> {
        self.inner.list_candidates().await
    }

    async fn delete_candidate(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_candidate(id).await
    }

    async fn begin_analysis(&self, id: Uuid, job_id: Option<Uuid>) -> Result<BeginOutcome> {
        self.inner.begin_analysis(id, job_id).await
    }

    async fn finish_analysis(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        last_error: Option<&str>,
    ) -> Result<bool> {
        self.inner.finish_analysis(id, status, last_error).await
    }

    async fn recover_interrupted(&self, last_error: &str) -> Result<u64> {
        self.inner.recover_interrupted(last_error).await
    }

    async fn save_resume_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        self.inner.save_resume_embedding(id, embedding).await
    }

    async fn save_semantic_score(&self, id: Uuid, score: f64) -> Result<()> {
        self.inner.save_semantic_score(id, score).await
    }

    async fn save_analysis(&self, _id: Uuid, _record: &AnalysisRecord) -> Result<()> {
        Err(anyhow!("connection reset while saving analysis"))
    }

    async fn insert_job(&self, input: NewJobDescription) -> Result<JobDescription> {
        self.inner.insert_job(input).await
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<JobDescription>> {
        self.inner.get_job(id).await
    }

    async fn list_jobs(&self) -> Result<Vec<JobDescription>> {
        self.inner.list_jobs().await
    }

    async fn update_job(
        &self,
        id: Uuid,
        title: Option<String>,
        description_text: Option<String>,
    ) -> Result<Option<JobDescription>> {
        self.inner.update_job(id, title, description_text).await
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_job(id).await
    }

    async fn set_job_embedding(&self, id: Uuid, embedding: &[f32]) -> Result<()> {
        self.inner.set_job_embedding(id, embedding).await
    }
}

pub fn test_engine() -> EmbeddingEngine {
    let settings = EmbeddingSettings {
        model: "hash-test-model".to_string(),
        dims: TEST_DIMS,
        max_chunk_chars: 5000,
    };
    EmbeddingEngine::new(settings, hash_model_loader(TEST_DIMS))
}

pub fn analysis_services(
    store: Arc<dyn Store>,
    generator: Arc<dyn TextGenerator>,
) -> AnalysisServices {
    AnalysisServices {
        store,
        embeddings: Arc::new(test_engine()),
        analyzer: Arc::new(StructuralAnalyzer::new(generator, Duration::from_secs(5))),
        weights: FusionWeights::default(),
    }
}

/// Polls until the candidate leaves `Analyzing`.
pub async fn wait_for_terminal(store: &dyn Store, id: Uuid) -> Candidate {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(c) = store.get_candidate(id).await.unwrap() {
                if c.status.is_terminal() {
                    return c;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("analysis did not finish")
}

pub async fn wait_for_job_embedding(store: &dyn Store, id: Uuid) -> JobDescription {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = store.get_job(id).await.unwrap() {
                if job.has_embedding() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job description was never embedded")
}
