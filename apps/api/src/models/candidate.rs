use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::status::ProcessingStatus;

/// A candidate and the latest analysis run's results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub resume_filename: Option<String>,
    pub resume_text: String,
    /// Dimension D, shared by every vector the engine produces.
    #[serde(skip_serializing, default)]
    pub resume_embedding: Option<Vec<f32>>,
    pub job_id: Option<Uuid>,
    pub semantic_match_score: Option<f64>,
    pub structural_score: Option<f64>,
    pub final_score: Option<f64>,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub findings: Option<Findings>,
    pub status: ProcessingStatus,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Qualitative output of the structural analysis. Stored as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub recommended_questions: Vec<String>,
    pub summary: String,
    /// True when the generative model was unavailable and placeholder findings were used.
    #[serde(default)]
    pub degraded: bool,
}

/// Fields captured when a candidate is created from an upload or JSON body.
#[derive(Debug, Clone, Default)]
pub struct NewCandidate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub resume_filename: Option<String>,
    pub resume_text: String,
}

/// Everything one analysis run writes at the end. Replaces the previous run's values.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub structural_score: f64,
    pub final_score: f64,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub findings: Findings,
}

impl Candidate {
    pub fn new(input: NewCandidate) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            linkedin_url: input.linkedin_url,
            resume_filename: input.resume_filename,
            resume_text: input.resume_text,
            resume_embedding: None,
            job_id: None,
            semantic_match_score: None,
            structural_score: None,
            final_score: None,
            matched_skills: Vec::new(),
            missing_skills: Vec::new(),
            findings: None,
            status: ProcessingStatus::Pending,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Drops every field a run produces, ahead of a fresh run.
    pub fn clear_analysis(&mut self) {
        self.semantic_match_score = None;
        self.structural_score = None;
        self.final_score = None;
        self.matched_skills.clear();
        self.missing_skills.clear();
        self.findings = None;
        self.last_error = None;
    }

    pub fn apply_analysis(&mut self, record: &AnalysisRecord) {
        self.structural_score = Some(record.structural_score);
        self.final_score = Some(record.final_score);
        self.matched_skills = record.matched_skills.clone();
        self.missing_skills = record.missing_skills.clone();
        self.findings = Some(record.findings.clone());
    }
}
