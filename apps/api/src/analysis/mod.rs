//! Candidate analysis: structural assessment, skill matching, and the
//! orchestrated pipeline that combines them with semantic similarity.

pub mod handlers;
pub mod orchestrator;
pub mod prompts;
pub mod skills;
pub mod structural;
pub mod worker;

pub use orchestrator::{JobRef, Orchestrator, TriggerOutcome};
pub use structural::StructuralAnalyzer;
pub use worker::{AnalysisServices, WorkerOptions};
