pub mod candidate;
pub mod job;
pub mod status;

pub use candidate::{AnalysisRecord, Candidate, Findings, NewCandidate};
pub use job::{JobDescription, NewJobDescription};
pub use status::ProcessingStatus;
