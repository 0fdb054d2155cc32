//! Candidate intake: resume upload and extraction, plus read/delete paths.

pub mod contact;
pub mod extract;
pub mod handlers;
