//! Structural assessment of a resume by the generative model.
//!
//! The model's reply is parsed leniently: missing fields take defaults and the
//! score may arrive as a number or a numeric string. Any failure (transport,
//! API, timeout, unparseable reply) yields a fixed degraded record instead of
//! an error, so a run always has an assessment to fuse.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::analysis::prompts::{JOB_MATCH_PROMPT_TEMPLATE, RESUME_QUALITY_PROMPT_TEMPLATE};
use crate::analysis::skills::skill_gap;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{extract_json_object, LlmError, TextGenerator};

pub const RESUME_PROMPT_CHARS: usize = 4000;
pub const JOB_PROMPT_CHARS: usize = 2000;
pub const DEFAULT_SCORE: f64 = 50.0;
/// Every degraded summary starts with this.
pub const DEGRADED_PREFIX: &str = "Degraded analysis:";

#[derive(Debug, Clone, PartialEq)]
pub struct StructuralAssessment {
    pub model_fit_score: f64,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub recommended_questions: Vec<String>,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub summary: String,
    pub degraded: bool,
}

/// The model's reply as it arrives. Every field is optional, and an explicit
/// `null` counts as absent.
#[derive(Debug, Default, Deserialize)]
struct RawAssessment {
    #[serde(default)]
    model_fit_score: Option<Value>,
    #[serde(default)]
    strengths: Option<Vec<String>>,
    #[serde(default)]
    gaps: Option<Vec<String>>,
    #[serde(default)]
    recommended_questions: Option<Vec<String>>,
    #[serde(default)]
    matched_skills: Option<Vec<String>>,
    #[serde(default)]
    missing_skills: Option<Vec<String>>,
    #[serde(default)]
    summary: Option<String>,
}

pub struct StructuralAnalyzer {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl StructuralAnalyzer {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Assesses `resume_text`, against `job_text` when given. Never fails.
    pub async fn analyze(&self, resume_text: &str, job_text: Option<&str>) -> StructuralAssessment {
        let prompt = build_prompt(resume_text, job_text);

        let reply = match tokio::time::timeout(
            self.timeout,
            self.generator.generate(&prompt, JSON_ONLY_SYSTEM),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout)),
        };

        match reply.and_then(|text| parse_assessment(&text)) {
            Ok(assessment) => {
                debug!(score = assessment.model_fit_score, "Structural analysis parsed");
                assessment
            }
            Err(e) => {
                warn!("Structural analysis unavailable, using degraded record: {e}");
                degraded_assessment(&e.to_string(), resume_text, job_text)
            }
        }
    }
}

fn build_prompt(resume_text: &str, job_text: Option<&str>) -> String {
    let resume = truncate_chars(resume_text, RESUME_PROMPT_CHARS);
    match job_text {
        Some(job) => fill_template(
            JOB_MATCH_PROMPT_TEMPLATE,
            &[
                ("{job_text}", truncate_chars(job, JOB_PROMPT_CHARS)),
                ("{resume_text}", resume),
            ],
        ),
        None => fill_template(RESUME_QUALITY_PROMPT_TEMPLATE, &[("{resume_text}", resume)]),
    }
}

/// Substitutes placeholders in a single left-to-right pass. Inserted values are
/// never scanned again, so user text containing a placeholder stays literal.
fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let extra: usize = vars.iter().map(|(_, value)| value.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    loop {
        let current = rest;
        let next = vars
            .iter()
            .filter_map(|(key, value)| current.find(*key).map(|pos| (pos, *key, *value)))
            .min_by_key(|(pos, _, _)| *pos);
        let Some((pos, key, value)) = next else {
            break;
        };
        out.push_str(&rest[..pos]);
        out.push_str(value);
        rest = &rest[pos + key.len()..];
    }
    out.push_str(rest);
    out
}

fn parse_assessment(reply: &str) -> Result<StructuralAssessment, LlmError> {
    let json = extract_json_object(reply)?;
    let raw: RawAssessment = serde_json::from_str(json)?;

    Ok(StructuralAssessment {
        model_fit_score: parse_score(raw.model_fit_score.as_ref()),
        strengths: raw.strengths.unwrap_or_default(),
        gaps: raw.gaps.unwrap_or_default(),
        recommended_questions: raw.recommended_questions.unwrap_or_default(),
        matched_skills: raw.matched_skills.unwrap_or_default(),
        missing_skills: raw.missing_skills.unwrap_or_default(),
        summary: raw.summary.unwrap_or_default(),
        degraded: false,
    })
}

/// Number or numeric string, clamped to [0, 100]. Anything else is the default.
fn parse_score(value: Option<&Value>) -> f64 {
    let score = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match score {
        Some(s) if s.is_finite() => s.clamp(0.0, 100.0),
        _ => DEFAULT_SCORE,
    }
}

/// Placeholder record used when the model cannot be consulted. Skills come
/// from keyword matching so the run still reports them.
pub fn degraded_assessment(
    reason: &str,
    resume_text: &str,
    job_text: Option<&str>,
) -> StructuralAssessment {
    let (matched_skills, missing_skills) = skill_gap(resume_text, job_text);
    StructuralAssessment {
        model_fit_score: DEFAULT_SCORE,
        strengths: vec!["Unable to fully analyze due to error".to_string()],
        gaps: vec!["Analysis error occurred".to_string()],
        recommended_questions: vec!["Please review manually".to_string()],
        matched_skills,
        missing_skills,
        summary: format!("{DEGRADED_PREFIX} {reason}"),
        degraded: true,
    }
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
