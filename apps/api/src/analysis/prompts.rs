// Prompt templates for the structural analysis.
// Replace `{job_text}` and `{resume_text}` before sending.

/// Used when the run has a job description to compare against.
pub const JOB_MATCH_PROMPT_TEMPLATE: &str = r#"Analyze the following resume against the job description.

Job Description:
{job_text}

Resume:
{resume_text}

Return a JSON object with this EXACT schema (no extra fields):
{
  "model_fit_score": <number 0-100, how well the candidate fits the job>,
  "strengths": [<3-5 key strengths relevant to the job>],
  "gaps": [<2-4 areas where the candidate may not fully meet requirements>],
  "recommended_questions": [<3-5 interview questions to ask>],
  "matched_skills": [<skills from the resume that match job requirements>],
  "missing_skills": [<skills in the job description not found in the resume>],
  "summary": "<2-3 sentence overall assessment>"
}"#;

/// Used when no job description is attached: rates resume quality alone.
pub const RESUME_QUALITY_PROMPT_TEMPLATE: &str = r#"Analyze the following resume and assess its overall quality.

Resume:
{resume_text}

Return a JSON object with this EXACT schema (no extra fields):
{
  "model_fit_score": <number 0-100, overall quality of the resume>,
  "strengths": [<3-5 key strengths>],
  "gaps": [<2-4 potential areas for improvement>],
  "recommended_questions": [<3-5 general interview questions>],
  "matched_skills": [<notable skills found in the resume>],
  "missing_skills": [],
  "summary": "<2-3 sentence overall assessment>"
}"#;
