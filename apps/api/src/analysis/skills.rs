//! Keyword skill matching over a fixed vocabulary.
//!
//! Used to fill matched/missing skills when the generative model is
//! unavailable. Matching is case-insensitive and requires the term not to be
//! glued to surrounding letters or digits, so "go" does not match "google".

/// (lowercase term, display name)
const SKILL_VOCABULARY: &[(&str, &str)] = &[
    ("python", "Python"),
    ("java", "Java"),
    ("javascript", "JavaScript"),
    ("typescript", "TypeScript"),
    ("c++", "C++"),
    ("c#", "C#"),
    ("ruby", "Ruby"),
    ("go", "Go"),
    ("rust", "Rust"),
    ("react", "React"),
    ("angular", "Angular"),
    ("vue", "Vue"),
    ("node.js", "Node.js"),
    ("django", "Django"),
    ("flask", "Flask"),
    ("fastapi", "FastAPI"),
    ("spring", "Spring"),
    ("docker", "Docker"),
    ("kubernetes", "Kubernetes"),
    ("aws", "AWS"),
    ("azure", "Azure"),
    ("gcp", "GCP"),
    ("jenkins", "Jenkins"),
    ("git", "Git"),
    ("ci/cd", "CI/CD"),
    ("sql", "SQL"),
    ("postgresql", "PostgreSQL"),
    ("mysql", "MySQL"),
    ("mongodb", "MongoDB"),
    ("redis", "Redis"),
    ("elasticsearch", "Elasticsearch"),
    ("machine learning", "Machine Learning"),
    ("deep learning", "Deep Learning"),
    ("ai", "AI"),
    ("data science", "Data Science"),
    ("tensorflow", "TensorFlow"),
    ("pytorch", "PyTorch"),
    ("leadership", "Leadership"),
    ("communication", "Communication"),
    ("project management", "Project Management"),
    ("agile", "Agile"),
    ("scrum", "Scrum"),
    ("rest api", "REST API"),
    ("graphql", "GraphQL"),
    ("microservices", "Microservices"),
    ("cloud computing", "Cloud Computing"),
    ("devops", "DevOps"),
];

/// Vocabulary skills mentioned in `text`, in vocabulary order.
pub fn extract_skills(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    SKILL_VOCABULARY
        .iter()
        .filter(|(term, _)| contains_term(&lower, term))
        .map(|(_, display)| display.to_string())
        .collect()
}

/// `(matched, missing)`: skills the resume mentions, and skills the job
/// mentions that the resume does not. `missing` is empty without a job.
pub fn skill_gap(resume_text: &str, job_text: Option<&str>) -> (Vec<String>, Vec<String>) {
    let matched = extract_skills(resume_text);
    let missing = match job_text {
        Some(job) => extract_skills(job)
            .into_iter()
            .filter(|skill| !matched.contains(skill))
            .collect(),
        None => Vec::new(),
    };
    (matched, missing)
}

fn contains_term(haystack: &str, term: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(term) {
        let start = from + pos;
        let end = start + term.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        from = start + term.chars().next().map_or(1, char::len_utf8);
    }
    false
}
