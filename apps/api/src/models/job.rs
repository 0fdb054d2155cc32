use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A job description. The embedding is filled in asynchronously after creation
/// and recomputed after each text update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub id: Uuid,
    pub title: String,
    pub description_text: String,
    #[serde(skip_serializing, default)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJobDescription {
    pub title: String,
    pub description_text: String,
}

impl JobDescription {
    pub fn new(input: NewJobDescription) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description_text: input.description_text,
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }

    /// First 200 characters of the description, with an ellipsis when cut.
    pub fn preview(&self) -> String {
        const PREVIEW_CHARS: usize = 200;
        let mut chars = self.description_text.chars();
        let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
        if chars.next().is_some() {
            format!("{head}...")
        } else {
            head
        }
    }
}
