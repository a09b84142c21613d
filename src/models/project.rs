use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prompt guide given to projects created without one.
pub const DEFAULT_PROMPT_GUIDE: &str = "[2-4 Sentence description of this project goes here]
I need your help with the following task progressing this project forwards. When providing code changes, please output the complete content of any modified files in their entirety. Do not provide only snippets or diffs; I need the full file content to easily replace my existing files.
My question is:";

/// A project whose files can be curated into a context file.
///
/// `root_path` keeps the original case of the directory as entered. The
/// directory may disappear after the project is created; every consumer has to
/// cope with that rather than fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    /// Absolute, original-case path to the project root.
    pub root_path: String,
    /// Free text copied out alongside the generated context file.
    pub prompt_guide: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectInput {
    pub name: String,
    pub root_path: String,
    /// Defaults to [`DEFAULT_PROMPT_GUIDE`] when `None`.
    pub prompt_guide: Option<String>,
}

/// Input for updating an existing project. All fields are optional for partial updates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectInput {
    pub name: Option<String>,
    pub root_path: Option<String>,
    pub prompt_guide: Option<String>,
}
