use std::path::{Path, MAIN_SEPARATOR};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::{filter_label, PathKey};

/// A file or directory chosen for inclusion in the context file.
///
/// There is at most one selection per project and normalized path; paths that
/// differ only in case or separator style name the same selection. A directory
/// selection without `file_types` includes every file below it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Original-case absolute path, as most recently recorded.
    pub path: String,
    pub is_directory: bool,
    pub category_id: Option<Uuid>,
    /// Comma-separated `.ext` suffixes or exact file names (directories only).
    pub file_types: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Selection {
    /// Identity of this selection's path.
    pub fn key(&self) -> PathKey {
        PathKey::new(&self.path)
    }
}

/// One line of a selection listing, e.g. `src/ (Dir: .rs)  [Backend]`.
///
/// Paths inside `root` are shown relative to it (`.` for the root itself);
/// anything outside is shown by its bare name.
pub fn describe_selection(root: &Path, selection: &Selection, category_name: Option<&str>) -> String {
    let key = selection.key();
    let mut line = match key.relative_to(&PathKey::new(root)) {
        Some(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Some(rel) => rel.to_string_lossy().into_owned(),
        None => key.file_name().unwrap_or_else(|| key.display()),
    };

    if selection.is_directory {
        line.push_str(&format!(
            "{MAIN_SEPARATOR} (Dir: {})",
            filter_label(selection.file_types.as_deref())
        ));
    }
    line.push_str(&format!("  [{}]", category_name.unwrap_or("Uncategorized")));
    line
}

/// Input for adding or updating a selection.
///
/// Upserting an existing path replaces its directory flag and file types,
/// replaces its category when one is given, and refreshes the stored display
/// path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertSelectionInput {
    pub path: String,
    pub is_directory: bool,
    pub category_id: Option<Uuid>,
    pub file_types: Option<String>,
}

impl UpsertSelectionInput {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            category_id: None,
            file_types: None,
        }
    }

    pub fn directory(path: impl Into<String>, file_types: Option<&str>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            category_id: None,
            file_types: file_types.map(str::to_string),
        }
    }

    /// Input for whatever is on disk at `path`.
    ///
    /// Only directories and regular files (or symlinks to them) can be selected.
    /// `file_types` is dropped for files.
    pub fn for_path(path: &Path, file_types: Option<&str>) -> Result<Self> {
        let display = path.to_string_lossy();
        if path.is_dir() {
            Ok(Self::directory(display, file_types))
        } else if path.is_file() {
            if file_types.is_some() {
                tracing::warn!("Ignoring file types for file selection {}", path.display());
            }
            Ok(Self::file(display))
        } else if path.symlink_metadata().is_ok() {
            bail!("Not a regular file or directory: {}", path.display())
        } else {
            bail!("Path does not exist: {}", path.display())
        }
    }

    pub fn in_category(mut self, category_id: Option<Uuid>) -> Self {
        self.category_id = category_id;
        self
    }
}
