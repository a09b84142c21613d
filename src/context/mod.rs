//! Context file generation.
//!
//! One call is one synchronous pass: resolve the selections into files, render
//! the project tree from that same resolution, read and serialize the files,
//! and concatenate. Nothing is cached between passes, so two passes over an
//! unchanged selection list and filesystem produce identical text.
//!
//! Missing selections, unreadable directories and unreadable files are reported
//! inside the generated text. The only failures returned to callers concern
//! loading the selections and persisting the result.

mod aggregate;
mod filter;
mod path_key;
mod preview;
mod resolve;
mod tree_render;
mod walk;
mod writer;

pub use aggregate::{aggregate, read_content, FileContent, STRUCTURE_FOOTER, STRUCTURE_HEADER};
pub use filter::{filter_label, FileTypeFilter};
pub use path_key::PathKey;
pub use preview::preview;
pub use resolve::{display_path, resolve, Resolution, EXTERNAL_PREFIX};
pub use tree_render::render_tree;
pub use writer::{ArtifactError, ArtifactWriter, FsArtifactWriter};

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::models::Selection;
use resolve::{InclusionResolver, Targets};
use tree_render::TreeRenderer;
use walk::Concealed;

pub const DEFAULT_ARTIFACT_NAME: &str = "context.txt";

pub const DEFAULT_IGNORED_NAMES: &[&str] = &[
    "__pycache__",
    "node_modules",
    "target",
    "build",
    ".venv",
    "venv",
    ".git",
    "dist",
    ".DS_Store",
];

pub const DEFAULT_BINARY_EXTENSIONS: &[&str] = &[
    ".exe", ".dll", ".so", ".dylib", ".jar", ".class", ".pyc", ".o", ".a", ".lib", ".zip", ".gz",
    ".tar", ".rar", ".7z", ".pkg", ".dmg", ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff",
    ".ico", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".odt", ".ods", ".odp",
    ".mp3", ".wav", ".ogg", ".mp4", ".avi", ".mkv", ".mov", ".webm", ".db", ".sqlite",
    ".sqlite3", ".mdb", ".accdb", ".wasm", ".woff", ".woff2", ".ttf", ".otf", ".eot", ".DS_Store",
];

/// Directory levels below the root listed for subtrees without selections.
pub const DEFAULT_TREE_DEPTH: usize = 3;

pub const DEFAULT_PREVIEW_MAX_BYTES: u64 = 1024 * 1024;

/// Knobs for a generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// File name of the context file, written at the project root.
    pub artifact_name: String,
    /// Entry names skipped by walks unless selected.
    pub ignored_names: Vec<String>,
    /// Name suffixes treated as binary without reading.
    pub binary_extensions: Vec<String>,
    pub tree_depth: usize,
    pub preview_max_bytes: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            artifact_name: DEFAULT_ARTIFACT_NAME.to_string(),
            ignored_names: DEFAULT_IGNORED_NAMES.iter().map(|s| s.to_string()).collect(),
            binary_extensions: DEFAULT_BINARY_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            tree_depth: DEFAULT_TREE_DEPTH,
            preview_max_bytes: DEFAULT_PREVIEW_MAX_BYTES,
        }
    }
}

impl EngineOptions {
    /// Where the context file for `root` is written, and the one path no pass
    /// ever includes.
    pub fn artifact_path(&self, root: &Path) -> PathBuf {
        root.join(&self.artifact_name)
    }
}

/// The result of one generation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextArtifact {
    pub text: String,
    /// Display paths of selections that were not found.
    pub warnings: Vec<String>,
    pub included_files: usize,
}

/// Run one full pass over `selections`.
pub fn generate(root: &Path, selections: &[Selection], options: &EngineOptions) -> ContextArtifact {
    let targets = Targets::new(selections);
    let resolution = InclusionResolver::new(
        root,
        Concealed::new(&options.ignored_names),
        &options.artifact_path(root),
    )
    .resolve(&targets);

    let tree = TreeRenderer::new(root, options).render(&targets, &resolution);
    let text = aggregate(&tree, &resolution, &options.binary_extensions);

    ContextArtifact {
        text,
        warnings: resolution.warnings,
        included_files: resolution.included.len(),
    }
}

/// Read access to stored selections.
pub trait SelectionStore {
    /// Selections of a project, optionally only those in one category. The
    /// order is stable across calls.
    fn get_selections(
        &self,
        project_id: Uuid,
        category_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<Selection>>;

    /// Original-case root path, or `None` if the project does not exist.
    fn get_project_root(&self, project_id: Uuid) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Error)]
pub enum DropError {
    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Project path is not a valid directory: {0}")]
    RootNotDirectory(String),

    #[error("No files selected for context generation")]
    NoSelections,

    #[error("Selection store error: {0}")]
    Store(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("Context generation timed out after {0:?}; nothing was written")]
    TimedOut(Duration),

    #[error("Context generation task failed: {0}")]
    Join(String),
}

/// Everything a pass needs, loaded up front so the pass itself can run
/// elsewhere.
#[derive(Debug, Clone)]
pub struct DropPlan {
    pub root: PathBuf,
    pub selections: Vec<Selection>,
}

impl DropPlan {
    pub fn load<S: SelectionStore + ?Sized>(
        store: &S,
        project_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Self, DropError> {
        let root = store
            .get_project_root(project_id)
            .map_err(|e| DropError::Store(format!("{e:#}")))?
            .ok_or(DropError::ProjectNotFound(project_id))?;
        let root = PathBuf::from(root);
        if !root.is_dir() {
            return Err(DropError::RootNotDirectory(root.display().to_string()));
        }

        let selections = store
            .get_selections(project_id, category_id)
            .map_err(|e| DropError::Store(format!("{e:#}")))?;
        if selections.is_empty() {
            return Err(DropError::NoSelections);
        }

        Ok(Self { root, selections })
    }

    pub fn generate(&self, options: &EngineOptions) -> ContextArtifact {
        generate(&self.root, &self.selections, options)
    }

    /// Persist a generated artifact at the project root.
    pub fn persist<W: ArtifactWriter + ?Sized>(
        &self,
        writer: &W,
        artifact: &ContextArtifact,
        options: &EngineOptions,
    ) -> Result<PathBuf, DropError> {
        let target = options.artifact_path(&self.root);
        writer.write(&target, &artifact.text)?;
        Ok(target)
    }
}

/// Load, generate and persist in one call. Returns the written path and the
/// artifact.
pub fn drop_context<S, W>(
    store: &S,
    writer: &W,
    project_id: Uuid,
    category_id: Option<Uuid>,
    options: &EngineOptions,
) -> Result<(PathBuf, ContextArtifact), DropError>
where
    S: SelectionStore + ?Sized,
    W: ArtifactWriter + ?Sized,
{
    let plan = DropPlan::load(store, project_id, category_id)?;
    let artifact = plan.generate(options);
    let target = plan.persist(writer, &artifact, options)?;
    Ok((target, artifact))
}

/// [`drop_context`] with the pass on a blocking thread, optionally bounded by
/// `limit`. When the limit is hit nothing is written; the abandoned pass only
/// reads.
pub async fn drop_context_within<S, W>(
    store: &S,
    writer: &W,
    project_id: Uuid,
    category_id: Option<Uuid>,
    options: &EngineOptions,
    limit: Option<Duration>,
) -> Result<(PathBuf, ContextArtifact), DropError>
where
    S: SelectionStore + ?Sized,
    W: ArtifactWriter + ?Sized,
{
    let plan = DropPlan::load(store, project_id, category_id)?;

    let artifact = {
        let plan = plan.clone();
        let options = options.clone();
        run_blocking_within(limit, move || plan.generate(&options)).await?
    };

    let target = plan.persist(writer, &artifact, options)?;
    Ok((target, artifact))
}

/// Run `pass` on a blocking thread, giving up after `limit`.
///
/// A pass that outlives its limit keeps its thread until it finishes on its
/// own; its result is discarded.
pub async fn run_blocking_within<T, F>(limit: Option<Duration>, pass: F) -> Result<T, DropError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let task = tokio::task::spawn_blocking(pass);
    let joined = match limit {
        Some(limit) => tokio::time::timeout(limit, task)
            .await
            .map_err(|_| DropError::TimedOut(limit))?,
        None => task.await,
    };
    joined.map_err(|e| DropError::Join(e.to_string()))
}

/// Drive `future` to completion on a new multi-threaded runtime.
///
/// The runtime is shut down without waiting for blocking threads, so a pass
/// abandoned by [`run_blocking_within`] does not hold up the caller.
pub fn block_on_detached<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}
