//! The directory traversal shared by resolution and tree rendering.
//!
//! Both consumers walk with the same routine and differ only in the two
//! predicates they inject: `admit` decides whether an entry is visited at all,
//! `descend` decides whether an admitted directory's contents are walked. Keeping
//! a single traversal is what makes the tree and the content blocks agree on
//! which files count.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::PathKey;

/// An entry reached by [`walk`].
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub key: PathKey,
    pub name: String,
    pub is_dir: bool,
    /// 1 for direct children of the walk start.
    pub depth: usize,
}

impl Node {
    /// True for regular files and for symlinks that resolve to one.
    pub fn is_file(&self) -> bool {
        !self.is_dir && self.key.path().is_file()
    }
}

/// One step of a walk, in pre-order with siblings sorted by name.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Entry(Node),
    /// A directory whose listing failed. `depth` is the directory's own depth
    /// (0 for the walk start). Its siblings are unaffected.
    Unreadable {
        path: PathBuf,
        depth: usize,
        error: String,
    },
}

/// Names hidden from walks unless a selection names them explicitly.
#[derive(Debug, Clone, Default)]
pub(crate) struct Concealed {
    names: HashSet<String>,
}

impl Concealed {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        Self {
            names: names.iter().map(|n| n.as_ref().to_lowercase()).collect(),
        }
    }

    /// Dot-prefixed names and configured ignore names.
    pub fn hides(&self, name: &str) -> bool {
        name.starts_with('.') || self.names.contains(&name.to_lowercase())
    }
}

/// Walk everything below `start`.
///
/// Entries rejected by `admit` are skipped together with their subtrees.
/// Admitted directories are entered only when `descend` agrees. Symlinked
/// directories are reported as non-directory entries and never entered.
pub(crate) fn walk<A, D, V>(start: &Path, mut admit: A, mut descend: D, mut visit: V)
where
    A: FnMut(&Node) -> bool,
    D: FnMut(&Node) -> bool,
    V: FnMut(Step),
{
    let mut entries = WalkDir::new(start)
        .min_depth(1)
        .follow_links(false)
        .sort_by(|a, b| compare_names(a.file_name(), b.file_name()))
        .into_iter();

    while let Some(result) = entries.next() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| start.to_path_buf());
                let depth = path
                    .strip_prefix(start)
                    .map(|rel| rel.components().count())
                    .unwrap_or(0);
                tracing::warn!("Cannot list directory {}: {}", path.display(), err);
                visit(Step::Unreadable {
                    path,
                    depth,
                    error: err.to_string(),
                });
                continue;
            }
        };

        let node = Node {
            key: PathKey::from_entry(entry.path()),
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: entry.file_type().is_dir(),
            depth: entry.depth(),
        };

        if !admit(&node) {
            if node.is_dir {
                entries.skip_current_dir();
            }
            continue;
        }

        let enter = node.is_dir && descend(&node);
        visit(Step::Entry(node));
        if !enter && entry.file_type().is_dir() {
            entries.skip_current_dir();
        }
    }
}

/// Case-insensitive name order with a case-sensitive tie-break, so listings are
/// stable across platforms.
pub(crate) fn compare_names(a: &OsStr, b: &OsStr) -> Ordering {
    let a = a.to_string_lossy();
    let b = b.to_string_lossy();
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn names(steps: &[Step]) -> Vec<String> {
        steps
            .iter()
            .filter_map(|step| match step {
                Step::Entry(node) => Some(format!("{}:{}", node.depth, node.name)),
                Step::Unreadable { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_walk_is_sorted_preorder() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/inner")).unwrap();
        fs::write(dir.path().join("B.txt"), "x").unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        fs::write(dir.path().join("b/inner/z.txt"), "x").unwrap();

        let mut steps = Vec::new();
        walk(dir.path(), |_| true, |_| true, |s| steps.push(s));

        assert_eq!(
            names(&steps),
            vec!["1:a.txt", "1:b", "2:inner", "3:z.txt", "1:B.txt"]
        );
    }

    #[test]
    fn test_rejected_directories_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(dir.path().join("main.js"), "x").unwrap();

        let concealed = Concealed::new(&["node_modules"]);
        let mut steps = Vec::new();
        walk(
            dir.path(),
            |node| !concealed.hides(&node.name),
            |_| true,
            |s| steps.push(s),
        );

        assert_eq!(names(&steps), vec!["1:main.js"]);
    }

    #[test]
    fn test_descend_false_lists_directory_without_contents() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("deep")).unwrap();
        fs::write(dir.path().join("deep/file.txt"), "x").unwrap();
        fs::write(dir.path().join("top.txt"), "x").unwrap();

        let mut steps = Vec::new();
        walk(dir.path(), |_| true, |_| false, |s| steps.push(s));

        assert_eq!(names(&steps), vec!["1:deep", "1:top.txt"]);
    }

    #[test]
    fn test_concealed_names() {
        let concealed = Concealed::new(&["Target", "dist"]);
        assert!(concealed.hides(".git"));
        assert!(concealed.hides("target"));
        assert!(concealed.hides("DIST"));
        assert!(!concealed.hides("src"));
    }
}
