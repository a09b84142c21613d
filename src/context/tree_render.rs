//! ASCII tree rendering of a project with inclusion marks.
//!
//! Example output:
//! ```text
//! proj/ [...]
//!   ├── a.py
//!   ├── b.txt
//!   └── sub [*] (Dir: .py)
//!       └── c.py [*]
//! ```
//!
//! `[*]` marks explicit selections and files that end up in the context file,
//! `[...]` marks directories that only contain such entries. Subtrees with
//! nothing selected are listed only down to a fixed depth.

use std::collections::HashSet;
use std::path::{Path, MAIN_SEPARATOR};

use super::filter::filter_label;
use super::resolve::{InclusionResolver, Resolution, Target, Targets};
use super::walk::{walk, Concealed, Node, Step};
use super::{EngineOptions, PathKey};
use crate::models::Selection;

const SELECTED: &str = " [*]";
const CONTAINS_SELECTED: &str = " [...]";
const ROOT_INDENT: &str = "  ";
const OUTSIDE_HEADER: &str = "----- Other Selected Items (Outside Project Root) -----";

/// Render the annotated tree for `root`.
pub fn render_tree(root: &Path, selections: &[Selection], options: &EngineOptions) -> String {
    let targets = Targets::new(selections);
    let resolution = InclusionResolver::new(
        root,
        Concealed::new(&options.ignored_names),
        &options.artifact_path(root),
    )
    .resolve(&targets);
    TreeRenderer::new(root, options).render(&targets, &resolution)
}

pub(crate) struct TreeRenderer<'a> {
    root: PathKey,
    options: &'a EngineOptions,
}

/// A line waiting for its connector; siblings are only known after the walk.
enum Pending {
    Entry { depth: usize, label: String },
    Error { depth: usize, name: String },
}

impl Pending {
    fn depth(&self) -> usize {
        match self {
            Self::Entry { depth, .. } | Self::Error { depth, .. } => *depth,
        }
    }
}

impl<'a> TreeRenderer<'a> {
    pub fn new(root: &Path, options: &'a EngineOptions) -> Self {
        Self {
            root: PathKey::new(root),
            options,
        }
    }

    pub fn render(&self, targets: &Targets, resolution: &Resolution) -> String {
        let root_path = self.root.path();
        if !root_path.is_dir() {
            return format!(
                "Error: Project path '{}' is not a valid directory.",
                self.root
            );
        }

        let ancestors = self.ancestors(targets, resolution);
        let concealed = Concealed::new(&self.options.ignored_names);
        let artifact = PathKey::new(self.options.artifact_path(root_path));

        let mut pending = Vec::new();
        walk(
            root_path,
            |node| {
                node.key != artifact
                    && (!concealed.hides(&node.name)
                        || targets.contains(&node.key)
                        || ancestors.contains(&node.key))
            },
            |node| {
                targets.contains(&node.key)
                    || ancestors.contains(&node.key)
                    || node.depth <= self.options.tree_depth
            },
            |step| match step {
                Step::Entry(node) => pending.push(Pending::Entry {
                    depth: node.depth,
                    label: self.label(&node, targets, resolution, &ancestors),
                }),
                Step::Unreadable { path, depth, .. } => pending.push(Pending::Error {
                    depth: depth + 1,
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string()),
                }),
            },
        );

        let mut lines = vec![self.root_line(targets, &ancestors)];
        lines.extend(connect(&pending));
        lines.extend(self.outside_lines(targets));
        lines.join("\n")
    }

    /// Keys of every directory between the root (inclusive) and a selected or
    /// included path inside it.
    fn ancestors(&self, targets: &Targets, resolution: &Resolution) -> HashSet<PathKey> {
        let mut ancestors = HashSet::new();
        let inside = targets
            .iter()
            .map(|t| &t.key)
            .chain(resolution.included.keys())
            .filter(|key| key.is_below(&self.root));

        for key in inside {
            let mut current = key.parent();
            while let Some(dir) = current {
                if !dir.is_within(&self.root) || !ancestors.insert(dir.clone()) {
                    break;
                }
                current = dir.parent();
            }
        }
        ancestors
    }

    fn root_line(&self, targets: &Targets, ancestors: &HashSet<PathKey>) -> String {
        let name = self.root.file_name().unwrap_or_else(|| self.root.display());
        let mut line = format!("{name}{MAIN_SEPARATOR}");
        match targets.get(&self.root) {
            Some(target) => {
                line.push_str(SELECTED);
                line.push_str(&dir_suffix(target));
            }
            None if ancestors.contains(&self.root) => line.push_str(CONTAINS_SELECTED),
            None => {}
        }
        line
    }

    fn label(
        &self,
        node: &Node,
        targets: &Targets,
        resolution: &Resolution,
        ancestors: &HashSet<PathKey>,
    ) -> String {
        let mut label = node.name.clone();
        if let Some(target) = targets.get(&node.key) {
            label.push_str(SELECTED);
            if node.is_dir {
                label.push_str(&dir_suffix(target));
            }
        } else if !node.is_dir && resolution.contains(&node.key) {
            label.push_str(SELECTED);
        } else if node.is_dir && ancestors.contains(&node.key) {
            label.push_str(CONTAINS_SELECTED);
        }
        label
    }

    fn outside_lines(&self, targets: &Targets) -> Vec<String> {
        let mut outside: Vec<&Target> = targets
            .iter()
            .filter(|t| !t.key.is_within(&self.root))
            .collect();
        if outside.is_empty() {
            return Vec::new();
        }
        outside.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then_with(|| a.key.display().cmp(&b.key.display()))
        });
        outside.dedup_by(|a, b| a.key == b.key);

        let mut lines = vec![String::new(), OUTSIDE_HEADER.to_string()];
        for target in outside {
            let mut line = format!("{}{}", target.key.display(), SELECTED);
            if target.is_directory {
                line.push_str(&dir_suffix(target));
            }
            lines.push(line);
        }
        lines
    }
}

fn dir_suffix(target: &Target) -> String {
    format!(" (Dir: {})", filter_label(target.file_types.as_deref()))
}

/// Attach box-drawing connectors to pre-order lines.
fn connect(pending: &[Pending]) -> Vec<String> {
    // A line is the last of its siblings when no later line at the same depth
    // appears before the walk climbs above that depth.
    let mut is_last = vec![false; pending.len()];
    let mut seen: Vec<bool> = Vec::new();
    for (i, item) in pending.iter().enumerate().rev() {
        let depth = item.depth();
        if seen.len() <= depth {
            seen.resize(depth + 1, false);
        }
        is_last[i] = !seen[depth];
        seen[depth] = true;
        seen.truncate(depth + 1);
    }

    let mut lines = Vec::with_capacity(pending.len());
    let mut open: Vec<bool> = Vec::new();
    for (item, last) in pending.iter().zip(is_last) {
        let depth = item.depth();
        open.truncate(depth.saturating_sub(1));

        let mut line = String::from(ROOT_INDENT);
        for ancestor_is_last in &open {
            line.push_str(if *ancestor_is_last { "    " } else { "│   " });
        }
        line.push_str(if last { "└── " } else { "├── " });
        match item {
            Pending::Entry { label, .. } => line.push_str(label),
            Pending::Error { name, .. } => {
                line.push_str(&format!("[Error listing directory: {name}]"))
            }
        }
        lines.push(line);
        open.push(last);
    }
    lines
}
