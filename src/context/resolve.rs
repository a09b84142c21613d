//! Resolving selections into the set of files that go into the context file.
//!
//! Inclusion is a plain union: every selection contributes the files it would
//! include on its own, and a file is in the result if any selection contributed
//! it. Nothing depends on the order selections are processed in.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::{debug, warn};

use super::filter::FileTypeFilter;
use super::walk::{walk, Concealed, Step};
use super::PathKey;
use crate::models::Selection;

/// Prefix for display paths of files outside the project root.
pub const EXTERNAL_PREFIX: &str = "EXTERNAL:";

/// The outcome of resolving a selection list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Included files: key to display path.
    pub included: BTreeMap<PathKey, String>,
    /// Display paths of selections that no longer exist, in selection order.
    pub warnings: Vec<String>,
}

impl Resolution {
    pub fn contains(&self, key: &PathKey) -> bool {
        self.included.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// Included files ordered by display path, ignoring case.
    pub fn files_by_display(&self) -> Vec<(&PathKey, &str)> {
        let mut files: Vec<(&PathKey, &str)> = self
            .included
            .iter()
            .map(|(key, display)| (key, display.as_str()))
            .collect();
        files.sort_by(|(ka, a), (kb, b)| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
                .then_with(|| ka.cmp(kb))
        });
        files
    }
}

/// A selection prepared for matching.
#[derive(Debug, Clone)]
pub(crate) struct Target {
    pub key: PathKey,
    /// Taken from disk when the path exists, from the record otherwise.
    pub is_directory: bool,
    pub file_types: Option<String>,
    pub filter: FileTypeFilter,
}

/// All selections of one pass, indexed by key.
#[derive(Debug, Clone, Default)]
pub(crate) struct Targets {
    list: Vec<Target>,
    by_key: HashMap<PathKey, usize>,
}

impl Targets {
    pub fn new(selections: &[Selection]) -> Self {
        let mut targets = Self::default();
        for selection in selections {
            let key = selection.key();
            let path = key.path();
            let is_directory = if path.exists() {
                path.is_dir()
            } else {
                selection.is_directory
            };
            targets.by_key.entry(key.clone()).or_insert(targets.list.len());
            targets.list.push(Target {
                key,
                is_directory,
                file_types: selection.file_types.clone(),
                filter: FileTypeFilter::parse(selection.file_types.as_deref()),
            });
        }
        targets
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.list.iter()
    }

    pub fn get(&self, key: &PathKey) -> Option<&Target> {
        self.by_key.get(key).map(|&i| &self.list[i])
    }

    pub fn contains(&self, key: &PathKey) -> bool {
        self.by_key.contains_key(key)
    }
}

/// Resolve `selections` against `root`.
///
/// Directory walks skip dot-prefixed entries and entries named in
/// `ignored_names` unless that entry is itself selected. `self_exclude` (the
/// context file being written) is never included.
pub fn resolve<S: AsRef<str>>(
    root: &Path,
    selections: &[Selection],
    ignored_names: &[S],
    self_exclude: &Path,
) -> Resolution {
    let resolver = InclusionResolver::new(root, Concealed::new(ignored_names), self_exclude);
    resolver.resolve(&Targets::new(selections))
}

pub(crate) struct InclusionResolver {
    root: PathKey,
    concealed: Concealed,
    self_exclude: PathKey,
}

impl InclusionResolver {
    pub fn new(root: &Path, concealed: Concealed, self_exclude: &Path) -> Self {
        Self {
            root: PathKey::new(root),
            concealed,
            self_exclude: PathKey::new(self_exclude),
        }
    }

    pub fn resolve(&self, targets: &Targets) -> Resolution {
        let mut resolution = Resolution::default();

        for target in targets.iter() {
            let path = target.key.path();
            if !path.exists() {
                warn!("Selected path does not exist, skipping: {}", target.key);
                resolution.warnings.push(self.warning_path(&target.key));
                continue;
            }

            if path.is_dir() {
                debug!(
                    "Walking selected directory {} (types: {:?})",
                    target.key, target.file_types
                );
                walk(
                    path,
                    |node| !self.concealed.hides(&node.name) || targets.contains(&node.key),
                    |_| true,
                    |step| match step {
                        Step::Entry(node) => {
                            if node.is_file() && target.filter.matches(&node.name) {
                                self.include(&mut resolution, node.key);
                            }
                        }
                        Step::Unreadable { path, error, .. } => {
                            debug!("Skipping subtree {} of {}: {}", path.display(), target.key, error)
                        }
                    },
                );
            } else {
                self.include(&mut resolution, target.key.clone());
            }
        }

        debug!("Resolved {} file(s)", resolution.included.len());
        resolution
    }

    fn include(&self, resolution: &mut Resolution, key: PathKey) {
        if key == self.self_exclude {
            debug!("Excluding the context file itself: {}", key);
            return;
        }
        let display = display_path(&key, &self.root);
        // Several spellings of one key may reach here; keep the smallest so the
        // result does not depend on selection order.
        resolution
            .included
            .entry(key)
            .and_modify(|existing| {
                if display < *existing {
                    *existing = display.clone();
                }
            })
            .or_insert(display);
    }

    fn warning_path(&self, key: &PathKey) -> String {
        match key.relative_to(&self.root) {
            Some(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Some(rel) => rel.to_string_lossy().into_owned(),
            None => key.display(),
        }
    }
}

/// Display path of an included file: relative to `root` in original case, or
/// tagged as external when it lies outside.
pub fn display_path(key: &PathKey, root: &PathKey) -> String {
    match key.relative_to(root) {
        Some(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Some(rel) => rel.to_string_lossy().into_owned(),
        None => format!("{EXTERNAL_PREFIX}{}", key.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path() {
        let root = PathKey::new("/Proj");
        assert_eq!(display_path(&PathKey::new("/proj/Sub/c.py"), &root), "Sub/c.py");
        assert_eq!(display_path(&root, &root), ".");
        assert_eq!(
            display_path(&PathKey::new("/Other/x.txt"), &root),
            "EXTERNAL:/Other/x.txt"
        );
    }

    #[test]
    fn test_files_by_display_ignores_case() {
        let mut resolution = Resolution::default();
        resolution
            .included
            .insert(PathKey::new("/p/b.txt"), "b.txt".to_string());
        resolution
            .included
            .insert(PathKey::new("/p/A.txt"), "A.txt".to_string());
        resolution
            .included
            .insert(PathKey::new("/p/c.txt"), "c.txt".to_string());

        let order: Vec<&str> = resolution
            .files_by_display()
            .into_iter()
            .map(|(_, d)| d)
            .collect();
        assert_eq!(order, vec!["A.txt", "b.txt", "c.txt"]);
    }
}
