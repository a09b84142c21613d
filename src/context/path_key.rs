//! Case-insensitive path identity.
//!
//! A [`PathKey`] pairs a comparison key with the original-case path it was built
//! from. Equality, hashing and ordering only look at the key, so two spellings of
//! the same path that differ in case are the same key. On Windows `\` and `/` are
//! also interchangeable; elsewhere `\` is an ordinary file name character. Anything
//! shown to a human goes through [`PathKey::display`] instead.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PathKey {
    key: String,
    path: PathBuf,
}

impl PathKey {
    /// Normalize `path` into a key.
    ///
    /// Relative paths are resolved against the current directory, `.` and `..`
    /// components are folded lexically (symlinks are not followed). Separators
    /// are whatever the platform accepts.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref();
        let absolute = std::path::absolute(raw).unwrap_or_else(|_| raw.to_path_buf());
        Self::from_normalized(lexical_normalize(&absolute))
    }

    /// Key of a path read back from the filesystem below an already normalized
    /// directory. The path is taken as is.
    pub(crate) fn from_entry(path: &Path) -> Self {
        Self::from_normalized(path.to_path_buf())
    }

    fn from_normalized(path: PathBuf) -> Self {
        Self {
            key: fold(&path),
            path,
        }
    }

    /// The comparison key: lowercase, `/`-separated, no trailing separator.
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The original-case path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The original-case path as a string, for output.
    pub fn display(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Final component in original case.
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Key of a direct child named `name`.
    pub fn join(&self, name: &str) -> Self {
        Self::from_normalized(self.path.join(name))
    }

    pub fn parent(&self) -> Option<Self> {
        self.path
            .parent()
            .map(|parent| Self::from_normalized(parent.to_path_buf()))
    }

    /// True if `self` is `root` or lies below it.
    pub fn is_within(&self, root: &PathKey) -> bool {
        self == root || self.is_below(root)
    }

    /// True if `self` lies strictly below `ancestor`.
    pub fn is_below(&self, ancestor: &PathKey) -> bool {
        let base = ancestor.key.trim_end_matches('/');
        self.key.len() > base.len()
            && self.key.starts_with(base)
            && self.key[base.len()..].starts_with('/')
    }

    /// Original-case path relative to `root`, or `None` if `self` is outside it.
    ///
    /// The root itself yields an empty path.
    pub fn relative_to(&self, root: &PathKey) -> Option<PathBuf> {
        if !self.is_within(root) {
            return None;
        }
        let skip = root.path.components().count();
        Some(self.path.components().skip(skip).collect())
    }
}

impl PartialEq for PathKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PathKey {}

impl Hash for PathKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for PathKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PathKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn fold(path: &Path) -> String {
    let unified = unify_separators(path.to_string_lossy().to_lowercase());
    match unified.trim_end_matches('/') {
        "" => "/".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[cfg(windows)]
fn unify_separators(path: String) -> String {
    path.replace('\\', "/")
}

#[cfg(not(windows))]
fn unify_separators(path: String) -> String {
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_case_insensitive() {
        let a = PathKey::new("/Proj/Src/Main.py");
        let b = PathKey::new("/proj/src/main.PY");
        assert_eq!(a, b);

        let set: HashSet<PathKey> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[cfg(windows)]
    #[test]
    fn test_backslash_and_slash_are_one_separator() {
        let a = PathKey::new("C:/Proj/Src/Main.py");
        let b = PathKey::new("c:\\proj\\SRC\\main.py");
        assert_eq!(a, b);
        assert!(a.as_str().ends_with("/proj/src/main.py"));
    }

    #[cfg(unix)]
    #[test]
    fn test_backslash_is_part_of_a_unix_name() {
        let key = PathKey::new("/proj/a\\b.txt");
        assert_eq!(key.as_str(), "/proj/a\\b.txt");
        assert_eq!(key.file_name().as_deref(), Some("a\\b.txt"));
        assert_ne!(key, PathKey::new("/proj/a/b.txt"));
        assert_eq!(key.parent(), Some(PathKey::new("/proj")));
    }

    #[test]
    fn test_entry_key_matches_normalized_key() {
        let key = PathKey::from_entry(Path::new("/Proj/Sub/File.TXT"));
        assert_eq!(key, PathKey::new("/proj/sub/file.txt"));
        assert_eq!(key.display(), "/Proj/Sub/File.TXT");
    }

    #[test]
    fn test_display_keeps_original_case() {
        let key = PathKey::new("/Proj/Src/Main.py");
        assert_eq!(key.as_str(), "/proj/src/main.py");
        assert_eq!(key.display(), "/Proj/Src/Main.py");
        assert_eq!(key.file_name().as_deref(), Some("Main.py"));
    }

    #[test]
    fn test_dot_components_are_folded() {
        let key = PathKey::new("/proj/./src/../lib/x.rs");
        assert_eq!(key.as_str(), "/proj/lib/x.rs");
        assert_eq!(key, PathKey::new("/proj/lib/x.rs/"));
    }

    #[test]
    fn test_relative_input_becomes_absolute() {
        let key = PathKey::new("some/relative.txt");
        assert!(key.path().is_absolute());
        assert!(key.as_str().ends_with("some/relative.txt"));
    }

    #[test]
    fn test_within_and_below() {
        let root = PathKey::new("/Proj");
        let inner = PathKey::new("/proj/SUB/c.py");
        let sibling = PathKey::new("/project/c.py");

        assert!(inner.is_within(&root));
        assert!(inner.is_below(&root));
        assert!(root.is_within(&root));
        assert!(!root.is_below(&root));
        assert!(!sibling.is_within(&root));
    }

    #[test]
    fn test_everything_is_below_filesystem_root() {
        let fs_root = PathKey::new("/");
        assert_eq!(fs_root.as_str(), "/");
        assert!(PathKey::new("/etc/hosts").is_below(&fs_root));
    }

    #[test]
    fn test_relative_to_uses_original_case() {
        let root = PathKey::new("/proj");
        let inner = PathKey::new("/PROJ/Sub/C.py");
        assert_eq!(inner.relative_to(&root), Some(PathBuf::from("Sub/C.py")));
        assert_eq!(root.relative_to(&root), Some(PathBuf::new()));
        assert_eq!(PathKey::new("/elsewhere/x").relative_to(&root), None);
    }

    #[test]
    fn test_join_and_parent() {
        let dir = PathKey::new("/Proj/Sub");
        let child = dir.join("File.TXT");
        assert_eq!(child, PathKey::new("/proj/sub/file.txt"));
        assert_eq!(child.parent(), Some(dir));
    }
}
