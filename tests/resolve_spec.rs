use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use context_dropper::context::{resolve, PathKey, DEFAULT_IGNORED_NAMES};
use context_dropper::models::Selection;
use speculate2::speculate;
use uuid::Uuid;

fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
}

fn select(path: &Path, is_directory: bool, file_types: Option<&str>) -> Selection {
    Selection {
        id: Uuid::new_v4(),
        project_id: Uuid::nil(),
        path: path.to_string_lossy().into_owned(),
        is_directory,
        category_id: None,
        file_types: file_types.map(str::to_string),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn included(root: &Path, selections: &[Selection]) -> Vec<String> {
    resolve(root, selections, DEFAULT_IGNORED_NAMES, &root.join("context.txt"))
        .files_by_display()
        .into_iter()
        .map(|(_, display)| display.to_string())
        .collect()
}

speculate! {
    before {
        let tmp = tempfile::tempdir().expect("Failed to create temp dir");
        let root = tmp.path().join("proj");
        write(&root, "a.py", "print('a')");
        write(&root, "b.txt", "bee");
        write(&root, "sub/c.py", "print('c')");
    }

    describe "directory filters" {
        it "includes only matching files below the selected directory" {
            let selections = vec![select(&root.join("sub"), true, Some(".py"))];
            assert_eq!(included(&root, &selections), vec!["sub/c.py"]);
        }

        it "matches extensions without regard to case" {
            write(&root, "docs/notes.md", "n");
            write(&root, "docs/guide/NOTES.MD", "N");
            write(&root, "docs/image.png", "p");
            write(&root, "docs/tool.py", "t");

            let selections = vec![select(&root.join("docs"), true, Some(".py,.md"))];
            assert_eq!(
                included(&root, &selections),
                vec!["docs/guide/NOTES.MD", "docs/notes.md", "docs/tool.py"]
            );
        }

        it "treats a bare token as an exact file name" {
            write(&root, "docs/notes.md", "n");
            write(&root, "docs/Makefile", "all:");

            let selections = vec![select(&root.join("docs"), true, Some("md, makefile"))];
            assert_eq!(included(&root, &selections), vec!["docs/Makefile"]);
        }

        it "includes everything when no filter is set" {
            let selections = vec![select(&root, true, None)];
            assert_eq!(included(&root, &selections), vec!["a.py", "b.txt", "sub/c.py"]);
        }
    }

    describe "pruning" {
        it "skips hidden and ignored entries" {
            write(&root, ".git/config", "[core]");
            write(&root, "node_modules/pkg/index.js", "x");
            write(&root, ".env", "SECRET=1");

            let selections = vec![select(&root, true, None)];
            assert_eq!(included(&root, &selections), vec!["a.py", "b.txt", "sub/c.py"]);
        }

        it "walks into an ignored directory that is itself selected" {
            write(&root, "node_modules/pkg/index.js", "x");

            let selections = vec![
                select(&root, true, None),
                select(&root.join("node_modules"), true, Some(".json")),
            ];
            assert_eq!(
                included(&root, &selections),
                vec!["a.py", "b.txt", "node_modules/pkg/index.js", "sub/c.py"]
            );
        }

        it "includes a selected hidden file" {
            write(&root, ".env", "SECRET=1");

            let selections = vec![select(&root.join(".env"), false, None)];
            assert_eq!(included(&root, &selections), vec![".env"]);
        }
    }

    describe "self exclusion" {
        it "never includes the context file through a directory" {
            write(&root, "context.txt", "old output");

            let selections = vec![select(&root, true, None)];
            assert_eq!(included(&root, &selections), vec!["a.py", "b.txt", "sub/c.py"]);
        }

        it "never includes the context file when selected directly" {
            write(&root, "context.txt", "old output");

            let selections = vec![
                select(&root.join("context.txt"), false, None),
                select(&root, true, Some(".txt")),
            ];
            assert_eq!(included(&root, &selections), vec!["b.txt"]);
        }
    }

    describe "union" {
        it "does not depend on selection order" {
            let mut selections = vec![
                select(&root.join("sub"), true, Some(".md")),
                select(&root.join("sub/c.py"), false, None),
                select(&root, true, Some(".txt")),
            ];
            let forward = resolve(&root, &selections, DEFAULT_IGNORED_NAMES, &root.join("context.txt"));
            selections.reverse();
            let backward = resolve(&root, &selections, DEFAULT_IGNORED_NAMES, &root.join("context.txt"));

            assert_eq!(forward, backward);
            assert_eq!(included(&root, &selections), vec!["b.txt", "sub/c.py"]);
        }

        it "lists a file once when several selections include it" {
            let selections = vec![
                select(&root, true, None),
                select(&root.join("sub"), true, None),
                select(&root.join("sub/c.py"), false, None),
            ];
            let resolution = resolve(&root, &selections, DEFAULT_IGNORED_NAMES, &root.join("context.txt"));
            assert_eq!(resolution.len(), 3);
            assert!(resolution.contains(&PathKey::new(root.join("sub/c.py"))));
        }
    }

    describe "missing and external paths" {
        it "warns about missing selections and continues" {
            let selections = vec![
                select(&root.join("gone.rs"), false, None),
                select(&root.join("a.py"), false, None),
            ];
            let resolution = resolve(&root, &selections, DEFAULT_IGNORED_NAMES, &root.join("context.txt"));

            assert_eq!(resolution.warnings, vec!["gone.rs"]);
            assert_eq!(resolution.len(), 1);
        }

        it "tags files outside the root as external" {
            let outside = write(tmp.path(), "shared/util.py", "u");

            let selections = vec![select(&outside, false, None)];
            let expected = format!("EXTERNAL:{}", PathKey::new(&outside).display());
            assert_eq!(included(&root, &selections), vec![expected]);
        }

        it "reports a missing external selection by its absolute path" {
            let outside = tmp.path().join("elsewhere.txt");

            let selections = vec![select(&outside, false, None)];
            let resolution = resolve(&root, &selections, DEFAULT_IGNORED_NAMES, &root.join("context.txt"));
            assert_eq!(resolution.warnings, vec![PathKey::new(&outside).display()]);
        }
    }
}

#[cfg(unix)]
mod unix {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    /// Makes a directory unlistable and restores it when dropped so the temp
    /// dir can be cleaned up.
    struct Locked(PathBuf);

    impl Locked {
        fn new(dir: &Path) -> Self {
            fs::set_permissions(dir, fs::Permissions::from_mode(0o000)).unwrap();
            Self(dir.to_path_buf())
        }

        /// Privileged users can list the directory anyway.
        fn holds(&self) -> bool {
            fs::read_dir(&self.0).is_err()
        }
    }

    impl Drop for Locked {
        fn drop(&mut self) {
            let _ = fs::set_permissions(&self.0, fs::Permissions::from_mode(0o755));
        }
    }

    #[test]
    fn keeps_backslashes_inside_file_names() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("proj");
        write(&root, "a\\b.txt", "odd");
        write(&root, "plain.txt", "plain");

        let selections = vec![select(&root, true, None)];
        assert_eq!(included(&root, &selections), vec!["a\\b.txt", "plain.txt"]);
    }

    #[test]
    fn selects_a_file_with_a_backslash_in_its_name() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("proj");
        let odd = write(&root, "a\\b.txt", "odd");
        write(&root, "a/b.txt", "nested");

        let selections = vec![select(&odd, false, None)];
        assert_eq!(included(&root, &selections), vec!["a\\b.txt"]);
    }

    #[test]
    fn resolves_siblings_of_an_unreadable_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("proj");
        write(&root, "a.py", "a");
        write(&root, "locked/secret.py", "s");
        write(&root, "z.py", "z");

        let locked = Locked::new(&root.join("locked"));
        if !locked.holds() {
            return;
        }

        let selections = vec![select(&root, true, None)];
        let resolution = resolve(&root, &selections, DEFAULT_IGNORED_NAMES, &root.join("context.txt"));
        let files: Vec<&str> = resolution
            .files_by_display()
            .into_iter()
            .map(|(_, display)| display)
            .collect();

        assert_eq!(files, vec!["a.py", "z.py"]);
        assert!(resolution.warnings.is_empty());
    }
}
