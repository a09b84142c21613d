//! Plain-text previews of a single file or directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use super::aggregate::{has_binary_extension, sniff_binary};
use super::EngineOptions;

const BYTES_PER_MB: u64 = 1024 * 1024;
const NO_EXTENSION: &str = "files w/o extension";

/// Describe `path` for a preview pane.
pub fn preview(path: &Path, options: &EngineOptions) -> String {
    if !path.exists() {
        return format!("Path does not exist: {}", path.display());
    }
    if path.is_dir() {
        return directory_summary(path);
    }
    if path.is_file() {
        return file_preview(path, options);
    }
    format!("Path is not a regular file or directory: {}", path.display())
}

fn file_preview(path: &Path, options: &EngineOptions) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if has_binary_extension(path, &options.binary_extensions) || sniff_binary(path) {
        return format!("File: {name}\n\n(Binary file, content not displayed)");
    }

    let size = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => return format!("File: {name}\n\n(Error reading file for preview: {e})"),
    };
    if size > options.preview_max_bytes {
        return format!(
            "File: {name}\n\n(File is too large for preview: {} MB.\nMax preview size: {} MB)",
            size / BYTES_PER_MB,
            options.preview_max_bytes / BYTES_PER_MB
        );
    }

    match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("File: {name}\n\n(Error reading file for preview: {e})"),
    }
}

fn directory_summary(dir: &Path) -> String {
    let mut files = 0usize;
    let mut subdirs = 0usize;
    let mut by_extension: BTreeMap<String, usize> = BTreeMap::new();

    for entry in WalkDir::new(dir).min_depth(1).into_iter().filter_map(|e| e.ok()) {
        if entry.file_type().is_dir() {
            subdirs += 1;
        } else if entry.file_type().is_file() {
            files += 1;
            let ext = entry
                .path()
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_else(|| NO_EXTENSION.to_string());
            *by_extension.entry(ext).or_default() += 1;
        }
    }

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string());
    let mut lines = vec![
        format!("Directory: {name} (at {})", dir.display()),
        format!("Contains: {files} files and {subdirs} subdirectories (recursively)."),
    ];

    if !by_extension.is_empty() {
        let mut counts: Vec<(String, usize)> = by_extension.into_iter().collect();
        counts.sort_by(|(ea, ca), (eb, cb)| cb.cmp(ca).then_with(|| ea.cmp(eb)));
        let parts: Vec<String> = counts
            .iter()
            .map(|(ext, count)| format!("{count} {ext}"))
            .collect();
        lines.push(format!("File types: {}.", parts.join(", ")));
    } else if subdirs == 0 {
        lines.push("This directory is empty.".to_string());
    } else {
        lines.push("No files found in this directory or its subdirectories.".to_string());
    }

    lines.join("\n")
}
