//! Serializing the included files into the context file body.
//!
//! Every per-file failure is written into the output as its own block; a bad
//! file never stops the remaining files from being aggregated.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use super::resolve::Resolution;

pub const STRUCTURE_HEADER: &str =
    "----- Project Structure (Files included in context file indicated with *) -----";
pub const STRUCTURE_FOOTER: &str = "----- End Project Structure -----";

/// Bytes inspected for a NUL when sniffing for binary content.
const SNIFF_LEN: u64 = 1024;

/// What reading one included file produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Trimmed, lossily decoded text.
    Text(String),
    Binary,
    Error(String),
}

/// Read `path`, classifying it as binary when its name ends in one of
/// `binary_extensions`, when it is not a regular file, when its first kilobyte
/// holds a NUL byte, or when that first read fails.
pub fn read_content<S: AsRef<str>>(path: &Path, binary_extensions: &[S]) -> FileContent {
    if has_binary_extension(path, binary_extensions) || sniff_binary(path) {
        return FileContent::Binary;
    }
    match fs::read(path) {
        Ok(bytes) => FileContent::Text(String::from_utf8_lossy(&bytes).trim().to_string()),
        Err(e) => FileContent::Error(e.to_string()),
    }
}

pub(crate) fn has_binary_extension<S: AsRef<str>>(path: &Path, binary_extensions: &[S]) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    binary_extensions
        .iter()
        .any(|ext| name.ends_with(&ext.as_ref().to_lowercase()))
}

pub(crate) fn sniff_binary(path: &Path) -> bool {
    // Only regular files are opened. Pipes and devices may block.
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => {
            debug!("Treating non-regular {} as binary", path.display());
            return true;
        }
        Err(e) => {
            debug!("Treating unreadable {} as binary: {}", path.display(), e);
            return true;
        }
    }

    let mut head = Vec::new();
    match File::open(path).and_then(|f| f.take(SNIFF_LEN).read_to_end(&mut head)) {
        Ok(_) => head.contains(&0),
        Err(e) => {
            debug!("Treating unreadable {} as binary: {}", path.display(), e);
            true
        }
    }
}

/// Build the complete context file: structure block, not-found warnings, then
/// one block per included file ordered by display path.
pub fn aggregate<S: AsRef<str>>(
    tree: &str,
    resolution: &Resolution,
    binary_extensions: &[S],
) -> String {
    let mut lines = vec![
        STRUCTURE_HEADER.to_string(),
        tree.to_string(),
        format!("{STRUCTURE_FOOTER}\n"),
    ];

    for missing in &resolution.warnings {
        lines.push(format!("----- Warning: Selected path not found: {missing} -----"));
    }

    for (key, display) in resolution.files_by_display() {
        let content = read_content(key.path(), binary_extensions);
        if let FileContent::Error(ref message) = content {
            warn!("Error reading {}: {}", key, message);
        }
        push_block(&mut lines, display, content);
    }

    lines.join("\n")
}

fn push_block(lines: &mut Vec<String>, display: &str, content: FileContent) {
    match content {
        FileContent::Text(text) => {
            lines.push(format!("----- File: {display} -----"));
            lines.push(text);
            lines.push(format!("----- End File: {display} -----\n"));
        }
        FileContent::Binary => {
            lines.push(format!("----- File: {display} (Skipped Binary File) -----"));
            lines.push(format!("----- End File: {display} -----\n"));
        }
        FileContent::Error(message) => {
            lines.push(format!("----- Error reading file: {display} -----"));
            lines.push(format!("Error: {message}"));
            lines.push(format!("----- End Error: {display} -----\n"));
        }
    }
}
