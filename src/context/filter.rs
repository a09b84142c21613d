//! Directory file-type filters.
//!
//! A filter string is a comma-separated list of tokens. Tokens starting with `.`
//! match as a case-insensitive suffix of the file name; any other token matches
//! only a file with exactly that name (ignoring case). `md` therefore does not
//! match `notes.md`. An empty or missing filter matches everything.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileTypeFilter {
    extensions: Vec<String>,
    names: Vec<String>,
}

impl FileTypeFilter {
    pub fn parse(spec: Option<&str>) -> Self {
        let mut filter = Self::default();
        for token in spec.unwrap_or_default().split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let folded = token.to_lowercase();
            if folded.starts_with('.') {
                filter.extensions.push(folded);
            } else {
                filter.names.push(folded);
            }
        }
        filter
    }

    /// True when the filter places no restriction on file names.
    pub fn is_all(&self) -> bool {
        self.extensions.is_empty() && self.names.is_empty()
    }

    pub fn matches(&self, file_name: &str) -> bool {
        if self.is_all() {
            return true;
        }
        let folded = file_name.to_lowercase();
        self.names.iter().any(|name| *name == folded)
            || self.extensions.iter().any(|ext| folded.ends_with(ext.as_str()))
    }
}

/// Label for a directory's filter as shown in trees and listings: the filter as
/// entered, or `ALL` when it is empty.
pub fn filter_label(spec: Option<&str>) -> String {
    match spec.map(str::trim) {
        Some(spec) if !FileTypeFilter::parse(Some(spec)).is_all() => spec.to_string(),
        _ => "ALL".to_string(),
    }
}
