//! Persisting the generated context file.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to write context file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid context file target: {0}")]
    InvalidTarget(String),
}

/// Destination for a finished context file.
pub trait ArtifactWriter {
    fn write(&self, target: &Path, contents: &str) -> Result<(), ArtifactError>;
}

/// Writes next to the target and renames into place, so readers never see a
/// half-written file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsArtifactWriter;

impl ArtifactWriter for FsArtifactWriter {
    fn write(&self, target: &Path, contents: &str) -> Result<(), ArtifactError> {
        let dir = target
            .parent()
            .filter(|p| p.is_dir())
            .ok_or_else(|| ArtifactError::InvalidTarget(target.display().to_string()))?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(target).map_err(|e| e.error)?;

        tracing::info!("Wrote context file {}", target.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("context.txt");
        fs::write(&target, "old").unwrap();

        FsArtifactWriter.write(&target, "new contents").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new contents");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gone").join("context.txt");

        let err = FsArtifactWriter.write(&target, "x").unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidTarget(_)));
    }
}
