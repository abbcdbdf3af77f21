//! Temporary on-disk storage for uploads being processed

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory uploads are written to while they are processed
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the staging directory if it does not exist
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Write `data` to a fresh `<uuid>.<extension>` file
    pub async fn stage(&self, extension: &str, data: &[u8]) -> std::io::Result<StagedUpload> {
        self.ensure_dir().await?;

        let path = self.dir.join(format!("{}.{}", Uuid::new_v4(), extension));
        let staged = StagedUpload { path };
        tokio::fs::write(&staged.path, data).await?;

        debug!("Staged {} bytes at {}", data.len(), staged.path.display());
        Ok(staged)
    }
}

/// A staged file, deleted when dropped
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now
    pub async fn remove(self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed staged file {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged file {}: {}", self.path.display(), e),
        }
        // Drop finds nothing left to delete
    }
}

// Error paths drop the guard without awaiting `remove`. Unlinking one file
// synchronously on the worker thread is acceptable there.
impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staged file {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged file {}: {}", self.path.display(), e),
        }
    }
}

/// Reduce a client-supplied filename to a safe basename.
///
/// Directory components are dropped, characters outside
/// `[A-Za-z0-9._-]` become `_`, and leading dots are stripped.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    cleaned.trim_start_matches('.').to_string()
}
