//! Local staging for downloaded files.
//!
//! Each upload attempt gets its own temporary directory under the staging
//! root. The directory belongs to exactly one attempt and is removed when the
//! [`StagedAttempt`] is closed or dropped, whichever happens first.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::TempDir;

use super::SafeFileName;

/// Root directory under which per-attempt staging directories are created.
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Staging under the system temporary directory.
    pub fn system_temp() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the staging directory for a new attempt.
    ///
    /// Directory creation runs on the blocking pool.
    pub async fn begin(&self) -> anyhow::Result<StagedAttempt> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || create_attempt(&root))
            .await
            .context("Staging task was cancelled")?
    }
}

fn create_attempt(root: &Path) -> anyhow::Result<StagedAttempt> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create staging root: {}", root.display()))?;

    let dir = tempfile::Builder::new()
        .prefix("netdrop-")
        .tempdir_in(root)
        .with_context(|| format!("Failed to create staging directory in {}", root.display()))?;

    tracing::debug!(dir = %dir.path().display(), "staging directory created");
    Ok(StagedAttempt { dir })
}

/// Staging directory owned by a single in-flight attempt.
#[derive(Debug)]
pub struct StagedAttempt {
    dir: TempDir,
}

impl StagedAttempt {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Location for a staged file. Only sanitized names can be joined.
    pub fn file_path(&self, name: &SafeFileName) -> PathBuf {
        self.dir.path().join(name.as_str())
    }

    /// Remove the staging directory on the blocking pool.
    pub async fn discard(self) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.close()).await {
            tracing::warn!(error = %e, "staging cleanup task failed");
        }
    }

    /// Remove the staging directory, logging instead of failing on error.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(dir = %path.display(), error = %e, "failed to remove staging directory");
        } else {
            tracing::debug!(dir = %path.display(), "staging directory removed");
        }
    }
}
