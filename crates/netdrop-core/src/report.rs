//! User-facing replies for upload outcomes.
//!
//! Replies never contain backend response bodies; those go to the log only.

use crate::deploy::DeployOutcome;
use crate::error::{ArtifactError, DeployError};
use crate::fs::SafeFileName;

/// Maps outcomes to the single reply message sent per attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultReporter;

impl ResultReporter {
    pub fn new() -> Self {
        Self
    }

    /// Optional acknowledgment sent before the deploy starts.
    pub fn processing(&self, name: Option<&SafeFileName>) -> String {
        match name {
            Some(name) => format!("⏳ Uploading {name}…"),
            None => "⏳ Uploading…".to_string(),
        }
    }

    pub fn report(&self, outcome: &DeployOutcome) -> String {
        match outcome {
            DeployOutcome::Published(published) => {
                format!("✅ Upload complete:\n{}", published.url)
            }
            DeployOutcome::Failed(err) => self.failure(err),
        }
    }

    fn failure(&self, err: &DeployError) -> String {
        match err {
            DeployError::Unauthorized { .. } => "❌ You are not allowed.".to_string(),
            DeployError::InvalidArtifact(reason) => {
                format!("❌ File rejected: {}", artifact_cause(reason))
            }
            DeployError::TransportFailure { phase, .. }
            | DeployError::BackendRejected { phase, .. }
            | DeployError::InternalInconsistency { phase, .. } => {
                format!("❌ Upload failed at the {phase} step. Please try again later.")
            }
            DeployError::Staging { .. } => {
                "❌ Upload failed: the file could not be retrieved.".to_string()
            }
            DeployError::TaskAborted(_) => {
                "❌ Upload failed: internal error.".to_string()
            }
        }
    }
}

fn artifact_cause(err: &ArtifactError) -> String {
    match err {
        ArtifactError::MissingFilename => "the file has no name.".to_string(),
        ArtifactError::UnsupportedExtension { name } => {
            format!("{name} is not a supported file type.")
        }
        ArtifactError::NameCollision { name } => format!("{name} was submitted twice."),
        ArtifactError::FileTooLarge { limit, .. } => {
            format!("the file is larger than {} MB.", limit / (1024 * 1024))
        }
        ArtifactError::SizeMismatch { .. } => "the download was incomplete.".to_string(),
        ArtifactError::EmptyBundle => "no files were submitted.".to_string(),
        ArtifactError::Archive(_) => "the files could not be packaged.".to_string(),
    }
}
