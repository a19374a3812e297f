//! Error taxonomy for upload attempts.
//!
//! `DeployError` is the single failure type an attempt can end with. Gate and
//! validator rejections never touch the network; the protocol variants always
//! name the phase they failed in.

use crate::deploy::DeployPhase;

/// Boxed error used at collaborator seams (transport downloads, staging I/O).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Reasons a submitted file cannot enter the deploy pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("file has no usable name")]
    MissingFilename,

    #[error("unsupported file extension: {name}")]
    UnsupportedExtension { name: String },

    #[error("two artifacts share the name '{name}'")]
    NameCollision { name: String },

    #[error("file is {size} bytes, limit is {limit}")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("declared size {declared} does not match {actual} staged bytes")]
    SizeMismatch { declared: u64, actual: u64 },

    #[error("bundle has no artifacts")]
    EmptyBundle,

    #[error("failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

impl ArtifactError {
    /// Stable, machine-readable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::MissingFilename => "missing_filename",
            Self::UnsupportedExtension { .. } => "unsupported_extension",
            Self::NameCollision { .. } => "name_collision",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::SizeMismatch { .. } => "size_mismatch",
            Self::EmptyBundle => "empty_bundle",
            Self::Archive(_) => "archive_error",
        }
    }
}

/// Terminal failure of one upload attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("principal {principal} is not in the allow-list")]
    Unauthorized { principal: i64 },

    #[error("invalid artifact: {0}")]
    InvalidArtifact(#[from] ArtifactError),

    #[error("{phase} request failed: {source}")]
    TransportFailure {
        phase: DeployPhase,
        #[source]
        source: reqwest::Error,
    },

    #[error("{phase} rejected by backend: HTTP {status}")]
    BackendRejected {
        phase: DeployPhase,
        status: u16,
        body: String,
    },

    #[error("{phase}: {detail}")]
    InternalInconsistency { phase: DeployPhase, detail: String },

    #[error("staging failed: {detail}")]
    Staging {
        detail: String,
        #[source]
        source: BoxError,
    },

    #[error("deploy task aborted: {0}")]
    TaskAborted(#[from] tokio::task::JoinError),
}

impl DeployError {
    pub(crate) fn staging(detail: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Staging {
            detail: detail.into(),
            source: source.into(),
        }
    }

    /// Protocol phase the failure happened in, if it happened on the network.
    pub fn phase(&self) -> Option<DeployPhase> {
        match self {
            Self::TransportFailure { phase, .. }
            | Self::BackendRejected { phase, .. }
            | Self::InternalInconsistency { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// True for failures of the remote protocol (transport or backend status).
    pub fn is_upload_failure(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure { .. }
                | Self::BackendRejected { .. }
                | Self::InternalInconsistency { .. }
        )
    }
}
