//! Deployable content: single files and the payload handed to the backend.

use std::path::Path;

use anyhow::Context;
use sha1::{Digest, Sha1};

use crate::bundle::Bundle;
use crate::error::ArtifactError;
use crate::fs::SafeFileName;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const ZIP_ARCHIVE: &str = "application/zip";

/// A validated candidate file with its bytes loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileArtifact {
    name: SafeFileName,
    bytes: Vec<u8>,
    declared_size: u64,
}

impl FileArtifact {
    /// Build an artifact whose declared size is the byte length.
    pub fn new(name: SafeFileName, bytes: Vec<u8>) -> Self {
        let declared_size = bytes.len() as u64;
        Self {
            name,
            bytes,
            declared_size,
        }
    }

    /// Build an artifact with a size reported by the transport.
    ///
    /// Fails when the staged bytes differ from what was announced.
    pub fn with_declared_size(
        name: SafeFileName,
        bytes: Vec<u8>,
        declared_size: u64,
    ) -> Result<Self, ArtifactError> {
        let actual = bytes.len() as u64;
        if actual != declared_size {
            return Err(ArtifactError::SizeMismatch {
                declared: declared_size,
                actual,
            });
        }
        Ok(Self {
            name,
            bytes,
            declared_size,
        })
    }

    /// Read a staged file from disk.
    pub async fn load(path: &Path, name: SafeFileName) -> anyhow::Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read staged file: {}", path.display()))?;
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &SafeFileName {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }
}

/// Content of one deploy attempt, with its digest fixed at construction.
#[derive(Debug, Clone)]
pub enum DeployPayload {
    /// A single file deployed as-is.
    File { artifact: FileArtifact, digest: String },
    /// An archive of one or more files.
    Bundle(Bundle),
}

impl DeployPayload {
    pub fn single(artifact: FileArtifact) -> Self {
        let digest = content_digest(artifact.bytes());
        Self::File { artifact, digest }
    }

    /// Name the payload is published under.
    pub fn target_name(&self) -> &SafeFileName {
        match self {
            Self::File { artifact, .. } => artifact.name(),
            Self::Bundle(bundle) => bundle.name(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::File { artifact, .. } => artifact.bytes(),
            Self::Bundle(bundle) => bundle.bytes(),
        }
    }

    pub fn digest(&self) -> &str {
        match self {
            Self::File { digest, .. } => digest,
            Self::Bundle(bundle) => bundle.digest(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::File { .. } => OCTET_STREAM,
            Self::Bundle(_) => ZIP_ARCHIVE,
        }
    }
}

/// SHA-1 hex digest of finalized content, as keyed by the deploy file manifest.
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}
