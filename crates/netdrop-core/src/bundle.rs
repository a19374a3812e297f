//! Artifact bundling
//!
//! Packs one or more validated files into a single zip archive. Output is
//! deterministic: the same artifacts in the same order give byte-identical
//! archives, so the digest can serve as the idempotency key of a deploy.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;

use crate::artifact::{FileArtifact, content_digest};
use crate::error::ArtifactError;
use crate::fs::{SafeFileName, sanitize_filename};

/// Finalized archive plus its content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    name: SafeFileName,
    bytes: Vec<u8>,
    digest: String,
    entries: Vec<SafeFileName>,
}

impl Bundle {
    /// Archive filename, derived from the digest.
    pub fn name(&self) -> &SafeFileName {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Entry names in archive order.
    pub fn entries(&self) -> &[SafeFileName] {
        &self.entries
    }
}

/// Packs artifacts into deterministic zip archives.
#[derive(Debug, Clone, Default)]
pub struct ArtifactBundler;

impl ArtifactBundler {
    pub fn new() -> Self {
        Self
    }

    /// Bundle artifacts in the given order.
    ///
    /// Entry names are the artifacts' sanitized filenames; two artifacts with
    /// the same name are rejected rather than overwriting one another.
    pub fn bundle(&self, artifacts: &[FileArtifact]) -> Result<Bundle, ArtifactError> {
        if artifacts.is_empty() {
            return Err(ArtifactError::EmptyBundle);
        }

        let mut seen = HashSet::new();
        for artifact in artifacts {
            if !seen.insert(artifact.name().as_str()) {
                return Err(ArtifactError::NameCollision {
                    name: artifact.name().to_string(),
                });
            }
        }

        // Fixed timestamp and mode keep the archive bytes reproducible
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(0o644);

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for artifact in artifacts {
            zip.start_file(artifact.name().as_str(), options)?;
            zip.write_all(artifact.bytes())
                .map_err(zip::result::ZipError::Io)?;
        }
        let bytes = zip.finish()?.into_inner();

        let digest = content_digest(&bytes);
        let name = sanitize_filename(&format!("bundle-{}.zip", &digest[..12]))
            .ok_or(ArtifactError::MissingFilename)?;

        tracing::debug!(
            entries = artifacts.len(),
            size = bytes.len(),
            digest = %digest,
            "bundle created"
        );

        Ok(Bundle {
            name,
            bytes,
            digest,
            entries: artifacts.iter().map(|a| a.name().clone()).collect(),
        })
    }
}
