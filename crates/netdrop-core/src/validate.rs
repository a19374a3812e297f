//! Upload candidate validation
//!
//! The validator is the last check before staging and network cost is paid.
//! It sanitizes the submitted name and matches its suffix against the
//! configured extension policy.

use std::collections::BTreeSet;

use crate::error::ArtifactError;
use crate::fs::{SafeFileName, sanitize_filename};

/// Archive and executable extensions, rejected under every policy.
const ALWAYS_BLOCKED: &[&str] = &[
    "exe", "msi", "bat", "cmd", "com", "scr", "dll", "sh", "ps1", "jar", "apk", "zip", "rar",
    "7z", "tar", "gz", "tgz", "bz2", "xz",
];

/// Which file extensions may enter the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionPolicy {
    /// Only the listed suffixes (lowercase, without leading dot).
    Only(BTreeSet<String>),
    /// Anything except archives and executables.
    Any,
}

impl ExtensionPolicy {
    /// Build an allow-list policy, normalizing entries to lowercase without dots.
    pub fn only<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Only(
            extensions
                .into_iter()
                .map(|ext| {
                    ext.as_ref()
                        .trim()
                        .trim_start_matches('.')
                        .to_ascii_lowercase()
                })
                .filter(|ext| !ext.is_empty())
                .collect(),
        )
    }

    fn accepts(&self, name: &SafeFileName) -> bool {
        let lower = name.as_str().to_ascii_lowercase();
        if ALWAYS_BLOCKED.iter().any(|ext| has_suffix(&lower, ext)) {
            return false;
        }
        match self {
            Self::Only(allowed) => allowed.iter().any(|ext| has_suffix(&lower, ext)),
            Self::Any => name.extension().is_some(),
        }
    }
}

/// True for archive and executable extensions that no policy admits.
pub fn is_always_blocked(extension: &str) -> bool {
    let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    ALWAYS_BLOCKED
        .iter()
        .any(|blocked| ext == *blocked || ext.ends_with(&format!(".{blocked}")))
}

/// True when `name` ends in `.ext` and has a non-empty stem before it.
fn has_suffix(name: &str, ext: &str) -> bool {
    name.len() > ext.len() + 1
        && name.ends_with(ext)
        && name.as_bytes()[name.len() - ext.len() - 1] == b'.'
}

/// Decides whether a submitted filename is an acceptable upload candidate.
#[derive(Debug, Clone)]
pub struct FileValidator {
    policy: ExtensionPolicy,
}

impl FileValidator {
    pub fn new(policy: ExtensionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ExtensionPolicy {
        &self.policy
    }

    /// Validate a raw filename, returning its sanitized form on success.
    pub fn validate(&self, filename: Option<&str>) -> Result<SafeFileName, ArtifactError> {
        let raw = filename.ok_or(ArtifactError::MissingFilename)?;
        let name = sanitize_filename(raw).ok_or(ArtifactError::MissingFilename)?;

        if !self.policy.accepts(&name) {
            return Err(ArtifactError::UnsupportedExtension {
                name: name.into_string(),
            });
        }
        Ok(name)
    }
}
