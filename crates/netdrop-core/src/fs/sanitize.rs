//! Filename sanitization
//!
//! Filenames arrive from the chat transport and are untrusted. Every name
//! used on disk or in a request path goes through [`sanitize_filename`]
//! first, so a name like `../../etc/passwd` can never leave the staging
//! directory.

use std::fmt;

/// Longest name (in bytes) accepted on common filesystems.
const MAX_NAME_BYTES: usize = 255;

/// A single path component that is safe to join onto a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SafeFileName(String);

impl SafeFileName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Lowercased final extension, without the dot.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.0.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Display for SafeFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SafeFileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reduce an untrusted filename to a single safe path component.
///
/// - Directory components are dropped (both `/` and `\` separators)
/// - Control characters are removed
/// - Surrounding whitespace and leading dots are trimmed
/// - The result is capped at 255 bytes on a char boundary
///
/// Returns `None` when nothing usable remains.
pub fn sanitize_filename(raw: &str) -> Option<SafeFileName> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw);

    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let trimmed = cleaned.trim().trim_start_matches('.').trim();

    if trimmed.is_empty() {
        return None;
    }

    let mut name = trimmed.to_string();
    if name.len() > MAX_NAME_BYTES {
        let mut cut = MAX_NAME_BYTES;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }

    Some(SafeFileName(name))
}
