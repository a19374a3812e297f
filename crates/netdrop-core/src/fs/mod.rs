//! Filesystem primitives: filename sanitization and per-attempt staging.

pub mod sanitize;
pub mod staging;

pub use sanitize::{SafeFileName, sanitize_filename};
pub use staging::{StagedAttempt, StagingArea};
