//! File name pattern matching
//!
//! The same pattern decides which watcher events qualify and which files a
//! flush picks up, so both sides share this type.

use crate::error::PatternError;
use globset::{GlobBuilder, GlobMatcher};
use std::ffi::OsStr;
use std::path::Path;

/// Case-sensitive glob matched against bare file names (e.g. `*.pdf`)
#[derive(Debug, Clone)]
pub struct FilePattern {
    raw: String,
    matcher: GlobMatcher,
}

impl FilePattern {
    /// Compile a glob pattern
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| PatternError {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            raw: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// Check a bare file name
    pub fn matches_name(&self, name: &OsStr) -> bool {
        self.matcher.is_match(Path::new(name))
    }

    /// Check the final component of a path
    ///
    /// Paths without a file name (`/`, `..`) never match.
    pub fn matches_path(&self, path: &Path) -> bool {
        path.file_name()
            .map_or(false, |name| self.matches_name(name))
    }

    /// The pattern as configured
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}
