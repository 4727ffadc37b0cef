//! Event qualification
//!
//! Only files created directly inside the watched root and matching the file
//! pattern qualify. Output written to a subdirectory of the root is rejected
//! here, which keeps merged documents from re-triggering a merge.

use crate::WatchEvent;
use scan_core::FilePattern;
use std::path::{Path, PathBuf};

/// Decides which watch events trigger the scheduler
#[derive(Debug, Clone)]
pub struct EventFilter {
    root: PathBuf,
    pattern: FilePattern,
}

impl EventFilter {
    pub fn new(root: impl Into<PathBuf>, pattern: FilePattern) -> Self {
        Self {
            root: root.into(),
            pattern,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True if the event should trigger a merge cycle
    pub fn accepts(&self, event: &WatchEvent) -> bool {
        if event.is_directory {
            return false;
        }

        // Exact parent equality: a prefix match would admit nested files
        if event.path.parent() != Some(self.root.as_path()) {
            return false;
        }

        self.pattern.matches_path(&event.path)
    }
}
