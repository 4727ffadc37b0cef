//! Error types for the directory watcher

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for watcher operations
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Errors that can occur while starting the watcher or scheduler
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Watched directory is missing or not a directory
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The platform watcher could not subscribe to the directory
    #[error("failed to watch {}", path.display())]
    Subscription {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
