//! Error types for the merge pipeline

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a single flush of the merge engine
///
/// None of these leave partial output behind: a flush either writes the
/// merged document and removes its sources, or returns one of these.
#[derive(Error, Debug)]
pub enum MergeError {
    /// The scan directory could not be listed
    #[error("failed to list source directory {}", path.display())]
    SourceListing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A candidate file could not be opened or its page tree parsed
    #[error("unreadable source {}: {reason}", path.display())]
    UnreadableSource { path: PathBuf, reason: String },

    /// The merged document could not be serialized
    #[error("failed to encode merged document: {0}")]
    OutputEncode(String),

    /// The merged document could not be written to the output location
    #[error("failed to write merged document to {}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Invalid glob in the configured file pattern
#[derive(Error, Debug)]
#[error("invalid file pattern '{pattern}'")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: globset::Error,
}

/// Errors raised while loading, validating or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Could not read or deserialize the configuration sources
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is present but out of range or malformed
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// No platform configuration directory is available
    #[error("could not determine configuration directory")]
    NoConfigDir,

    /// Serialization error
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
