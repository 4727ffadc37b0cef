//! Core merge pipeline for the scan processor
//!
//! This crate provides:
//! - Scan configuration (TOML file + environment overrides)
//! - File pattern matching shared by the watcher and the merger
//! - Collision-safe output naming
//! - The all-or-nothing PDF merge engine

pub mod config;
pub mod error;
pub mod merge;
pub mod naming;
pub mod pattern;

// Re-exports
pub use config::ScanConfig;
pub use error::{ConfigError, MergeError, PatternError};
pub use merge::{DeletionFailure, MergeEngine, MergeResult};
pub use naming::{Clock, FilenameGenerator, SystemClock, TokenSource, UuidTokens};
pub use pattern::FilePattern;

/// Result type for merge operations
pub type Result<T, E = MergeError> = std::result::Result<T, E>;
