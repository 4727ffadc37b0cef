//! Collision-safe output file naming
//!
//! Output files are named `<base>-<YYYY-MM-DD>.pdf`. When that name is
//! already taken a random token is inserted before the extension. There is
//! exactly one existence check per call; a second collision on a freshly
//! generated UUID is not guarded against.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Extension of every merged document
const OUTPUT_EXTENSION: &str = "pdf";

/// Source of the current calendar date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Source of unique tokens used to break name collisions
pub trait TokenSource: Send + Sync {
    fn token(&self) -> String;
}

/// Random v4 UUIDs in hyphenated form
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidTokens;

impl TokenSource for UuidTokens {
    fn token(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Builds output paths from a base name and today's date
pub struct FilenameGenerator {
    clock: Box<dyn Clock>,
    tokens: Box<dyn TokenSource>,
}

impl FilenameGenerator {
    /// Generator backed by the system clock and random UUIDs
    pub fn new() -> Self {
        Self::with_sources(SystemClock, UuidTokens)
    }

    /// Generator with injected clock and token source
    pub fn with_sources(clock: impl Clock + 'static, tokens: impl TokenSource + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            tokens: Box::new(tokens),
        }
    }

    /// Return a path in `output_dir` that does not currently exist
    pub fn make_unique_name(&self, base_name: &str, output_dir: &Path) -> PathBuf {
        let stem = format!("{}-{}", base_name, self.clock.today().format("%Y-%m-%d"));
        let candidate = output_dir.join(format!("{stem}.{OUTPUT_EXTENSION}"));

        if !candidate.exists() {
            return candidate;
        }

        let token = self.tokens.token();
        output_dir.join(format!("{stem}-{token}.{OUTPUT_EXTENSION}"))
    }
}

impl Default for FilenameGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilenameGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilenameGenerator")
            .field("today", &self.clock.today())
            .finish_non_exhaustive()
    }
}
