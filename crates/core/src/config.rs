//! Scan processor configuration
//!
//! Values are layered, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML config file
//! 3. `SCAN_PROCESSOR_*` environment variables

use crate::error::{ConfigError, PatternError};
use crate::pattern::FilePattern;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides (`SCAN_PROCESSOR_TIMEOUT_SECS=5`)
pub const ENV_PREFIX: &str = "SCAN_PROCESSOR";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Configuration for one scan directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Directory the scanner writes pages into
    pub scan_directory: PathBuf,

    /// Directory merged documents are written to
    pub output_path: PathBuf,

    /// Quiet period after the last new file before merging
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Glob matched against file names in the scan directory
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Base name of merged documents (`<base>-<date>.pdf`)
    #[serde(default = "default_output_base_name")]
    pub default_output_base_name: String,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_file_pattern() -> String {
    "*.pdf".to_string()
}

fn default_output_base_name() -> String {
    "Merged".to_string()
}

impl ScanConfig {
    /// Create a config with default timeout, pattern and base name
    pub fn new(scan_directory: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            scan_directory: scan_directory.into(),
            output_path: output_path.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            file_pattern: default_file_pattern(),
            default_output_base_name: default_output_base_name(),
        }
    }

    /// Set the quiet period
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the file pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = pattern.into();
        self
    }

    /// Set the output base name
    pub fn with_base_name(mut self, name: impl Into<String>) -> Self {
        self.default_output_base_name = name.into();
        self
    }

    /// Quiet period as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Compile the file pattern
    pub fn pattern(&self) -> Result<FilePattern, PatternError> {
        FilePattern::new(&self.file_pattern)
    }

    /// Validate value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            return Err(ConfigError::Invalid(format!(
                "timeout_secs must be between {} and {}, got {}",
                MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS, self.timeout_secs
            )));
        }

        let base = self.default_output_base_name.trim();
        if base.is_empty() {
            return Err(ConfigError::Invalid(
                "default_output_base_name must not be empty".to_string(),
            ));
        }
        if base.contains('/') || base.contains('\\') {
            return Err(ConfigError::Invalid(format!(
                "default_output_base_name must not contain path separators: {}",
                base
            )));
        }

        if self.scan_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("scan_directory is not set".to_string()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_path is not set".to_string()));
        }
        // Output written straight into the scan directory would be picked up
        // as a new scan and merged again on every cycle
        if same_directory(&self.scan_directory, &self.output_path) {
            return Err(ConfigError::Invalid(format!(
                "output_path must differ from scan_directory (use a subdirectory such as {})",
                self.scan_directory.join("merged").display()
            )));
        }
        if self.output_path.is_file() {
            return Err(ConfigError::Invalid(format!(
                "output_path is a file: {}",
                self.output_path.display()
            )));
        }

        self.pattern()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(())
    }
}

/// Compare canonical paths when both exist, lexical paths otherwise
fn same_directory(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.components().eq(b.components()),
    }
}

/// Default config file location (`<config_dir>/scan-processor/config.toml`)
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("scan-processor").join("config.toml"))
}

/// Load and validate configuration
///
/// An explicit `path` must exist. Without one the default location is used
/// if present, so a config made only of environment variables also works.
pub fn load(path: Option<&Path>) -> Result<ScanConfig, ConfigError> {
    let (file, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (config_file_path().ok_or(ConfigError::NoConfigDir)?, false),
    };

    let settings = config::Config::builder()
        .add_source(config::File::from(file.as_path()).required(required))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?;

    let scan_config: ScanConfig = settings.try_deserialize()?;
    scan_config.validate()?;

    Ok(scan_config)
}

/// Write configuration as TOML, creating parent directories
pub fn save(config: &ScanConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;

    Ok(())
}

/// Annotated sample configuration
pub fn example_config() -> &'static str {
    r#"# Scan processor configuration

# Directory the scanner writes single-page PDFs into
scan_directory = "/home/user/ScanSnap"

# Directory merged documents are written to
# (may be a subdirectory of scan_directory; nested files are never picked up)
output_path = "/home/user/ScanSnap/merged"

# Seconds without a new page before the session is merged (1-3600)
timeout_secs = 10

# Glob matched against file names in scan_directory
file_pattern = "*.pdf"

# Merged files are named <base>-<YYYY-MM-DD>.pdf
default_output_base_name = "Merged"
"#
}
