//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use scan_core::{config, MergeResult, ScanConfig};
use std::path::{Path, PathBuf};

/// Overrides the state directory (lock file, daemon log)
pub const STATE_DIR_ENV: &str = "SCAN_PROCESSOR_STATE_DIR";

/// Directory holding the lock file and daemon log
///
/// `$SCAN_PROCESSOR_STATE_DIR` wins, then the platform state directory,
/// then the local data directory (macOS has no state dir).
pub fn state_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(STATE_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("scan-processor"))
        .context("Could not determine state directory")
}

/// Load and validate the effective configuration
pub fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    let source = match path {
        Some(path) => path.display().to_string(),
        None => config::config_file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "environment".to_string()),
    };

    config::load(path).with_context(|| format!("Failed to load configuration from {}", source))
}

/// Print a one-flush summary
pub fn print_merge_result(result: &MergeResult) {
    match &result.output_path {
        Some(output) => {
            println!(
                "{} Merged {} files ({} pages) into {}",
                "✓".green(),
                result.files_merged,
                result.total_pages,
                output.display().to_string().cyan()
            );
        }
        None => {
            println!("{}", "Nothing to merge".dimmed());
        }
    }

    for failure in &result.failed_deletions {
        println!(
            "{} Could not delete {}: {}",
            "!".yellow(),
            failure.path.display(),
            failure.error
        );
    }
}

/// Format a pid for display
pub fn format_pid(pid: Option<u32>) -> String {
    pid.map_or_else(|| "-".to_string(), |pid| pid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pid() {
        assert_eq!(format_pid(Some(42)), "42");
        assert_eq!(format_pid(None), "-");
    }

    #[test]
    fn test_load_config_reports_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");

        let err = load_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));
    }
}
