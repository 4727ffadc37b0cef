//! Configuration management command
//!
//! Provides CLI interface to view and edit the scan processor configuration.

use anyhow::{Context, Result};
use cli_lib::util;
use owo_colors::OwoColorize;
use scan_core::config;
use std::path::{Path, PathBuf};

const KEYS: [&str; 5] = [
    "scan_directory",
    "output_path",
    "timeout_secs",
    "file_pattern",
    "default_output_base_name",
];

/// Config file the command operates on
fn target_path(config_path: Option<&Path>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => config::config_file_path().context("Could not determine config file path"),
    }
}

fn unknown_key(key: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Unknown config key: {}. Use 'scanproc config list' to see available keys.",
        key
    )
}

/// List all effective configuration values
pub async fn run_list(config_path: Option<&Path>) -> Result<()> {
    let config = util::load_config(config_path)?;
    let path = target_path(config_path)?;

    println!("{}", "Scan Processor Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), path.display().dimmed());

    println!(
        "  {} = {}",
        "scan_directory".cyan(),
        config.scan_directory.display()
    );
    println!("  {} = {}", "output_path".cyan(), config.output_path.display());
    println!(
        "  {} = {} {}",
        "timeout_secs".cyan(),
        config.timeout_secs,
        format!("({}s quiet period)", config.timeout_secs).dimmed()
    );
    println!("  {} = {}", "file_pattern".cyan(), config.file_pattern);
    println!(
        "  {} = {}",
        "default_output_base_name".cyan(),
        config.default_output_base_name
    );

    println!("\n{}", "Valid Ranges:".bold());
    println!("  timeout_secs: 1-3600");
    println!("  default_output_base_name: non-empty, no path separators");
    println!(
        "\n{}",
        format!("Environment overrides: {}_<KEY>", config::ENV_PREFIX).dimmed()
    );

    Ok(())
}

/// Get a single effective configuration value
pub async fn run_get(config_path: Option<&Path>, key: &str) -> Result<()> {
    let config = util::load_config(config_path)?;

    let value = match key {
        "scan_directory" => config.scan_directory.display().to_string(),
        "output_path" => config.output_path.display().to_string(),
        "timeout_secs" => config.timeout_secs.to_string(),
        "file_pattern" => config.file_pattern,
        "default_output_base_name" => config.default_output_base_name,
        _ => return Err(unknown_key(key)),
    };

    println!("{}", value);
    Ok(())
}

/// Set a value in the config file
///
/// The file may be incomplete while it is being built up key by key; it is
/// validated once both directories are present.
pub async fn run_set(config_path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let path = target_path(config_path)?;

    let mut table = if path.exists() {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        contents
            .parse::<toml::Table>()
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        toml::Table::new()
    };

    let parsed = match key {
        "timeout_secs" => {
            let secs: i64 = value
                .parse()
                .context("Invalid value: must be a positive integer")?;
            toml::Value::Integer(secs)
        }
        k if KEYS.contains(&k) => toml::Value::String(value.to_string()),
        _ => return Err(unknown_key(key)),
    };
    table.insert(key.to_string(), parsed);

    // Validate before saving once the file is complete
    if table.contains_key("scan_directory") && table.contains_key("output_path") {
        let candidate: scan_core::ScanConfig = toml::Value::Table(table.clone())
            .try_into()
            .context("Invalid configuration value")?;
        candidate.validate().context("Invalid configuration value")?;
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let contents = toml::to_string_pretty(&table).context("Failed to serialize config")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    println!(
        "{}",
        "Note: Restart daemon for changes to take effect (scanproc stop && scanproc start)"
            .yellow()
    );

    Ok(())
}

/// Show the config file path and optionally create it
pub async fn run_path(config_path: Option<&Path>, create: bool) -> Result<()> {
    let path = target_path(config_path)?;

    if create && !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        std::fs::write(&path, config::example_config())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} Created config file at: {}", "✓".green(), path.display());
        println!("{}", "Edit scan_directory and output_path before starting.".yellow());
    } else if path.exists() {
        println!("{}", path.display());
    } else {
        println!("{}", path.display());
        println!("{}", "File does not exist. Use --create to create it.".yellow());
    }

    Ok(())
}

/// Show example configuration
pub async fn run_example() -> Result<()> {
    println!("{}", config::example_config());
    Ok(())
}
