//! Show daemon status and pending files

use anyhow::Result;
use cli_lib::{locks, util};
use owo_colors::OwoColorize;
use scan_core::MergeEngine;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    // 1. Daemon
    let state_dir = util::state_dir()?;
    let pid = locks::read_pid(&state_dir);

    println!("{}", "Scan Processor Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    print!("Daemon:        ");
    if pid.is_some() {
        println!("{}", "Running ✓".green());
        println!("  PID:         {}", util::format_pid(pid));
    } else {
        println!("{}", "Not running".yellow());
        println!("  {}", "Tip: Start with 'scanproc start'".dimmed());
    }
    println!();

    // 2. Effective configuration
    let config = match util::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("Config:        {}", "invalid".red());
            println!("  {:#}", e);
            return Ok(());
        }
    };

    println!("Scan dir:      {}", config.scan_directory.display().to_string().cyan());
    println!("Output dir:    {}", config.output_path.display().to_string().cyan());
    println!("Timeout:       {}s", config.timeout_secs);
    println!("Pattern:       {}", config.file_pattern);
    println!("Base name:     {}", config.default_output_base_name);
    println!();

    // 3. What the next flush would pick up
    let engine = MergeEngine::from_config(&config)?;
    match engine.pending_files() {
        Ok(files) if files.is_empty() => {
            println!("Pending:       {}", "none".dimmed());
        }
        Ok(files) => {
            println!("Pending:       {} files", files.len());
            for path in files.iter().take(5) {
                if let Some(name) = path.file_name() {
                    println!("    - {}", name.to_string_lossy());
                }
            }
            if files.len() > 5 {
                println!("    ... and {} more", files.len() - 5);
            }
        }
        Err(e) => {
            println!("Pending:       {} ({})", "unavailable".red(), e);
        }
    }

    Ok(())
}
