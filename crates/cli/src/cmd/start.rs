//! Start the scan processor daemon

use anyhow::{Context, Result};
use cli_lib::{daemon, util};
use owo_colors::OwoColorize;
use std::path::Path;
use std::time::Duration;

pub async fn run(config_path: Option<&Path>, foreground: bool) -> Result<()> {
    // Fail fast on a bad config before forking anything
    let config = util::load_config(config_path)?;
    let state_dir = util::state_dir()?;

    if daemon::is_running(&state_dir) {
        anyhow::bail!("Daemon already running (see 'scanproc status')");
    }

    if foreground {
        daemon::run_foreground(&config, &state_dir).await
    } else {
        start_background(config_path, &state_dir).await
    }
}

async fn start_background(config_path: Option<&Path>, state_dir: &Path) -> Result<()> {
    use std::process::Command;

    let log_dir = state_dir.join("logs");
    std::fs::create_dir_all(&log_dir).context("Failed to create logs directory")?;
    let log_file = log_dir.join("daemon.log");

    let exe = std::env::current_exe().context("Failed to get current executable path")?;

    // nohup output goes to a separate file; tracing writes the daemon log
    let nohup_out = std::fs::File::create(log_dir.join("nohup.out"))
        .context("Failed to create nohup output file")?;

    let mut command = Command::new("nohup");
    command.arg(&exe);
    if let Some(path) = config_path {
        let path = path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", path.display()))?;
        command.arg("--config").arg(path);
    }
    command
        .arg("--log-file")
        .arg(&log_file)
        .arg("start")
        .arg("--foreground")
        .stdout(nohup_out.try_clone()?)
        .stderr(nohup_out)
        .spawn()
        .context("Failed to spawn daemon process")?;

    // Wait a moment to verify it started
    tokio::time::sleep(Duration::from_millis(500)).await;

    if daemon::is_running(state_dir) {
        println!("{} Daemon started", "✓".green());
        println!("Logs: {}", log_file.display());
        Ok(())
    } else {
        anyhow::bail!(
            "Daemon failed to start (check logs at {})",
            log_dir.display()
        );
    }
}
