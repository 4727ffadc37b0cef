//! Merge pending files immediately

use anyhow::{Context, Result};
use cli_lib::{daemon, util, InstanceLock};
use scan_core::MergeEngine;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = util::load_config(config_path)?;
    let state_dir = util::state_dir()?;

    if daemon::is_running(&state_dir) {
        anyhow::bail!("Daemon is running; it merges on its own (stop it first to flush manually)");
    }

    // Held for the merge so a daemon start or a second flush cannot race it
    let lock = InstanceLock::acquire(&state_dir).context("Another flush is in progress")?;

    let engine = MergeEngine::from_config(&config).context("Invalid file pattern")?;
    let result = tokio::task::spawn_blocking(move || engine.run())
        .await
        .context("Merge task failed")?
        .context("Merge failed")?;

    lock.release()?;

    util::print_merge_result(&result);
    Ok(())
}
