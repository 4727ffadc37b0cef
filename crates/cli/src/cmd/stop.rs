//! Stop the scan processor daemon

use anyhow::Result;
use cli_lib::{daemon, util};
use owo_colors::OwoColorize;
use std::time::Duration;

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn run() -> Result<()> {
    let state_dir = util::state_dir()?;

    if daemon::stop(&state_dir, STOP_TIMEOUT).await? {
        println!("{} Daemon stopped", "✓".green());
    } else {
        println!("{}", "Daemon is not running".yellow());
    }

    Ok(())
}
