//! Daemon lifecycle management
//!
//! Wires the pipeline together:
//! watcher event -> filter -> scheduler trigger -> quiet period -> merge

use crate::locks::{self, InstanceLock};
use anyhow::{Context, Result};
use scan_core::{MergeEngine, ScanConfig};
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};
use watcher::{DebounceScheduler, DirectoryWatcher, SchedulerState};

/// Running watcher + scheduler pair
pub struct Daemon {
    watcher: DirectoryWatcher,
    scheduler: DebounceScheduler,
}

impl Daemon {
    /// Start watching with an engine built from `config`
    pub fn start(config: &ScanConfig) -> Result<Self> {
        let engine = MergeEngine::from_config(config).context("Invalid file pattern")?;
        Self::start_with_engine(config, engine)
    }

    /// Start watching with a prepared engine
    pub fn start_with_engine(config: &ScanConfig, engine: MergeEngine) -> Result<Self> {
        config.validate().context("Invalid configuration")?;
        let pattern = config.pattern().context("Invalid file pattern")?;

        // 1. Scheduler owns the engine; merges run on its thread
        let scheduler = DebounceScheduler::start(config.timeout(), move || flush(&engine))
            .context("Failed to start debounce scheduler")?;

        // 2. Watcher feeds the scheduler
        let watcher = DirectoryWatcher::start(&config.scan_directory, pattern, scheduler.handle())
            .with_context(|| {
                format!("Failed to watch {}", config.scan_directory.display())
            })?;

        info!(
            "Scan processor started (dir: {}, output: {}, timeout: {}s, pattern: {})",
            watcher.root().display(),
            config.output_path.display(),
            config.timeout_secs,
            config.file_pattern
        );

        Ok(Self { watcher, scheduler })
    }

    /// Current scheduler state
    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Stop watching, let a running merge finish, drop any armed timer
    pub fn shutdown(mut self) {
        self.watcher.stop();
        self.scheduler.stop();
        info!("Scan processor stopped");
    }
}

/// Flush callback run by the scheduler
fn flush(engine: &MergeEngine) {
    match engine.run() {
        Ok(result) if result.is_empty() => {
            info!("Timer fired, no files to merge");
        }
        Ok(result) => {
            if let Some(output) = &result.output_path {
                info!(
                    "Merged {} files ({} pages) into {}",
                    result.files_merged,
                    result.total_pages,
                    output.display()
                );
            }
            if !result.failed_deletions.is_empty() {
                warn!(
                    "{} source files could not be deleted",
                    result.failed_deletions.len()
                );
            }
        }
        Err(e) => {
            error!("Merge failed: {}", e);
        }
    }
}

/// Run the daemon until Ctrl-C or SIGTERM
pub async fn run_foreground(config: &ScanConfig, state_dir: &Path) -> Result<()> {
    // 1. Exclusive instance
    let lock = InstanceLock::acquire(state_dir)?;

    // 2. Pipeline
    let daemon = Daemon::start(config)?;

    // 3. Block until asked to stop
    wait_for_shutdown().await?;
    info!("Shutdown signal received");

    // 4. Teardown; the lock goes last so `stop` sees a finished daemon
    tokio::task::spawn_blocking(move || daemon.shutdown())
        .await
        .context("Shutdown task failed")?;
    lock.release()?;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for Ctrl-C")?,
        _ = terminate.recv() => {}
    }

    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")
}

/// Send SIGTERM to the running daemon and wait for it to exit
pub async fn stop(state_dir: &Path, timeout: Duration) -> Result<bool> {
    let Some(pid) = locks::read_pid(state_dir) else {
        return Ok(false);
    };

    send_terminate(pid)?;

    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if !locks::is_held(state_dir) {
            return Ok(true);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    anyhow::bail!("Daemon (pid {}) did not stop within {:?}", pid, timeout)
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .with_context(|| format!("Failed to signal daemon (pid {})", pid))
}

#[cfg(not(unix))]
fn send_terminate(pid: u32) -> Result<()> {
    anyhow::bail!("Stopping the daemon (pid {}) is only supported on unix", pid)
}

/// Whether a daemon currently holds the instance lock
pub fn is_running(state_dir: &Path) -> bool {
    locks::is_held(state_dir)
}
