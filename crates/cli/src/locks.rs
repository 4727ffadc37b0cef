//! Lock file management for daemon exclusivity

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "scan-processor.lock";

/// Exclusive lock held by the running daemon
pub struct InstanceLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content
#[derive(Debug, Serialize, Deserialize)]
struct LockContent {
    pid: u32,
    started_at: u64,
}

impl InstanceLock {
    /// Acquire the instance lock in `state_dir`
    ///
    /// A held flock always belongs to a live process, so the file is never
    /// removed here. A leftover unlocked file is reused and overwritten.
    ///
    /// Returns error if:
    /// - Lock is already held by a running process
    /// - Permission denied
    pub fn acquire(state_dir: &Path) -> Result<Self> {
        let lock_path = lock_path(state_dir);

        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("Failed to create state directory {}", state_dir.display()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)
            .context("Failed to open lock file")?;

        if !try_flock_exclusive(&file)? {
            anyhow::bail!("Scan processor already running (lock file held by active process)");
        }

        Self::write_lock_content(&mut file)?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }

    /// Path of the held lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock
    pub fn release(self) -> Result<()> {
        // The flock goes with the file handle; the file itself is removed here
        std::fs::remove_file(&self.path).context("Failed to remove lock file")?;
        Ok(())
    }

    fn write_lock_content(file: &mut File) -> Result<()> {
        let content = LockContent {
            pid: std::process::id(),
            started_at: current_timestamp_ms(),
        };

        let serialized =
            serde_json::to_string(&content).context("Failed to serialize lock content")?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Lock file location inside a state directory
pub fn lock_path(state_dir: &Path) -> PathBuf {
    state_dir.join(LOCK_FILE)
}

/// Pid of the live process holding the lock, if any
///
/// A lock file left by a dead process reads as `None`.
pub fn read_pid(state_dir: &Path) -> Option<u32> {
    let mut file = File::open(lock_path(state_dir)).ok()?;
    let content = read_lock_content(&mut file).ok()?;

    is_process_alive(content.pid).then_some(content.pid)
}

/// Whether a live daemon holds the lock
pub fn is_held(state_dir: &Path) -> bool {
    read_pid(state_dir).is_some()
}

fn read_lock_content(file: &mut File) -> Result<LockContent> {
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    let content: LockContent =
        serde_json::from_str(&contents).context("Failed to deserialize lock content")?;
    Ok(content)
}

/// Try to acquire exclusive file lock (non-blocking)
#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(target_os = "macos")]
fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    // Null signal: existence check only
    match kill(Pid::from_raw(pid as i32), None::<Signal>) {
        Ok(_) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        Err(_) => true,
    }
}

#[cfg(target_os = "linux")]
fn is_process_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn is_process_alive(_pid: u32) -> bool {
    true
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
