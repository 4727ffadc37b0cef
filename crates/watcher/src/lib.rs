//! Directory watching for the scan processor
//!
//! This crate provides:
//! - A recursive notify subscription on the scan directory
//! - Filtering down to new files directly inside that directory
//! - A debounce scheduler that turns a burst of new files into one merge

pub mod debounce;
pub mod error;
pub mod filter;

pub use debounce::{DebounceScheduler, SchedulerState, TriggerHandle};
pub use error::{Result, WatcherError};
pub use filter::EventFilter;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use scan_core::FilePattern;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, error, info};

/// Filesystem event considered for triggering
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// Path the event refers to
    pub path: PathBuf,
    /// Whether the target is a directory
    pub is_directory: bool,
    /// When the event was received
    pub timestamp: SystemTime,
}

impl WatchEvent {
    /// Convert a notify event into the path it introduced, if any
    ///
    /// Creations and renames into a path qualify. Writes, removals and the
    /// source side of a rename do not.
    pub fn from_notify(event: &Event) -> Option<Self> {
        let path = match event.kind {
            EventKind::Create(_) => event.paths.first()?,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.first()?,
            // Both: [from, to]
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.last()?,
            _ => return None,
        };

        let is_directory = match event.kind {
            EventKind::Create(CreateKind::Folder) => true,
            EventKind::Create(CreateKind::File) => false,
            _ => path.is_dir(),
        };

        Some(Self {
            path: path.clone(),
            is_directory,
            timestamp: SystemTime::now(),
        })
    }
}

/// Watches one directory and triggers the scheduler for new files
pub struct DirectoryWatcher {
    root: PathBuf,
    watcher: Option<RecommendedWatcher>,
}

impl DirectoryWatcher {
    /// Subscribe to `root` and call `trigger` for every qualifying event
    pub fn start(root: &Path, pattern: FilePattern, trigger: TriggerHandle) -> Result<Self> {
        if !root.is_dir() {
            return Err(WatcherError::DirectoryNotFound(root.to_path_buf()));
        }

        // Event paths are reported canonicalized on some platforms
        let root = root.canonicalize()?;
        let filter = EventFilter::new(root.clone(), pattern);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => handle_event(&event, &filter, &trigger),
                Err(e) => error!("Watch error: {}", e),
            },
        )
        .map_err(|source| WatcherError::Subscription {
            path: root.clone(),
            source,
        })?;

        // Recursive so the boundary check in EventFilter is what rejects
        // nested files, on every backend
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|source| WatcherError::Subscription {
                path: root.clone(),
                source,
            })?;

        info!("Watching directory: {}", root.display());

        Ok(Self {
            root,
            watcher: Some(watcher),
        })
    }

    /// Canonical watched directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Release the subscription
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            let _ = watcher.unwatch(&self.root);
            info!("Stopped watching: {}", self.root.display());
        }
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_event(event: &Event, filter: &EventFilter, trigger: &TriggerHandle) {
    let Some(watch_event) = WatchEvent::from_notify(event) else {
        return;
    };

    if filter.accepts(&watch_event) {
        info!("The file {:?} has been created!", watch_event.path);
        trigger.trigger();
    } else {
        debug!("Ignoring event for {}", watch_event.path.display());
    }
}
