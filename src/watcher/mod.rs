//! File system change detection.
//!
//! Wraps two interchangeable watch strategies behind one event shape:
//! a push strategy built on the `notify` crate, and a poll strategy that
//! periodically diffs directory listings. The strategy is selected once
//! at startup; everything downstream consumes [`WatchEvent`] values from
//! a bounded channel and never sees which backend produced them.

use std::{
    env::var_os,
    path::{Path, PathBuf},
};

use {
    async_channel::{Sender, TrySendError},
    notify::{
        Config, Error, ErrorKind, Event, RecommendedWatcher,
        RecursiveMode::{NonRecursive, Recursive},
        Watcher,
        event::{EventKind, ModifyKind, RenameMode},
    },
    tokio::task::JoinHandle,
    tracing::{debug, error, info, warn},
};

use crate::error::domain::WatchError;

mod config;
mod events;
mod poll;

pub use {
    config::WatcherConfig,
    events::{WatchEvent, WatchKind},
};

/// Which watch strategy a [`DirectoryWatcher`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStrategy {
    /// Native OS change notifications via `notify`.
    Push,
    /// Periodic directory re-listing.
    Poll,
}

/// Watches one directory and feeds normalized events into a channel.
///
/// Holds the backend alive; dropping the watcher stops it.
pub struct DirectoryWatcher {
    backend: WatchBackend,
}

enum WatchBackend {
    /// Holds the notify watcher alive for the lifetime of the watch.
    Push { _watcher: RecommendedWatcher },
    Poll { task: JoinHandle<()> },
}

impl DirectoryWatcher {
    /// Starts watching `dir`, sending events through `sender`.
    ///
    /// Must be called from within a tokio runtime (the poll strategy
    /// spawns its loop as a task).
    ///
    /// # Errors
    ///
    /// Returns `WatchError::MissingDirectory` if `dir` does not exist,
    /// or `WatchError::Backend` if the notify watcher cannot attach.
    pub fn start(
        dir: &Path,
        config: WatcherConfig,
        sender: Sender<WatchEvent>,
    ) -> Result<Self, WatchError> {
        if !dir.is_dir() {
            return Err(WatchError::MissingDirectory(dir.to_path_buf()));
        }

        let backend = match select_strategy(&config) {
            WatchStrategy::Poll => {
                info!("using polling watcher, interval {:?}", config.poll_interval);
                let task = tokio::spawn(poll::run(
                    dir.to_path_buf(),
                    config.poll_interval,
                    sender,
                ));
                WatchBackend::Poll { task }
            }
            WatchStrategy::Push => {
                info!("using native change notifications");
                let mut watcher = RecommendedWatcher::new(
                    move |res: Result<Event, Error>| {
                        Self::handle_raw_event(res, &sender);
                    },
                    Config::default(),
                )?;
                let mode = if config.recursive { Recursive } else { NonRecursive };
                watcher.watch(dir, mode)?;
                WatchBackend::Push { _watcher: watcher }
            }
        };

        debug!("started watching directory: {:?}", dir);
        Ok(Self { backend })
    }

    /// Handles raw events from the notify backend.
    fn handle_raw_event(res: Result<Event, Error>, sender: &Sender<WatchEvent>) {
        match res {
            Ok(event) => {
                debug!("raw file system event: {:?}", event);
                for normalized in normalize(&event) {
                    match sender.try_send(normalized) {
                        Ok(()) => {}
                        Err(TrySendError::Full(dropped)) => {
                            warn!("event channel full, dropping {:?}", dropped.path);
                        }
                        Err(TrySendError::Closed(_)) => {}
                    }
                }
            }
            Err(e) if watch_lost(&e) => {
                // The watched directory became unusable. Closing the
                // channel ends the downstream loops for this watch
                // without taking the process down.
                error!("watched directory unusable, stopping watch: {}", e);
                sender.close();
            }
            Err(e) => {
                error!("file system watcher error: {}", e);
            }
        }
    }
}

/// Classifies notify errors that mean the watch itself is gone, as
/// opposed to transient per-event failures.
fn watch_lost(error: &Error) -> bool {
    match &error.kind {
        ErrorKind::PathNotFound | ErrorKind::WatchNotFound => true,
        ErrorKind::Io(io) => io.kind() == std::io::ErrorKind::NotFound,
        _ => false,
    }
}

impl Drop for DirectoryWatcher {
    fn drop(&mut self) {
        if let WatchBackend::Poll { task } = &self.backend {
            task.abort();
        }
    }
}

/// Picks the watch strategy once at startup.
///
/// The poll strategy is forced when configured explicitly or when the
/// probe detects a containerized environment, where inotify semantics
/// over mounted volumes are known unreliable.
pub fn select_strategy(config: &WatcherConfig) -> WatchStrategy {
    let poll = config.force_poll.unwrap_or_else(push_unreliable);
    if poll { WatchStrategy::Poll } else { WatchStrategy::Push }
}

/// Probes for environments with unreliable push notifications.
fn push_unreliable() -> bool {
    Path::new("/.dockerenv").exists() || var_os("container").is_some()
}

/// Normalizes one notify event into zero or more [`WatchEvent`]s.
fn normalize(event: &Event) -> Vec<WatchEvent> {
    let mut normalized = Vec::new();
    match &event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                normalized.push(WatchEvent::new(path.clone(), WatchKind::Created));
            }
        }
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => {
            for path in &event.paths {
                normalized.push(WatchEvent::new(path.clone(), WatchKind::Modified));
            }
        }
        EventKind::Modify(ModifyKind::Name(mode)) => {
            normalized.extend(normalize_rename(*mode, &event.paths));
        }
        EventKind::Remove(_) => {
            for path in &event.paths {
                normalized.push(WatchEvent::new(path.clone(), WatchKind::Removed));
            }
        }
        kind => {
            debug!("ignoring event kind {:?}", kind);
        }
    }
    normalized
}

/// Normalizes rename events, which notify reports in several shapes.
fn normalize_rename(mode: RenameMode, paths: &[PathBuf]) -> Vec<WatchEvent> {
    match (mode, paths) {
        // Both sides in one event: emit a single Renamed at the destination.
        (RenameMode::Both, [from, to]) => vec![WatchEvent::new(
            to.clone(),
            WatchKind::Renamed { from: from.clone() },
        )],
        (RenameMode::To, paths) => paths
            .iter()
            .map(|p| WatchEvent::new(p.clone(), WatchKind::Created))
            .collect(),
        (RenameMode::From, paths) => paths
            .iter()
            .map(|p| WatchEvent::new(p.clone(), WatchKind::Removed))
            .collect(),
        (_, [from, to]) => vec![WatchEvent::new(
            to.clone(),
            WatchKind::Renamed { from: from.clone() },
        )],
        (mode, paths) => {
            debug!("unrecognized rename shape {:?} with {} paths", mode, paths.len());
            Vec::new()
        }
    }
}
