//! Polling watch strategy.
//!
//! Periodically re-lists the watched directory and diffs the listing
//! against the previous `{path -> (len, mtime)}` snapshot, synthesizing
//! the same [`WatchEvent`] shape the push strategy produces. Used where
//! native change notifications are unreliable, typically container
//! volume mounts.

use std::{
    collections::HashMap,
    fs::read_dir,
    io::{Error as IoError, ErrorKind::NotFound},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use {
    async_channel::{Sender, TrySendError},
    tokio::time::sleep,
    tracing::{debug, error, warn},
};

use crate::watcher::events::{WatchEvent, WatchKind};

/// Size and modification time of one directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

/// Last-seen state of the watched directory.
pub(crate) type Snapshot = HashMap<PathBuf, FileStamp>;

/// Lists regular files in `dir` with their current stamps.
pub(crate) fn take_snapshot(dir: &Path) -> Result<Snapshot, IoError> {
    let mut snapshot = Snapshot::new();
    for entry in read_dir(dir)? {
        let entry = entry?;
        // Entries can vanish between the listing and the stat.
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        snapshot.insert(
            entry.path(),
            FileStamp {
                len: metadata.len(),
                modified: metadata.modified().ok(),
            },
        );
    }
    Ok(snapshot)
}

/// Synthesizes events for the differences between two snapshots.
pub(crate) fn diff_snapshots(previous: &Snapshot, current: &Snapshot) -> Vec<WatchEvent> {
    let mut events = Vec::new();

    for (path, stamp) in current {
        match previous.get(path) {
            None => events.push(WatchEvent::new(path.clone(), WatchKind::Created)),
            Some(seen) if seen != stamp => {
                events.push(WatchEvent::new(path.clone(), WatchKind::Modified));
            }
            Some(_) => {}
        }
    }

    for path in previous.keys() {
        if !current.contains_key(path) {
            events.push(WatchEvent::new(path.clone(), WatchKind::Removed));
        }
    }

    events
}

/// Poll loop: re-list, diff, emit, sleep.
///
/// Runs until the event channel closes or the watched directory
/// disappears. Files already present when the loop starts form the
/// baseline and are not reported.
pub(crate) async fn run(dir: PathBuf, interval: Duration, sender: Sender<WatchEvent>) {
    let mut previous = match take_snapshot(&dir) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("failed to take initial snapshot of {:?}: {}", dir, e);
            return;
        }
    };

    loop {
        sleep(interval).await;

        let current = match take_snapshot(&dir) {
            Ok(snapshot) => snapshot,
            Err(e) if e.kind() == NotFound => {
                error!("watched directory {:?} disappeared, stopping watch", dir);
                return;
            }
            Err(e) => {
                warn!("failed to list {:?}: {}", dir, e);
                continue;
            }
        };

        for event in diff_snapshots(&previous, &current) {
            debug!("poll watcher event: {:?}", event);
            match sender.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    // The next tick re-detects the file.
                    warn!("event channel full, dropping {:?}", event.path);
                }
                Err(TrySendError::Closed(_)) => return,
            }
        }

        previous = current;
    }
}
