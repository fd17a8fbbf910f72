//! Normalized file system event definitions.

use std::{path::PathBuf, time::Instant};

/// What happened to the path carried by a [`WatchEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchKind {
    /// A file appeared.
    Created,
    /// An existing file's contents changed.
    Modified,
    /// A file disappeared.
    Removed,
    /// A file was renamed or moved within the watched directory.
    Renamed {
        /// Path the file previously had.
        from: PathBuf,
    },
}

/// A single normalized file system event.
///
/// Both watch strategies produce this shape, so everything downstream of
/// the watcher is strategy-agnostic.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// Path the event refers to. For renames this is the destination.
    pub path: PathBuf,
    /// Kind of change observed.
    pub kind: WatchKind,
    /// When the event was observed by the watcher.
    pub observed_at: Instant,
}

impl WatchEvent {
    /// Creates an event observed now.
    pub fn new(path: PathBuf, kind: WatchKind) -> Self {
        Self {
            path,
            kind,
            observed_at: Instant::now(),
        }
    }
}
