//! Event filtering and debouncing.
//!
//! The filter is the gate between raw watch events and the pipeline: it
//! rejects non-image and hidden paths, guards against self-triggering on
//! the output directory, collapses duplicate events inside the debounce
//! window, and confirms write completion before a file becomes a
//! processing candidate.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use {
    async_channel::{Receiver, Sender},
    parking_lot::Mutex,
    tracing::{debug, info, warn},
};

use crate::{
    config::CompressionConfig,
    watcher::{WatchEvent, WatchKind},
};

mod stability;

/// Supported input image extensions.
const SUPPORTED_INPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff"];

/// Filter behavior toggles.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Accepts a hidden file once it is renamed to a visible name,
    /// covering screenshot-style atomic saves. When off, such renames
    /// are rejected and only a plain create or modify of the visible
    /// name triggers processing.
    pub track_hidden_renames: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            track_hidden_renames: true,
        }
    }
}

/// A file accepted for processing: stable, image-like, not a duplicate.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Absolute path of the source file.
    pub path: PathBuf,
    /// Size observed by the stability check.
    pub size: u64,
    /// When the filter accepted the file.
    pub detected_at: Instant,
}

/// Filters and debounces watch events into [`CandidateFile`]s.
pub struct EventFilter {
    config: Arc<CompressionConfig>,
    options: FilterConfig,
    /// Recency map: path -> last acceptance time. Shared with the
    /// orchestrator, which stamps its own output writes.
    recency: Mutex<HashMap<PathBuf, Instant>>,
}

impl EventFilter {
    /// Creates a filter with default options.
    pub fn new(config: Arc<CompressionConfig>) -> Self {
        Self::with_options(config, FilterConfig::default())
    }

    /// Creates a filter with explicit options.
    pub fn with_options(config: Arc<CompressionConfig>, options: FilterConfig) -> Self {
        Self {
            config,
            options,
            recency: Mutex::new(HashMap::new()),
        }
    }

    /// Applies the rejection rules and the stability check to one event.
    ///
    /// Returns `Some(CandidateFile)` exactly once per stable write; every
    /// rejection is logged with its reason at debug level.
    pub async fn accept(&self, event: WatchEvent) -> Option<CandidateFile> {
        let path = event.path.clone();

        // Rule 1: only content-ready events.
        match &event.kind {
            WatchKind::Removed => {
                debug!("skipping removal event: {:?}", path);
                return None;
            }
            WatchKind::Renamed { from } => {
                if is_hidden(from) && !is_hidden(&path) {
                    if self.options.track_hidden_renames {
                        info!("hidden file renamed to visible: {:?}", path);
                    } else {
                        // Without rename tracking, surfacing from a hidden
                        // temp name is not a content-ready event.
                        debug!("skipping rename from hidden temp file: {:?}", path);
                        return None;
                    }
                }
            }
            WatchKind::Created | WatchKind::Modified => {}
        }

        // Rule 2: files only.
        if path.is_dir() {
            debug!("skipping directory: {:?}", path);
            return None;
        }

        // Rule 3: hidden files are in-progress writes, not candidates.
        // Their eventual rename to a visible name triggers acceptance.
        if is_hidden(&path) {
            debug!("skipping hidden file: {:?}", path);
            return None;
        }
        if self.options.track_hidden_renames
            && matches!(event.kind, WatchKind::Modified)
            && hidden_sibling_exists(&path)
        {
            info!("file became visible after hidden temp write: {:?}", path);
        }

        // Rule 4: supported image extensions only.
        if !is_supported_image(&path) {
            debug!("skipping non-image file: {:?}", path);
            return None;
        }

        // Rule 5: never re-ingest our own output.
        if path.starts_with(&self.config.compressed_dir) {
            debug!("skipping file inside output directory: {:?}", path);
            return None;
        }

        // Rule 6: collapse duplicates inside the debounce window.
        if self.is_duplicate(&path) {
            debug!("skipping duplicate event within debounce window: {:?}", path);
            return None;
        }

        let Some(size) = stability::wait_for_stable(
            &path,
            self.config.stability_delay,
            self.config.stability_retries,
        )
        .await
        else {
            warn!("file never stabilized, dropping: {:?}", path);
            return None;
        };

        self.mark_recent(&path);
        Some(CandidateFile {
            path,
            size,
            detected_at: Instant::now(),
        })
    }

    /// Filter loop: receive raw events, forward accepted candidates.
    ///
    /// Runs until either channel closes.
    pub async fn run(
        self: Arc<Self>,
        events: Receiver<WatchEvent>,
        candidates: Sender<CandidateFile>,
    ) {
        while let Ok(event) = events.recv().await {
            if let Some(candidate) = self.accept(event).await
                && candidates.send(candidate).await.is_err()
            {
                break;
            }
        }
    }

    /// Stamps a path into the recency map.
    ///
    /// The orchestrator calls this for files it writes, so the daemon
    /// never re-triggers on its own output.
    pub fn mark_recent(&self, path: &Path) {
        self.recency.lock().insert(path.to_path_buf(), Instant::now());
    }

    /// Checks the recency map, evicting entries older than the window.
    fn is_duplicate(&self, path: &Path) -> bool {
        let now = Instant::now();
        let window = self.config.debounce_window;
        let mut recent = self.recency.lock();
        recent.retain(|_, seen| now.duration_since(*seen) < window);
        recent.contains_key(path)
    }
}

/// Checks for a supported image extension, case-insensitively.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_INPUT_EXTENSIONS
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext))
        })
}

/// Checks for a leading-dot file name.
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Checks whether a hidden `.name` twin of `path` is still on disk,
/// the signature of an in-flight screenshot-style atomic save.
fn hidden_sibling_exists(path: &Path) -> bool {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
    else {
        return false;
    };
    parent.join(format!(".{name}")).exists()
}
