//! Imgpress - watched-directory image compression daemon.
//!
//! Watches a source directory for newly created or modified images and
//! writes a size-optimized copy into an output directory, optionally
//! converting to WebP. Built around an event-driven core: a
//! strategy-selected watcher feeds normalized events through a filtering
//! debouncer into a pipeline with per-file error isolation.

pub mod codec;
pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod watcher;

// Re-export key types for convenience
pub use {
    config::CompressionConfig,
    error::{CodecError, ConfigError, PipelineError, WatchError},
    filter::{CandidateFile, EventFilter},
    pipeline::{CompressionResult, Orchestrator},
    watcher::{DirectoryWatcher, WatchEvent, WatchKind, WatcherConfig},
};
