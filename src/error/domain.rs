//! Domain-specific error types using `thiserror`.
//!
//! This module defines the error taxonomy for the daemon: configuration
//! and watch-setup errors are fatal, while codec and pipeline errors are
//! recovered per file and never escape the watch loop.

use std::{io::Error as IoError, path::PathBuf, result::Result as StdResult};

use {
    anyhow::Error,
    image::{ImageError, ImageFormat},
    notify::Error as NotifyError,
    thiserror::Error,
};

/// Configuration errors, fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be parsed or
    /// is out of range.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
    /// A source or output directory could not be created.
    #[error("failed to create directory {path:?}: {source}")]
    DirectoryCreate { path: PathBuf, source: IoError },
}

/// Watcher setup and backend errors, fatal for the watch.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The watched directory does not exist at startup.
    #[error("watched directory does not exist: {0:?}")]
    MissingDirectory(PathBuf),
    /// The notify backend failed to initialize or attach.
    #[error("watcher backend error: {0}")]
    Backend(#[from] NotifyError),
}

/// Image decode/encode errors, recovered per file.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The bytes are not a valid image in any supported format.
    #[error("failed to decode image: {0}")]
    Decode(#[from] ImageError),
    /// The image container format could not be recognized.
    #[error("unable to determine image format")]
    UnknownFormat,
    /// The codec could not produce the requested target format.
    #[error("failed to encode {format:?}: {reason}")]
    Encode { format: ImageFormat, reason: String },
    /// The target format is not in the supported output set.
    #[error("unsupported target format: {0:?}")]
    UnsupportedTarget(ImageFormat),
}

/// Per-file pipeline errors, caught at the orchestrator boundary.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Read or write failure on the source or output path.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
    /// Decode or encode failure from the codec adapter.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Operational error context propagation with `anyhow`.
///
/// Used at the binary boundary where rich context matters more than
/// variant matching.
pub type Result<T> = StdResult<T, Error>;
