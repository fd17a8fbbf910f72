//! Error handling system using `thiserror` and `anyhow`.
//!
//! Domain enums give per-file and startup failures precise variants;
//! `anyhow` carries context at the binary boundary.

pub mod domain;

pub use domain::{CodecError, ConfigError, PipelineError, Result, WatchError};
