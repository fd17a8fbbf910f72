//! Daemon configuration loaded from environment variables.
//!
//! All tunables are read once at startup into an immutable
//! [`CompressionConfig`] that is passed to every component at construction
//! time, so the filter and policy stay unit-testable without touching the
//! process environment.

use std::{env::var, fs::create_dir_all, path::PathBuf, time::Duration};

use tracing::{info, warn};

use crate::error::domain::ConfigError;

/// Immutable process-wide configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionConfig {
    /// Directory watched for new or modified images.
    pub source_dir: PathBuf,
    /// Directory compressed copies are written to.
    pub compressed_dir: PathBuf,
    /// Codec quality parameter, 0-100.
    pub quality: u8,
    /// Forces lossless encoding where the target format supports it.
    pub lossless: bool,
    /// Forces WebP output regardless of source format.
    pub convert_to_webp: bool,
    /// Forces the polling watch strategy; `None` means auto-probe.
    pub force_poll: Option<bool>,
    /// Interval between directory re-listings for the poll strategy.
    pub poll_interval: Duration,
    /// Window during which repeated events for one path collapse into one.
    pub debounce_window: Duration,
    /// Maximum stability-check re-samples before a file is dropped.
    pub stability_retries: u32,
    /// Delay between two stability samples.
    pub stability_delay: Duration,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("/app/source"),
            compressed_dir: PathBuf::from("/app/compressed"),
            quality: 80,
            lossless: false,
            convert_to_webp: true,
            force_poll: None,
            poll_interval: Duration::from_millis(1000),
            debounce_window: Duration::from_millis(500),
            stability_retries: 5,
            stability_delay: Duration::from_millis(200),
        }
    }
}

impl CompressionConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any variable holds a malformed or
    /// out-of-range value. Malformed values are fatal rather than
    /// silently defaulted.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| var(name).ok())
    }

    /// Loads the configuration through an arbitrary lookup function.
    ///
    /// Used by `from_env` and by tests that must not mutate the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let quality = match lookup("COMPRESSION_QUALITY") {
            Some(raw) => parse_quality("COMPRESSION_QUALITY", &raw)?,
            None => defaults.quality,
        };

        let config = Self {
            source_dir: lookup("SOURCE_DIR").map_or(defaults.source_dir, PathBuf::from),
            compressed_dir: lookup("COMPRESSED_DIR").map_or(defaults.compressed_dir, PathBuf::from),
            quality,
            lossless: parse_bool_or("LOSSLESS", &lookup, defaults.lossless)?,
            convert_to_webp: parse_bool_or("CONVERT_TO_WEBP", &lookup, defaults.convert_to_webp)?,
            force_poll: match lookup("POLL_WATCHER") {
                Some(raw) => Some(parse_bool("POLL_WATCHER", &raw)?),
                None => None,
            },
            poll_interval: parse_millis_or("POLL_INTERVAL_MS", &lookup, defaults.poll_interval)?,
            debounce_window: parse_millis_or("DEBOUNCE_MS", &lookup, defaults.debounce_window)?,
            stability_retries: match lookup("STABILITY_RETRIES") {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    name: "STABILITY_RETRIES",
                    reason: format!("expected a non-negative integer, got {raw:?}"),
                })?,
                None => defaults.stability_retries,
            },
            stability_delay: parse_millis_or("STABILITY_DELAY_MS", &lookup, defaults.stability_delay)?,
        };

        Ok(config)
    }

    /// Creates the source and output directories if absent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if either directory cannot be created.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        for path in [&self.source_dir, &self.compressed_dir] {
            create_dir_all(path).map_err(|source| ConfigError::DirectoryCreate {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Logs the startup banner with the active configuration.
    ///
    /// Also warns about the lossless/quality conflict: in lossless mode
    /// the quality setting is ignored.
    pub fn log_banner(&self) {
        info!("=== image compression service started ===");
        info!("monitoring folder: {:?}", self.source_dir);
        info!("output folder: {:?}", self.compressed_dir);
        info!("compression quality: {}", self.quality);
        info!("lossless compression: {}", self.lossless);
        info!("convert to WebP: {}", self.convert_to_webp);

        if self.lossless && self.quality < 100 {
            warn!(
                "configuration conflict: LOSSLESS=true ignores COMPRESSION_QUALITY={}",
                self.quality
            );
        }
    }
}

/// Parses the 0-100 quality value.
fn parse_quality(name: &'static str, raw: &str) -> Result<u8, ConfigError> {
    let value: u8 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        reason: format!("expected an integer between 0 and 100, got {raw:?}"),
    })?;
    if value > 100 {
        return Err(ConfigError::InvalidValue {
            name,
            reason: format!("quality {value} is out of range 0-100"),
        });
    }
    Ok(value)
}

/// Parses a boolean accepting `true/false/1/0`, case-insensitively.
fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            reason: format!("expected true/false/1/0, got {raw:?}"),
        }),
    }
}

fn parse_bool_or(
    name: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(name) {
        Some(raw) => parse_bool(name, &raw),
        None => Ok(default),
    }
}

fn parse_millis_or(
    name: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(name) {
        Some(raw) => {
            let millis: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name,
                reason: format!("expected milliseconds as a non-negative integer, got {raw:?}"),
            })?;
            Ok(Duration::from_millis(millis))
        }
        None => Ok(default),
    }
}
