//! Configuration for watcher behavior.

use std::time::Duration;

use crate::config::CompressionConfig;

/// Configuration for watcher behavior.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Interval between directory re-listings for the poll strategy.
    pub poll_interval: Duration,
    /// Forces the poll strategy; `None` defers to the environment probe.
    pub force_poll: Option<bool>,
    /// Whether to descend into subdirectories.
    pub recursive: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            force_poll: None,
            recursive: false,
        }
    }
}

impl From<&CompressionConfig> for WatcherConfig {
    fn from(config: &CompressionConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            force_poll: config.force_poll,
            ..Self::default()
        }
    }
}
