//! Write-completion detection by bounded size re-sampling.

use std::{
    fs::{File, metadata},
    path::Path,
    time::Duration,
};

use {tokio::time::sleep, tracing::debug};

/// Waits until `path` has a stable size, returning it.
///
/// Samples the file length, sleeps `delay`, and re-samples. An unchanged
/// non-zero length with the file openable counts as a completed write;
/// a zero length is an empty placeholder whose contents have not arrived
/// yet, never a finished one. A changing or empty length is re-sampled
/// up to `retries` times; `None` means the file never settled or
/// vanished, and the caller drops it (a later Modified event gets
/// another chance).
pub(crate) async fn wait_for_stable(path: &Path, delay: Duration, retries: u32) -> Option<u64> {
    let mut last_len = metadata(path).ok()?.len();

    for attempt in 0..=retries {
        sleep(delay).await;

        let len = metadata(path).ok()?.len();
        if len == last_len && len > 0 {
            return File::open(path).is_ok().then_some(len);
        }

        debug!(
            "file {:?} still growing ({} -> {} bytes), attempt {}",
            path, last_len, len, attempt
        );
        last_len = len;
    }

    None
}
