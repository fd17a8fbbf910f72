//! Pipeline orchestrator.
//!
//! Ties watcher output to the codec and policy, and owns the defining
//! property of this component: error isolation per file. Every failure
//! becomes a failed [`CompressionResult`], and the watch loop keeps
//! running regardless of any single file's fate.

use std::{
    fs::{read, remove_file, rename, write},
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    async_channel::Receiver,
    image::ImageFormat,
    tracing::{debug, info},
};

use crate::{
    codec,
    config::CompressionConfig,
    error::domain::PipelineError,
    filter::{CandidateFile, EventFilter},
};

pub mod policy;
pub mod report;

pub use report::CompressionResult;

/// Drives candidates through read -> decode -> policy -> encode -> write.
pub struct Orchestrator {
    config: Arc<CompressionConfig>,
    /// Shared with the filter so output writes are stamped into the
    /// recency map and never re-trigger the pipeline.
    filter: Arc<EventFilter>,
}

impl Orchestrator {
    /// Creates an orchestrator sharing the filter's recency state.
    pub fn new(config: Arc<CompressionConfig>, filter: Arc<EventFilter>) -> Self {
        Self { config, filter }
    }

    /// Processes one candidate, never letting an error escape.
    ///
    /// Failures are converted into a failed result with a descriptive
    /// reason; no partial output file is left visible.
    pub fn process(&self, candidate: &CandidateFile) -> CompressionResult {
        match self.try_process(candidate) {
            Ok(result) => result,
            Err(e) => {
                CompressionResult::failed(candidate.path.clone(), candidate.size, e.to_string())
            }
        }
    }

    fn try_process(&self, candidate: &CandidateFile) -> Result<CompressionResult, PipelineError> {
        let bytes = read(&candidate.path)?;
        let original_size = bytes.len() as u64;

        let decoded = codec::decode(&bytes)?;
        debug!(
            "decoded {:?}: {}x{}, {:?}, {:?}",
            candidate.path,
            decoded.image.width(),
            decoded.image.height(),
            decoded.image.color(),
            decoded.format,
        );

        let decision = policy::decide_with_size(decoded.format, &self.config, original_size);
        let output_path = self.output_path(&candidate.path, decoded.format, decision.target);

        let encoded = codec::encode(&decoded.image, decision.target, &decision.params)?;

        // Keep the smaller file: if the encode inflated, pass the source
        // bytes through unchanged.
        let final_bytes = if encoded.len() as u64 >= original_size {
            info!(
                "encoded output larger than source, keeping original bytes: {:?}",
                candidate.path
            );
            &bytes
        } else {
            &encoded
        };

        self.write_atomic(&output_path, final_bytes)?;
        self.filter.mark_recent(&output_path);

        Ok(CompressionResult::completed(
            candidate.path.clone(),
            output_path,
            original_size,
            final_bytes.len() as u64,
            decision.target,
        ))
    }

    /// Computes the output path: same base name, target extension when
    /// the format changed, original extension when it did not.
    fn output_path(&self, source: &Path, source_format: ImageFormat, target: ImageFormat) -> PathBuf {
        let name = if target == source_format {
            source.file_name().unwrap_or_default().to_os_string()
        } else {
            let stem = source.file_stem().unwrap_or_default().to_string_lossy();
            let ext = target.extensions_str().first().copied().unwrap_or("bin");
            format!("{stem}.{ext}").into()
        };
        self.config.compressed_dir.join(name)
    }

    /// Write-temp-then-rename so no partial file is ever visible under
    /// its final name. Collisions overwrite, last-write-wins.
    fn write_atomic(&self, output: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
        let temp_name = format!(
            ".{}.tmp",
            output.file_name().unwrap_or_default().to_string_lossy()
        );
        let temp_path = self.config.compressed_dir.join(temp_name);

        if let Err(e) = write(&temp_path, bytes).and_then(|()| rename(&temp_path, output)) {
            // Disk-full or permission failure must not leave a temp file.
            let _ = remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Pipeline loop: process candidates serially, one file at a time,
    /// logging each outcome. Runs until the channel closes.
    pub async fn run(self, candidates: Receiver<CandidateFile>) {
        while let Ok(candidate) = candidates.recv().await {
            let result = self.process(&candidate);
            result.log();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs::{read_dir, write},
        sync::Arc,
        time::{Duration, Instant},
    };

    use {
        image::{DynamicImage, ImageFormat, Rgba, RgbaImage},
        tempfile::TempDir,
    };

    use crate::{
        codec::{self, EncodeParams},
        config::CompressionConfig,
        filter::{CandidateFile, EventFilter},
        pipeline::Orchestrator,
    };

    fn test_setup(convert_to_webp: bool) -> (TempDir, Orchestrator) {
        let dir = TempDir::new().unwrap();
        let config = Arc::new(CompressionConfig {
            source_dir: dir.path().join("source"),
            compressed_dir: dir.path().join("compressed"),
            convert_to_webp,
            ..CompressionConfig::default()
        });
        config.ensure_directories().unwrap();
        let filter = Arc::new(EventFilter::new(config.clone()));
        (dir, Orchestrator::new(config, filter))
    }

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let buffer = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 3) as u8, (y * 5) as u8, ((x ^ y) * 7) as u8, 255])
        });
        codec::encode(
            &DynamicImage::ImageRgba8(buffer),
            ImageFormat::Png,
            &EncodeParams {
                quality: 80,
                lossless: false,
            },
        )
        .unwrap()
    }

    fn candidate_for(path: &std::path::Path, size: u64) -> CandidateFile {
        CandidateFile {
            path: path.to_path_buf(),
            size,
            detected_at: Instant::now(),
        }
    }

    #[test]
    fn test_png_converted_to_webp_with_same_base_name() {
        let (dir, orchestrator) = test_setup(true);
        let source = dir.path().join("source/shot.png");
        let bytes = png_fixture(64, 64);
        write(&source, &bytes).unwrap();

        let result = orchestrator.process(&candidate_for(&source, bytes.len() as u64));
        assert!(result.success, "{:?}", result.error);

        let output = dir.path().join("compressed/shot.webp");
        assert_eq!(result.output_path.as_deref(), Some(output.as_path()));
        assert!(output.is_file());
        assert_eq!(result.format, Some(ImageFormat::WebP));
        // Keep-the-smaller-file guarantees the output never inflates.
        assert!(result.compressed_size <= result.original_size);
    }

    #[test]
    fn test_extension_kept_when_format_unchanged() {
        let (dir, orchestrator) = test_setup(false);
        let source = dir.path().join("source/photo.PNG");
        let bytes = png_fixture(16, 16);
        write(&source, &bytes).unwrap();

        let result = orchestrator.process(&candidate_for(&source, bytes.len() as u64));
        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.output_path.as_deref(),
            Some(dir.path().join("compressed/photo.PNG").as_path())
        );
    }

    #[test]
    fn test_corrupt_image_fails_without_output_or_temp_litter() {
        let (dir, orchestrator) = test_setup(true);
        let source = dir.path().join("source/broken.jpg");
        write(&source, b"\xff\xd8\xff\xe0 truncated junk").unwrap();

        let result = orchestrator.process(&candidate_for(&source, 23));
        assert!(!result.success);
        assert!(result.error.is_some());

        let leftovers: Vec<_> = read_dir(dir.path().join("compressed")).unwrap().collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn test_failure_does_not_poison_later_files() {
        let (dir, orchestrator) = test_setup(true);
        let broken = dir.path().join("source/broken.png");
        write(&broken, b"not a png").unwrap();
        let result = orchestrator.process(&candidate_for(&broken, 9));
        assert!(!result.success);

        let valid = dir.path().join("source/valid.png");
        let bytes = png_fixture(32, 32);
        write(&valid, &bytes).unwrap();
        let result = orchestrator.process(&candidate_for(&valid, bytes.len() as u64));
        assert!(result.success, "{:?}", result.error);
    }

    #[test]
    fn test_name_collision_overwrites() {
        let (dir, orchestrator) = test_setup(true);
        let source = dir.path().join("source/same.png");
        let bytes = png_fixture(24, 24);
        write(&source, &bytes).unwrap();

        let candidate = candidate_for(&source, bytes.len() as u64);
        assert!(orchestrator.process(&candidate).success);
        assert!(orchestrator.process(&candidate).success);

        let outputs: Vec<_> = read_dir(dir.path().join("compressed")).unwrap().collect();
        assert_eq!(outputs.len(), 1);
    }

    #[tokio::test]
    async fn test_output_is_stamped_into_recency_map() {
        let (dir, orchestrator) = test_setup(true);
        let source = dir.path().join("source/loop.png");
        let bytes = png_fixture(16, 16);
        write(&source, &bytes).unwrap();

        let filter = orchestrator.filter.clone();
        let result = orchestrator.process(&candidate_for(&source, bytes.len() as u64));
        let output = result.output_path.unwrap();

        // A watch event for our own fresh output must be rejected.
        let event = crate::watcher::WatchEvent::new(output, crate::watcher::WatchKind::Created);
        assert!(filter.accept(event).await.is_none());
    }

    #[test]
    fn test_missing_source_reported_not_thrown() {
        let (dir, orchestrator) = test_setup(true);
        let ghost = dir.path().join("source/ghost.png");
        let result = orchestrator.process(&candidate_for(&ghost, 0));
        assert!(!result.success);
    }
}
