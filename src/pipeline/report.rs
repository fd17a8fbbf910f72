//! Per-file processing outcome and the human-readable size report.

use std::path::PathBuf;

use {
    image::ImageFormat,
    tracing::{error, info},
};

/// Outcome of processing one candidate file. Reporting only, never
/// persisted.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    /// Source file the result refers to.
    pub source_path: PathBuf,
    /// Output file, present on success.
    pub output_path: Option<PathBuf>,
    /// Source size in bytes.
    pub original_size: u64,
    /// Output size in bytes, zero on failure.
    pub compressed_size: u64,
    /// Format the output was written in.
    pub format: Option<ImageFormat>,
    /// Whether processing completed.
    pub success: bool,
    /// Failure reason, present when `success` is false.
    pub error: Option<String>,
}

impl CompressionResult {
    /// Builds a successful result.
    pub fn completed(
        source_path: PathBuf,
        output_path: PathBuf,
        original_size: u64,
        compressed_size: u64,
        format: ImageFormat,
    ) -> Self {
        Self {
            source_path,
            output_path: Some(output_path),
            original_size,
            compressed_size,
            format: Some(format),
            success: true,
            error: None,
        }
    }

    /// Builds a failed result with a descriptive reason.
    pub fn failed(source_path: PathBuf, original_size: u64, error: String) -> Self {
        Self {
            source_path,
            output_path: None,
            original_size,
            compressed_size: 0,
            format: None,
            success: false,
            error: Some(error),
        }
    }

    /// Bytes saved by compression.
    pub fn saved_bytes(&self) -> u64 {
        self.original_size.saturating_sub(self.compressed_size)
    }

    /// Percentage of the original size saved.
    pub fn saved_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (self.saved_bytes() as f64 / self.original_size as f64) * 100.0
    }

    /// Logs one report line per outcome, success or failure.
    pub fn log(&self) {
        if self.success {
            info!(
                "compressed {:?} -> {:?}: {} -> {} bytes, saved {} bytes ({:.1}%)",
                self.source_path,
                self.output_path.as_deref().unwrap_or(self.source_path.as_path()),
                format_bytes(self.original_size),
                format_bytes(self.compressed_size),
                format_bytes(self.saved_bytes()),
                self.saved_percent(),
            );
        } else {
            error!(
                "failed to process {:?}: {}",
                self.source_path,
                self.error.as_deref().unwrap_or("unknown error"),
            );
        }
    }
}

/// Formats a byte count with thousands separators.
pub fn format_bytes(bytes: u64) -> String {
    let digits = bytes.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(c);
    }
    formatted
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::ImageFormat;

    use crate::pipeline::report::{CompressionResult, format_bytes};

    #[test]
    fn test_format_bytes_thousands_separated() {
        assert_eq!(format_bytes(0), "0");
        assert_eq!(format_bytes(999), "999");
        assert_eq!(format_bytes(1_000), "1,000");
        assert_eq!(format_bytes(1_234_567), "1,234,567");
    }

    #[test]
    fn test_savings_computation() {
        let result = CompressionResult::completed(
            PathBuf::from("/src/shot.png"),
            PathBuf::from("/out/shot.webp"),
            1_000,
            250,
            ImageFormat::WebP,
        );
        assert_eq!(result.saved_bytes(), 750);
        assert!((result.saved_percent() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_result_carries_reason() {
        let result =
            CompressionResult::failed(PathBuf::from("/src/bad.jpg"), 123, "truncated".to_string());
        assert!(!result.success);
        assert_eq!(result.output_path, None);
        assert_eq!(result.error.as_deref(), Some("truncated"));
        assert_eq!(result.saved_percent(), 0.0);
    }
}
