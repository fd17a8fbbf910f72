//! Compression policy.
//!
//! A pure mapping from source format and configuration to the target
//! format and encoding parameters. No I/O, fully unit-testable.

use image::ImageFormat;

use crate::{codec::EncodeParams, config::CompressionConfig};

/// Quality cap applied to JPEG re-encodes of large sources.
const LARGE_JPEG_QUALITY_CAP: u8 = 85;

/// Source size above which the JPEG quality cap kicks in.
const LARGE_JPEG_THRESHOLD: u64 = 1024 * 1024;

/// Outcome of a policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Container format to encode to.
    pub target: ImageFormat,
    /// Parameters forwarded to the codec.
    pub params: EncodeParams,
}

/// Decides the target encoding for a source format.
///
/// `convert_to_webp` wins regardless of source format; otherwise the
/// source format is kept.
pub fn decide(source: ImageFormat, config: &CompressionConfig) -> Decision {
    decide_with_size(source, config, 0)
}

/// [`decide`], additionally capping JPEG quality for large sources.
///
/// Re-encoding a multi-megabyte JPEG at high quality routinely inflates
/// it, so sources over the threshold are capped at quality 85.
pub fn decide_with_size(
    source: ImageFormat,
    config: &CompressionConfig,
    source_len: u64,
) -> Decision {
    let target = if config.convert_to_webp {
        ImageFormat::WebP
    } else {
        source
    };

    let mut quality = config.quality;
    if target == ImageFormat::Jpeg && source_len > LARGE_JPEG_THRESHOLD {
        quality = quality.min(LARGE_JPEG_QUALITY_CAP);
    }

    Decision {
        target,
        params: EncodeParams {
            quality,
            lossless: config.lossless,
        },
    }
}

#[cfg(test)]
mod tests {
    use image::ImageFormat;

    use crate::{
        config::CompressionConfig,
        pipeline::policy::{decide, decide_with_size},
    };

    fn webp_config() -> CompressionConfig {
        CompressionConfig {
            convert_to_webp: true,
            quality: 80,
            ..CompressionConfig::default()
        }
    }

    fn preserve_config() -> CompressionConfig {
        CompressionConfig {
            convert_to_webp: false,
            quality: 95,
            ..CompressionConfig::default()
        }
    }

    #[test]
    fn test_convert_to_webp_wins_for_every_source_format() {
        let config = webp_config();
        for source in [
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::Gif,
            ImageFormat::Bmp,
            ImageFormat::Tiff,
        ] {
            let decision = decide(source, &config);
            assert_eq!(decision.target, ImageFormat::WebP);
            assert_eq!(decision.params.quality, 80);
        }
    }

    #[test]
    fn test_source_format_preserved_otherwise() {
        let config = preserve_config();
        assert_eq!(decide(ImageFormat::Png, &config).target, ImageFormat::Png);
        assert_eq!(decide(ImageFormat::Gif, &config).target, ImageFormat::Gif);
    }

    #[test]
    fn test_decide_is_idempotent() {
        let config = webp_config();
        let first = decide(ImageFormat::Jpeg, &config);
        let second = decide(ImageFormat::Jpeg, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_lossless_flag_forwarded() {
        let config = CompressionConfig {
            lossless: true,
            ..webp_config()
        };
        assert!(decide(ImageFormat::Png, &config).params.lossless);
    }

    #[test]
    fn test_large_jpeg_quality_capped() {
        let config = preserve_config();
        let large = decide_with_size(ImageFormat::Jpeg, &config, 2 * 1024 * 1024);
        assert_eq!(large.params.quality, 85);

        let small = decide_with_size(ImageFormat::Jpeg, &config, 100 * 1024);
        assert_eq!(small.params.quality, 95);

        // The cap is JPEG-specific.
        let webp = decide_with_size(ImageFormat::Jpeg, &webp_config(), 2 * 1024 * 1024);
        assert_eq!(webp.params.quality, 80);
    }
}
