//! Image codec adapter.
//!
//! Thin interface over the `image` and `webp` crates: decode arbitrary
//! supported bytes into a pixel buffer, encode a pixel buffer into a
//! target container. The `webp` crate covers lossy and lossless WebP
//! (the `image` crate's own WebP encoder is lossless-only).

use std::io::Cursor;

use {
    image::{
        DynamicImage, ExtendedColorType, ImageError, ImageFormat, ImageReader,
        codecs::jpeg::JpegEncoder,
    },
    webp::Encoder as WebpEncoder,
};

use crate::error::domain::CodecError;

/// Encoding parameters handed to the codec by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeParams {
    /// Codec quality, 0-100. Ignored by formats without a quality knob
    /// and in lossless mode.
    pub quality: u8,
    /// Lossless encoding where the target format supports it.
    pub lossless: bool,
}

/// A decoded image with its detected container format.
#[derive(Debug)]
pub struct DecodedImage {
    /// Decoded pixel buffer.
    pub image: DynamicImage,
    /// Container format the bytes were in.
    pub format: ImageFormat,
}

/// Decodes image bytes, guessing the container from content.
///
/// # Errors
///
/// Returns `CodecError::UnknownFormat` for unrecognizable bytes and
/// `CodecError::Decode` for corrupt or truncated images.
pub fn decode(bytes: &[u8]) -> Result<DecodedImage, CodecError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CodecError::Decode(ImageError::IoError(e)))?;
    let format = reader.format().ok_or(CodecError::UnknownFormat)?;
    let image = reader.decode()?;
    Ok(DecodedImage { image, format })
}

/// Encodes a pixel buffer into `target` with the given parameters.
///
/// Color-mode policy: buffers with transparency stay RGBA for
/// alpha-capable targets and are flattened to RGB for the rest. The
/// flattening drops the alpha channel deterministically, independent of
/// platform.
///
/// # Errors
///
/// Returns `CodecError::Encode` if the codec rejects the buffer and
/// `CodecError::UnsupportedTarget` for formats outside the output set.
pub fn encode(
    image: &DynamicImage,
    target: ImageFormat,
    params: &EncodeParams,
) -> Result<Vec<u8>, CodecError> {
    match target {
        ImageFormat::WebP => encode_webp(image, params),
        ImageFormat::Jpeg => encode_jpeg(image, params.quality),
        ImageFormat::Png | ImageFormat::Tiff | ImageFormat::Bmp => {
            encode_via_image_crate(image, target)
        }
        // The gif encoder wants RGBA frames.
        ImageFormat::Gif => {
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            encode_buffer(&rgba, target)
        }
        other => Err(CodecError::UnsupportedTarget(other)),
    }
}

/// Returns whether `format` can carry an alpha channel.
pub fn supports_alpha(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::WebP | ImageFormat::Png | ImageFormat::Tiff | ImageFormat::Gif
    )
}

fn encode_webp(image: &DynamicImage, params: &EncodeParams) -> Result<Vec<u8>, CodecError> {
    let memory = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        let encoder = WebpEncoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
        if params.lossless {
            encoder.encode_lossless()
        } else {
            encoder.encode(f32::from(params.quality))
        }
    } else {
        let rgb = image.to_rgb8();
        let encoder = WebpEncoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height());
        if params.lossless {
            encoder.encode_lossless()
        } else {
            encoder.encode(f32::from(params.quality))
        }
    };
    Ok(memory.to_vec())
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let rgb = image.to_rgb8();
    let mut buffer = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| CodecError::Encode {
            format: ImageFormat::Jpeg,
            reason: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}

/// Encodes through the `image` crate, applying the color-mode policy.
fn encode_via_image_crate(
    image: &DynamicImage,
    target: ImageFormat,
) -> Result<Vec<u8>, CodecError> {
    let buffer = if supports_alpha(target) && image.color().has_alpha() {
        DynamicImage::ImageRgba8(image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(image.to_rgb8())
    };
    encode_buffer(&buffer, target)
}

fn encode_buffer(image: &DynamicImage, target: ImageFormat) -> Result<Vec<u8>, CodecError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, target)
        .map_err(|e| CodecError::Encode {
            format: target,
            reason: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    use crate::codec::{EncodeParams, decode, encode, supports_alpha};

    fn gradient(width: u32, height: u32, alpha: u8) -> DynamicImage {
        let buffer = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 17) as u8, (y * 31) as u8, ((x + y) * 7) as u8, alpha])
        });
        DynamicImage::ImageRgba8(buffer)
    }

    const LOSSY: EncodeParams = EncodeParams {
        quality: 80,
        lossless: false,
    };

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"definitely not an image").is_err());
    }

    #[test]
    fn test_decode_rejects_truncated_image() {
        let png = encode(&gradient(8, 8, 255), ImageFormat::Png, &LOSSY).unwrap();
        assert!(decode(&png[..png.len() / 2]).is_err());
    }

    #[test]
    fn test_png_round_trip_preserves_dimensions_and_format() {
        let image = gradient(16, 9, 255);
        let bytes = encode(&image, ImageFormat::Png, &LOSSY).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.format, ImageFormat::Png);
        assert_eq!(decoded.image.width(), 16);
        assert_eq!(decoded.image.height(), 9);
    }

    #[test]
    fn test_webp_lossy_and_lossless_round_trip() {
        let image = gradient(24, 24, 255);
        for params in [
            LOSSY,
            EncodeParams {
                quality: 80,
                lossless: true,
            },
        ] {
            let bytes = encode(&image, ImageFormat::WebP, &params).unwrap();
            let decoded = decode(&bytes).unwrap();
            assert_eq!(decoded.format, ImageFormat::WebP);
            assert_eq!(decoded.image.width(), 24);
            assert_eq!(decoded.image.height(), 24);
        }
    }

    #[test]
    fn test_alpha_preserved_through_png() {
        let image = gradient(8, 8, 128);
        let bytes = encode(&image, ImageFormat::Png, &LOSSY).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert!(decoded.image.color().has_alpha());
    }

    #[test]
    fn test_alpha_flattened_for_jpeg() {
        let image = gradient(8, 8, 128);
        let bytes = encode(&image, ImageFormat::Jpeg, &LOSSY).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.format, ImageFormat::Jpeg);
        assert!(!decoded.image.color().has_alpha());
    }

    #[test]
    fn test_alpha_capability_table() {
        assert!(supports_alpha(ImageFormat::WebP));
        assert!(supports_alpha(ImageFormat::Png));
        assert!(!supports_alpha(ImageFormat::Jpeg));
        assert!(!supports_alpha(ImageFormat::Bmp));
    }
}
