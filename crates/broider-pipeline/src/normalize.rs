//! Input normalization: decode, bound, and force RGBA.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) plus the declared
//! media type and produces the pipeline's working raster: RGBA, at
//! most 2000 pixels per side, fit-inside resized without enlargement.

use image::imageops::FilterType;
use image::RgbaImage;

use crate::types::EmbroideryError;

/// Longest side of a normalized raster.
pub const MAX_DIMENSION: u32 = 2000;

/// Decode and normalize the input raster.
///
/// The declared media type is only sanity-checked (it must be an
/// `image/*` type when present); the actual format is sniffed from the
/// bytes by the decoder.
///
/// # Errors
///
/// Returns [`EmbroideryError::InvalidInput`] for empty bytes, a
/// non-image media type, or undecodable data.
pub fn normalize(bytes: &[u8], mime: &str) -> Result<RgbaImage, EmbroideryError> {
    if bytes.is_empty() {
        return Err(EmbroideryError::InvalidInput("empty image".to_owned()));
    }
    if !mime.is_empty() && !mime.starts_with("image/") {
        return Err(EmbroideryError::InvalidInput(format!(
            "unsupported media type \"{mime}\""
        )));
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| EmbroideryError::InvalidInput(format!("failed to decode image: {e}")))?;

    let bounded = if decoded.width().max(decoded.height()) > MAX_DIMENSION {
        decoded.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Triangle)
    } else {
        decoded
    };

    Ok(bounded.to_rgba8())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{ExtendedColorType, ImageEncoder, Rgba};

    /// Encode an RGB (no alpha) raster as PNG bytes.
    fn rgb_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        encoder
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        buf
    }

    #[test]
    fn empty_input_is_invalid() {
        let err = normalize(&[], "image/png").unwrap_err();
        assert!(matches!(err, EmbroideryError::InvalidInput(ref s) if s == "empty image"));
    }

    #[test]
    fn non_image_mime_is_invalid() {
        let err = normalize(&[1, 2, 3], "text/plain").unwrap_err();
        assert!(matches!(err, EmbroideryError::InvalidInput(_)));
    }

    #[test]
    fn corrupt_bytes_are_invalid() {
        let err = normalize(&[0xFF, 0x00, 0x13], "image/png").unwrap_err();
        assert!(matches!(err, EmbroideryError::InvalidInput(_)));
    }

    #[test]
    fn alpha_is_forced_onto_rgb_input() {
        let normalized = normalize(&rgb_png(4, 4), "image/png").unwrap();
        for p in normalized.pixels() {
            assert_eq!(*p, Rgba([10, 20, 30, 255]));
        }
    }

    #[test]
    fn small_images_are_not_enlarged() {
        let normalized = normalize(&rgb_png(40, 30), "").unwrap();
        assert_eq!((normalized.width(), normalized.height()), (40, 30));
    }

    #[test]
    fn oversized_images_fit_inside_bound() {
        let normalized = normalize(&rgb_png(2400, 1200), "image/png").unwrap();
        assert_eq!(normalized.width(), MAX_DIMENSION);
        assert_eq!(normalized.height(), 1000);
    }
}
