//! broider-pipeline: image-to-embroidery stylization (sans-IO).
//!
//! Turns a raster image into one that resembles thread-stitched
//! embroidery through:
//! color quantization -> edge/contour extraction -> orientation
//! estimation -> thread/hatch texture synthesis -> multi-layer
//! compositing.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. HTTP ingress, worker
//! dispatch, and asset loading live in the embedding application.
//!
//! # Entry points
//!
//! [`Pipeline::process`] is the core operation: decoded-ish bytes in
//! (any format the `image` crate sniffs), PNG bytes plus
//! [`EmbroideryMeta`] out. [`process_embroidery`] is the convenience
//! wrapper over a process-wide pipeline, taking the options as a
//! free-form JSON record.
//!
//! # Determinism
//!
//! Processing is a pure function of `(bytes, mime, options)`: two
//! invocations return byte-identical PNG output. The caches only ever
//! hold values that are pure functions of their keys, so cache state
//! cannot leak into pixels.

pub mod background;
pub mod cache;
pub mod compose;
pub mod edges;
pub mod normalize;
pub mod numeric;
pub mod options;
pub mod orientation;
pub mod pipeline;
pub mod quantize;
pub mod texture;
pub mod types;
pub mod warnings;

use std::sync::OnceLock;

pub use cache::TileMaskCache;
pub use options::{Background, EdgeStyle, EmbroideryOptions, Hatch, Mode, OrientationMethod};
pub use pipeline::Pipeline;
pub use texture::{TextureCache, TextureSet};
pub use types::{
    Dimensions, EmbroideryError, EmbroideryMeta, EmbroideryOutput, GrayImage, PaletteColor,
    RgbaImage, StageTimings,
};

static DEFAULT_PIPELINE: OnceLock<Pipeline> = OnceLock::new();

/// Stylize an image using the process-wide pipeline.
///
/// `options` is the free-form record described in [`options`]: unknown
/// keys are ignored, unknown enumeration values are rejected, numeric
/// fields are clamped. Repeated calls share one [`Pipeline`] so tiled
/// sheets, masks, and texture banks are reused across requests.
///
/// # Errors
///
/// Returns [`EmbroideryError::InvalidInput`],
/// [`EmbroideryError::UnsupportedOption`], or
/// [`EmbroideryError::Internal`] as described on each variant.
pub fn process_embroidery(
    input_bytes: &[u8],
    input_mime: &str,
    options: &serde_json::Value,
) -> Result<EmbroideryOutput, EmbroideryError> {
    let options = EmbroideryOptions::from_value(options)?;
    DEFAULT_PIPELINE
        .get_or_init(Pipeline::new)
        .process(input_bytes, input_mime, &options)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{ExtendedColorType, ImageEncoder, Rgba};
    use serde_json::json;

    fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        encoder
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .unwrap();
        buf
    }

    fn decode(output: &EmbroideryOutput) -> RgbaImage {
        image::load_from_memory(&output.output_bytes)
            .unwrap()
            .to_rgba8()
    }

    // --- end-to-end scenarios ---

    #[test]
    fn solid_square_keeps_one_color_and_its_size() {
        let input = RgbaImage::from_pixel(100, 100, Rgba([255, 0, 0, 255]));
        let out = process_embroidery(
            &png_bytes(&input),
            "image/png",
            &json!({
                "maxColors": 4,
                "threadThickness": 2,
                "hatch": "diagonal",
                "preserveTransparency": true,
            }),
        )
        .unwrap();

        assert_eq!(out.meta.palette_size, 1);
        assert_eq!(out.meta.palette[0].rgb(), [255, 0, 0]);
        assert!(
            !out.meta.warnings.iter().any(|w| w.contains("Thin strokes")),
            "solid square must not warn about strokes: {:?}",
            out.meta.warnings,
        );
        let decoded = decode(&out);
        assert_eq!(decoded.dimensions(), (100, 100));
    }

    #[test]
    fn logo_circle_keeps_two_colors() {
        let input = RgbaImage::from_fn(800, 800, |x, y| {
            let dx = f64::from(x) - 400.0;
            let dy = f64::from(y) - 400.0;
            if dx.hypot(dy) < 250.0 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let out = process_embroidery(
            &png_bytes(&input),
            "image/png",
            &json!({
                "style": { "mode": "logo" },
                "maxColors": 2,
                "threadThickness": 3,
                "hatch": "none",
            }),
        )
        .unwrap();

        assert_eq!(out.meta.palette_size, 2);
        let rgbs: Vec<[u8; 3]> = out.meta.palette.iter().map(|c| c.rgb()).collect();
        assert!(rgbs.contains(&[0, 0, 0]));
        assert!(rgbs.contains(&[255, 255, 255]));
        assert_eq!(decode(&out).dimensions(), (800, 800));
    }

    #[test]
    fn transparent_diamond_preserves_input_alpha() {
        let input = RgbaImage::from_fn(500, 500, |x, y| {
            let dx = (i64::from(x) - 250).abs();
            let dy = (i64::from(y) - 250).abs();
            if dx + dy < 180 {
                Rgba([30, 90, 160, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let out = process_embroidery(
            &png_bytes(&input),
            "image/png",
            &json!({
                "preserveTransparency": true,
                "hatch": "cross",
                "threadThickness": 4,
            }),
        )
        .unwrap();

        let decoded = decode(&out);
        for (original, produced) in input.pixels().zip(decoded.pixels()) {
            assert_eq!(original.0[3], produced.0[3], "alpha not preserved");
        }
    }

    #[test]
    fn hairline_cross_warns_about_thin_strokes() {
        let input = RgbaImage::from_fn(200, 200, |x, y| {
            if x == y || x + y == 199 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let out = process_embroidery(
            &png_bytes(&input),
            "image/png",
            &json!({ "threadThickness": 4 }),
        )
        .unwrap();

        assert!(
            out.meta
                .warnings
                .contains(&"Thin strokes may not embroider cleanly".to_owned()),
            "got {:?}",
            out.meta.warnings,
        );
    }

    #[test]
    fn noisy_image_warns_about_dense_detail() {
        let mut rng = crate::numeric::SeededRng::new(7);
        let mut input = RgbaImage::new(400, 400);
        for pixel in input.pixels_mut() {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let v = (rng.next_f32() * 255.0) as u8;
            *pixel = Rgba([v, v.wrapping_mul(31), v.wrapping_add(97), 255]);
        }
        let out = process_embroidery(&png_bytes(&input), "image/png", &json!({})).unwrap();

        assert!(
            out.meta
                .warnings
                .contains(&"Dense detail may fill in on fabric".to_owned()),
            "got {:?}",
            out.meta.warnings,
        );
    }

    #[test]
    fn palette_clamp_warns_with_reduced_count() {
        // A smooth gradient has far more than 12 distinct bucketed colors.
        let input = RgbaImage::from_fn(300, 300, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
        });
        let out = process_embroidery(
            &png_bytes(&input),
            "image/png",
            &json!({ "maxColors": 6 }),
        )
        .unwrap();

        assert_eq!(out.meta.palette_size, 6);
        assert!(
            out.meta.warnings.contains(&"Reduced colors to 6".to_owned()),
            "got {:?}",
            out.meta.warnings,
        );
    }

    // --- contract properties ---

    #[test]
    fn processing_is_deterministic() {
        let input = RgbaImage::from_fn(120, 90, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Rgba([(x * 2) as u8, (y * 2) as u8, 120, 255])
        });
        let bytes = png_bytes(&input);
        let options = json!({ "maxColors": 5, "hatch": "cross" });

        let a = process_embroidery(&bytes, "image/png", &options).unwrap();
        let b = process_embroidery(&bytes, "image/png", &options).unwrap();
        assert_eq!(a.output_bytes, b.output_bytes, "output must be byte-identical");
        assert_eq!(a.meta.palette, b.meta.palette);
        assert_eq!(a.meta.warnings, b.meta.warnings);
    }

    #[test]
    fn quantized_base_respects_palette_closure() {
        // Every output pixel of the quantizer equals a palette RGB;
        // checked end-to-end through the crate surface.
        let input = RgbaImage::from_fn(64, 64, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Rgba([(x * 4) as u8, (y * 4) as u8, 60, 255])
        });
        let outcome = quantize::quantize(&input, 6).unwrap();
        assert!(outcome.palette.len() <= 6 && !outcome.palette.is_empty());
        let rgbs: Vec<[u8; 3]> = outcome.palette.iter().map(|c| c.rgb()).collect();
        for p in outcome.image.pixels() {
            assert!(rgbs.contains(&[p.0[0], p.0[1], p.0[2]]));
        }
    }

    #[test]
    fn unknown_enum_value_is_rejected_end_to_end() {
        let input = RgbaImage::from_pixel(10, 10, Rgba([1, 1, 1, 255]));
        let err = process_embroidery(
            &png_bytes(&input),
            "image/png",
            &json!({ "hatch": "basketweave" }),
        )
        .unwrap_err();
        assert!(matches!(err, EmbroideryError::UnsupportedOption(_)));
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        let err = process_embroidery(b"not an image", "image/png", &json!({})).unwrap_err();
        assert!(matches!(err, EmbroideryError::InvalidInput(_)));
    }

    #[test]
    fn background_color_fills_transparent_regions() {
        let input = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 0]));
        let out = process_embroidery(
            &png_bytes(&input),
            "image/png",
            &json!({
                "preserveTransparency": false,
                "background": { "type": "color", "hex": "#112233" },
            }),
        )
        .unwrap();
        let decoded = decode(&out);
        assert_eq!(decoded.get_pixel(10, 10).0, [0x11, 0x22, 0x33, 255]);
    }

    #[test]
    fn missing_fabric_falls_back_to_default_color() {
        let input = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 0]));
        let out = process_embroidery(
            &png_bytes(&input),
            "image/png",
            &json!({
                "preserveTransparency": false,
                "background": { "type": "fabric", "name": "no-such-fabric" },
            }),
        )
        .unwrap();
        let decoded = decode(&out);
        assert_eq!(decoded.get_pixel(10, 10).0, [0xE5, 0xE0, 0xD6, 255]);
    }

    #[test]
    fn oversized_input_is_normalized_before_processing() {
        let input = RgbaImage::from_pixel(2400, 600, Rgba([200, 10, 10, 255]));
        let out = process_embroidery(&png_bytes(&input), "image/png", &json!({})).unwrap();
        assert_eq!(
            out.meta.original_size,
            Dimensions {
                width: 2000,
                height: 500
            }
        );
        assert_eq!(out.meta.original_size, out.meta.final_size);
    }
}
