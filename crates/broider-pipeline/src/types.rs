//! Shared types for the broider stylization pipeline.

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// normalized input without depending on `image` directly.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of a raster.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// One palette entry, unique by its `(r, g, b, a)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaletteColor {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl PaletteColor {
    /// Create a palette entry from channel values.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// The opaque RGB triple of this entry.
    #[must_use]
    pub const fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Wall-clock duration of every pipeline stage, in whole milliseconds.
///
/// Field names match the wire format consumed by embedding
/// applications, hence the camelCase rename. The edge and orientation
/// stages run concurrently and share a single measurement covering the
/// parallel region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimings {
    /// Decode + fit-inside resize + alpha forcing.
    pub normalize_ms: u64,
    /// Palette extraction and full-resolution remap.
    pub quantize_ms: u64,
    /// Edge detection and orientation estimation (joined).
    pub edges_orientation_parallel_ms: u64,
    /// Thread tile bank and hatch synthesis (or cache hit).
    pub textures_ms: u64,
    /// Layer compositing.
    pub composite_ms: u64,
    /// Background compositing (zero when transparency is preserved).
    pub background_ms: u64,
    /// End-to-end wall clock including PNG encoding.
    pub total_ms: u64,
}

/// Result metadata: palette, sizes, quality warnings, and timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbroideryMeta {
    /// Number of colors in the final palette.
    pub palette_size: usize,
    /// The palette, most frequent color first.
    pub palette: Vec<PaletteColor>,
    /// Input dimensions after normalization.
    pub original_size: Dimensions,
    /// Output dimensions.
    pub final_size: Dimensions,
    /// Human-readable quality warnings, possibly empty.
    pub warnings: Vec<String>,
    /// Per-stage wall-clock timings.
    pub timings: StageTimings,
}

/// A fully processed request: PNG bytes plus metadata.
#[derive(Debug, Clone)]
pub struct EmbroideryOutput {
    /// PNG-encoded RGBA raster at input resolution.
    pub output_bytes: Vec<u8>,
    /// Always `"image/png"`.
    pub output_mime: &'static str,
    /// Palette, sizes, warnings, and timings.
    pub meta: EmbroideryMeta,
}

/// Errors that can occur while processing a request.
///
/// A missing fabric asset is deliberately *not* represented here: the
/// background stage recovers by falling back to the default solid
/// color without surfacing an error.
#[derive(Debug, thiserror::Error)]
pub enum EmbroideryError {
    /// The input bytes were empty, undecodable, or not an image.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An option carried a value outside its accepted enumeration.
    #[error("unsupported option: {0}")]
    UnsupportedOption(String),

    /// A codec or internal stage failure, tagged with the stage name.
    #[error("{stage} failed: {message}")]
    Internal {
        /// Pipeline stage that failed.
        stage: &'static str,
        /// Underlying failure description.
        message: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn palette_color_rgb_drops_alpha() {
        let c = PaletteColor::new(10, 20, 30, 40);
        assert_eq!(c.rgb(), [10, 20, 30]);
    }

    #[test]
    fn dimensions_of_raster() {
        let img = RgbaImage::new(17, 31);
        assert_eq!(
            Dimensions::of(&img),
            Dimensions {
                width: 17,
                height: 31
            }
        );
    }

    #[test]
    fn timings_serialize_camel_case() {
        let json = serde_json::to_value(StageTimings::default()).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "normalizeMs",
            "quantizeMs",
            "edgesOrientationParallelMs",
            "texturesMs",
            "compositeMs",
            "backgroundMs",
            "totalMs",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
    }

    #[test]
    fn meta_serde_round_trip() {
        let meta = EmbroideryMeta {
            palette_size: 2,
            palette: vec![
                PaletteColor::new(255, 0, 0, 255),
                PaletteColor::new(0, 0, 0, 255),
            ],
            original_size: Dimensions {
                width: 10,
                height: 20,
            },
            final_size: Dimensions {
                width: 10,
                height: 20,
            },
            warnings: vec!["Reduced colors to 2".to_owned()],
            timings: StageTimings::default(),
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: EmbroideryMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }

    #[test]
    fn error_display_messages() {
        assert_eq!(
            EmbroideryError::InvalidInput("empty image".to_owned()).to_string(),
            "invalid input: empty image",
        );
        assert_eq!(
            EmbroideryError::UnsupportedOption("unknown hatch \"weave\"".to_owned()).to_string(),
            "unsupported option: unknown hatch \"weave\"",
        );
        assert_eq!(
            EmbroideryError::Internal {
                stage: "encode",
                message: "boom".to_owned(),
            }
            .to_string(),
            "encode failed: boom",
        );
    }
}
