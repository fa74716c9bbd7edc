//! Pipeline driver: stage orchestration, timing, and result assembly.
//!
//! Owns the process-wide mutable state (the tile/mask cache, the
//! texture-configuration cache, and the fabric registry) and runs the
//! stage chain for one request:
//!
//! normalize -> quantize -> (edges + orientation in parallel) ->
//! textures -> composite -> background -> warnings -> PNG encode
//!
//! The edge and orientation stages share only an immutable borrow of
//! the quantized raster, so they run under [`rayon::join`]. Every
//! stage is timed; timings are logged as the stages complete (visible
//! even when a later stage fails) and returned in the result metadata.

use std::collections::HashMap;
use std::time::Instant;

use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::cache::TileMaskCache;
use crate::options::EmbroideryOptions;
use crate::texture::TextureCache;
use crate::types::{Dimensions, EmbroideryError, EmbroideryMeta, EmbroideryOutput, StageTimings};
use crate::warnings::WarningInputs;
use crate::{background, compose, edges, normalize, numeric, orientation, quantize, warnings};

/// The stylization pipeline and its caches.
///
/// Construct one per process and share it: the caches amortize tiled
/// sheets, orientation masks, and texture banks across requests. Tests
/// construct their own instance to get fresh caches.
pub struct Pipeline {
    sheets: TileMaskCache,
    textures: TextureCache,
    fabrics: HashMap<String, RgbaImage>,
}

impl Pipeline {
    /// Create a pipeline with empty caches and no registered fabrics.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sheets: TileMaskCache::new(),
            textures: TextureCache::new(),
            fabrics: HashMap::new(),
        }
    }

    /// Register a fabric raster under a name referenced by
    /// `background: {type: "fabric", name}`. Loading fabric assets
    /// from wherever they live is the embedding application's job.
    #[must_use]
    pub fn with_fabric(mut self, name: impl Into<String>, image: RgbaImage) -> Self {
        self.fabrics.insert(name.into(), image);
        self
    }

    /// Process one request: stylize `bytes` according to `options`.
    ///
    /// # Errors
    ///
    /// Returns [`EmbroideryError::InvalidInput`] for undecodable input
    /// and [`EmbroideryError::Internal`] when PNG encoding fails.
    /// Option validation happens earlier, at
    /// [`EmbroideryOptions::from_value`].
    pub fn process(
        &self,
        bytes: &[u8],
        mime: &str,
        options: &EmbroideryOptions,
    ) -> Result<EmbroideryOutput, EmbroideryError> {
        let total_start = Instant::now();
        let mut timings = StageTimings::default();

        let stage = Instant::now();
        let normalized = normalize::normalize(bytes, mime)?;
        timings.normalize_ms = elapsed_ms(stage);
        tracing::debug!(
            stage = "normalize",
            ms = timings.normalize_ms,
            width = normalized.width(),
            height = normalized.height(),
        );

        let stage = Instant::now();
        let quantized = quantize::quantize(&normalized, options.max_colors)?;
        timings.quantize_ms = elapsed_ms(stage);
        tracing::debug!(
            stage = "quantize",
            ms = timings.quantize_ms,
            palette = quantized.palette.len(),
            candidates = quantized.candidate_count,
        );

        let stage = Instant::now();
        let (edge_outcome, orientation_outcome) = rayon::join(
            || edges::detect(&quantized.image, options.thread_thickness, options.mode),
            || orientation::estimate(&quantized.image, options.orientation, options.mode),
        );
        timings.edges_orientation_parallel_ms = elapsed_ms(stage);
        tracing::debug!(
            stage = "edges+orientation",
            ms = timings.edges_orientation_parallel_ms,
            bins = orientation_outcome.bin_count,
        );

        let stage = Instant::now();
        let textures = self.textures.get(
            options.thread_thickness,
            options.hatch,
            options.density_scale,
        );
        timings.textures_ms = elapsed_ms(stage);
        tracing::debug!(stage = "textures", ms = timings.textures_ms);

        let stage = Instant::now();
        let mut composed = compose::composite(
            &quantized.image,
            &textures,
            &edge_outcome,
            &orientation_outcome,
            options,
            &self.sheets,
        );
        timings.composite_ms = elapsed_ms(stage);
        tracing::debug!(stage = "composite", ms = timings.composite_ms);

        let stage = Instant::now();
        if !options.preserve_transparency {
            composed = background::apply(&composed, options.background.as_ref(), &self.fabrics);
        }
        timings.background_ms = elapsed_ms(stage);
        tracing::debug!(stage = "background", ms = timings.background_ms);

        let alpha = numeric::extract_alpha(&normalized);
        let warning_list = warnings::analyze(&WarningInputs {
            alpha: &alpha,
            thickness: options.thread_thickness,
            edges: &edge_outcome.edge_map,
            max_colors: options.max_colors,
            candidate_count: quantized.candidate_count,
        });

        let output_bytes = encode_png(&composed)?;
        timings.total_ms = elapsed_ms(total_start);
        tracing::debug!(stage = "total", ms = timings.total_ms);

        Ok(EmbroideryOutput {
            output_bytes,
            output_mime: "image/png",
            meta: EmbroideryMeta {
                palette_size: quantized.palette.len(),
                palette: quantized.palette,
                original_size: Dimensions::of(&normalized),
                final_size: Dimensions::of(&composed),
                warnings: warning_list,
                timings,
            },
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, EmbroideryError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| EmbroideryError::Internal {
            stage: "encode",
            message: e.to_string(),
        })?;
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        encode_png(image).unwrap()
    }

    #[test]
    fn process_rejects_empty_input() {
        let pipeline = Pipeline::new();
        let err = pipeline
            .process(&[], "image/png", &EmbroideryOptions::default())
            .unwrap_err();
        assert!(matches!(err, EmbroideryError::InvalidInput(_)));
    }

    #[test]
    fn output_is_png_at_input_resolution() {
        let pipeline = Pipeline::new();
        let input = RgbaImage::from_pixel(50, 30, Rgba([90, 120, 200, 255]));
        let out = pipeline
            .process(&png_bytes(&input), "image/png", &EmbroideryOptions::default())
            .unwrap();
        assert_eq!(out.output_mime, "image/png");
        let decoded = image::load_from_memory(&out.output_bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 30));
        assert_eq!(
            out.meta.final_size,
            Dimensions {
                width: 50,
                height: 30
            }
        );
    }

    #[test]
    fn timings_cover_every_stage() {
        let pipeline = Pipeline::new();
        let input = RgbaImage::from_pixel(40, 40, Rgba([10, 200, 10, 255]));
        let out = pipeline
            .process(&png_bytes(&input), "image/png", &EmbroideryOptions::default())
            .unwrap();
        // Total is at least the sum-free lower bound of zero and is
        // populated; individual timings may legitimately round to 0ms.
        assert!(out.meta.timings.total_ms >= out.meta.timings.composite_ms);
    }

    #[test]
    fn fabric_registry_is_used_for_backgrounds() {
        let fabric = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let pipeline = Pipeline::new().with_fabric("linen", fabric);
        let input = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        let options = EmbroideryOptions {
            preserve_transparency: false,
            background: Some(crate::options::Background::Fabric {
                name: "linen".to_owned(),
            }),
            ..EmbroideryOptions::default()
        };
        let out = pipeline
            .process(&png_bytes(&input), "image/png", &options)
            .unwrap();
        let decoded = image::load_from_memory(&out.output_bytes).unwrap().to_rgba8();
        // Fully transparent input: the fabric shows through everywhere.
        assert_eq!(decoded.get_pixel(5, 5).0, [1, 2, 3, 255]);
    }
}
