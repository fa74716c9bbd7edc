//! Local orientation estimation.
//!
//! Quantizes the dominant gradient direction at each pixel into bins
//! over the half-circle [0, π). The analysis runs on a nearest-neighbor
//! downscale (exact colors survive, which matters right after
//! quantization), then the bin map is upscaled back to input
//! resolution. A continuous angle field is kept at analysis resolution
//! for flow-style consumers.

use image::{GrayImage, RgbaImage};

use crate::numeric;
use crate::options::{Mode, OrientationMethod};
use crate::types::Dimensions;

/// Blur applied before gradient extraction. Lighter than the edge
/// detector's: orientation wants local direction, not denoised
/// contours.
const BLUR_SIGMA: f32 = 0.5;

/// Orientation estimation outputs.
#[derive(Debug, Clone)]
pub struct OrientationOutcome {
    /// Per-pixel bin indices in `[0, bin_count)`, input resolution.
    pub bins: GrayImage,
    /// Number of bins the estimator quantized into.
    pub bin_count: u8,
    /// Continuous angles in [0, π), row-major at analysis resolution.
    pub field: Vec<f32>,
    /// Dimensions of [`field`](Self::field).
    pub field_size: Dimensions,
}

/// Analysis raster bound for a mode.
const fn analysis_dimension(mode: Mode) -> u32 {
    match mode {
        Mode::Logo => 300,
        Mode::Photo => 400,
    }
}

/// Bin count for a method/mode pair. The `lic` method is an alias of
/// the binned estimator at a finer bin count.
const fn bin_count(method: OrientationMethod, mode: Mode) -> u8 {
    match (method, mode) {
        (OrientationMethod::Binned8, Mode::Logo) => 4,
        (OrientationMethod::Binned8, Mode::Photo) => 6,
        (OrientationMethod::Lic, Mode::Logo) => 8,
        (OrientationMethod::Lic, Mode::Photo) => 12,
    }
}

/// Estimate per-pixel orientation of `quantized`.
#[must_use = "returns the orientation outcome"]
pub fn estimate(quantized: &RgbaImage, method: OrientationMethod, mode: Mode) -> OrientationOutcome {
    let (width, height) = quantized.dimensions();
    let (aw, ah) = numeric::fit_inside(width, height, analysis_dimension(mode));

    let small = if (aw, ah) == (width, height) {
        quantized.clone()
    } else {
        image::imageops::resize(quantized, aw, ah, image::imageops::FilterType::Nearest)
    };

    let gray = numeric::to_grayscale(&small);
    let blurred = imageproc::filter::gaussian_blur_f32(&gray, BLUR_SIGMA);
    let (gx, gy) = numeric::sobel(&blurred);

    let n = bin_count(method, mode);
    let small_bins = numeric::bins_from_gradients(&gx, &gy, n);
    let bins = if (aw, ah) == (width, height) {
        small_bins
    } else {
        numeric::resize_nearest(&small_bins, width, height)
    };

    let field: Vec<f32> = gx
        .iter()
        .zip(gy.iter())
        .map(|(&h, &v)| numeric::fold_angle(f32::from(v), f32::from(h)))
        .collect();

    OrientationOutcome {
        bins,
        bin_count: n,
        field,
        field_size: Dimensions {
            width: aw,
            height: ah,
        },
    }
}
