//! Contour extraction and rim band construction.
//!
//! Edges come from a thresholded-Sobel chain over a downscaled
//! grayscale copy: blur, gradients, adaptive magnitude threshold, then
//! nearest-neighbor upscale back to input resolution. The dashed
//! variant simulates stitch segments along contours; the continuous
//! variant feeds the warning analyzer.
//!
//! The rim band marks a ring around the alpha silhouette where
//! perimeter stitches are placed: a box-count convolution of the
//! binary alpha flags pixels whose neighborhood is neither mostly
//! opaque nor mostly transparent.

use image::{GrayImage, Luma, RgbaImage};

use crate::numeric;
use crate::options::Mode;

/// Longest side of the edge analysis raster.
const ANALYSIS_MAX_DIMENSION: u32 = 600;
/// Blur applied before gradient extraction.
const BLUR_SIGMA: f32 = 1.0;

/// Edge detector outputs, all at input resolution.
#[derive(Debug, Clone)]
pub struct EdgeOutcome {
    /// Dashed contour overlay for the compositor.
    pub dashed: GrayImage,
    /// Continuous (undashed) contours for the warning analyzer.
    pub edge_map: GrayImage,
    /// Ring around the alpha silhouette for the rim stitch layer.
    pub rim_band: GrayImage,
}

/// Detect contours and the rim band of `quantized`.
///
/// `thickness` controls both the dash period and the rim ring width.
/// Logo mode lowers the magnitude threshold to keep the sparser edges
/// of flat-color artwork; photo mode raises it to reject texture
/// noise. A degenerate all-zero image produces all-zero outputs rather
/// than an error.
#[must_use = "returns the edge outcome"]
pub fn detect(quantized: &RgbaImage, thickness: u8, mode: Mode) -> EdgeOutcome {
    let (width, height) = quantized.dimensions();

    let gray = numeric::to_grayscale(quantized);
    let (aw, ah) = numeric::fit_inside(width, height, ANALYSIS_MAX_DIMENSION);
    let small = if (aw, ah) == (width, height) {
        gray
    } else {
        // Triangle smooths while shrinking, suppressing aliased edges.
        image::imageops::resize(&gray, aw, ah, image::imageops::FilterType::Triangle)
    };

    let blurred = imageproc::filter::gaussian_blur_f32(&small, BLUR_SIGMA);
    let (gx, gy) = numeric::sobel(&blurred);

    let mean = numeric::mean_magnitude(&gx, &gy);
    let tau = match mode {
        Mode::Logo => (0.6 * mean).max(8.0),
        Mode::Photo => (1.2 * mean).max(20.0),
    };

    let small_edges = numeric::magnitude_threshold(&gx, &gy, tau);
    let edge_map = if (aw, ah) == (width, height) {
        small_edges
    } else {
        numeric::resize_nearest(&small_edges, width, height)
    };

    let dashed = dash(&edge_map, thickness);
    let rim_band = rim_band(quantized, thickness);

    EdgeOutcome {
        dashed,
        edge_map,
        rim_band,
    }
}

/// Keep edge pixels only in alternating horizontal segments of length
/// `thickness`, simulating stitches along contours.
fn dash(edges: &GrayImage, thickness: u8) -> GrayImage {
    let period = u32::from(thickness.max(1));
    GrayImage::from_fn(edges.width(), edges.height(), |x, y| {
        let on = edges.get_pixel(x, y).0[0] != 0 && (x / period) % 2 == 0;
        Luma([if on { 255 } else { 0 }])
    })
}

/// Ring of width proportional to `thickness` around the alpha
/// boundary.
///
/// A square box of side `2·thickness + 1` counts opaque pixels around
/// each position. Windows clip at the canvas border, so a fully opaque
/// image still rims along the frame: the alpha transition sits just
/// off-canvas. A pixel is on the rim when the count is strictly
/// between 10% and 90% of the full box area.
fn rim_band(image: &RgbaImage, thickness: u8) -> GrayImage {
    let (width, height) = image.dimensions();
    let w = width as usize;
    let h = height as usize;
    let side = 2 * usize::from(thickness) + 1;
    let radius = usize::from(thickness);

    // Integral image over the binary alpha, one row/column of padding.
    let mut integral = vec![0u64; (w + 1) * (h + 1)];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            #[allow(clippy::cast_possible_truncation)]
            let opaque = u64::from(image.get_pixel(x as u32, y as u32).0[3] > 0);
            row_sum += opaque;
            integral[(y + 1) * (w + 1) + (x + 1)] = integral[y * (w + 1) + (x + 1)] + row_sum;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let full = (side * side) as f64;
    let low = full * 0.1;
    let high = full * 0.9;

    GrayImage::from_fn(width, height, |x, y| {
        let x = x as usize;
        let y = y as usize;
        let x0 = x.saturating_sub(radius);
        let y0 = y.saturating_sub(radius);
        let x1 = (x + radius + 1).min(w);
        let y1 = (y + radius + 1).min(h);
        let count = integral[y1 * (w + 1) + x1] + integral[y0 * (w + 1) + x0]
            - integral[y0 * (w + 1) + x1]
            - integral[y1 * (w + 1) + x0];
        #[allow(clippy::cast_precision_loss)]
        let v = count as f64;
        Luma([if v > low && v < high { 255 } else { 0 }])
    })
}
