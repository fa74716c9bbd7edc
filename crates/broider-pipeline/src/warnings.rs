//! Quality warnings for embroidery suitability.
//!
//! Inspects the request after compositing and appends human-readable
//! warnings: strokes too thin to stitch (interior distance-transform
//! minima), detail too dense for fabric (edge density), and palette
//! reduction. Analysis never fails the request.

use image::{GrayImage, Luma};

use crate::numeric;

/// Edge density above which fabric tends to fill in.
const DENSE_EDGE_RATIO: f64 = 0.12;

/// Inputs to the analyzer.
///
/// `edges` is the continuous (undashed) edge map; `candidate_count` is
/// the number of distinct colors the quantizer observed before
/// clamping to `max_colors`.
#[derive(Debug)]
pub struct WarningInputs<'a> {
    /// Alpha channel of the normalized input.
    pub alpha: &'a GrayImage,
    /// Thread thickness in pixels.
    pub thickness: u8,
    /// Continuous edge map at input resolution.
    pub edges: &'a GrayImage,
    /// Requested palette bound.
    pub max_colors: u8,
    /// Distinct colors observed before the palette clamp.
    pub candidate_count: usize,
}

/// Run every check and collect the triggered warnings.
#[must_use = "returns the warning list"]
pub fn analyze(inputs: &WarningInputs<'_>) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(min_stroke) = min_stroke_width(inputs.alpha) {
        if min_stroke < f32::from(inputs.thickness) {
            warnings.push("Thin strokes may not embroider cleanly".to_owned());
        }
    }

    if edge_density(inputs.edges) > DENSE_EDGE_RATIO {
        warnings.push("Dense detail may fill in on fabric".to_owned());
    }

    if inputs.candidate_count > usize::from(inputs.max_colors) {
        warnings.push(format!("Reduced colors to {}", inputs.max_colors));
    }

    warnings
}

/// Narrowest stroke width in pixels: twice the smallest interior
/// distance from an opaque pixel to the nearest transparent pixel.
///
/// Returns `None` when no opaque pixel exists, or when the image has
/// no transparent pixel at all (every interior distance is infinite;
/// a solid fill is not a stroke).
fn min_stroke_width(alpha: &GrayImage) -> Option<f32> {
    let transparent = GrayImage::from_fn(alpha.width(), alpha.height(), |x, y| {
        Luma([if alpha.get_pixel(x, y).0[0] == 0 { 255 } else { 0 }])
    });
    let dist = numeric::distance_transform(&transparent);

    let mut min: Option<f32> = None;
    for (p, &d) in alpha.pixels().zip(dist.iter()) {
        if p.0[0] == 0 || d.is_infinite() {
            continue;
        }
        let stroke = 2.0 * d;
        min = Some(min.map_or(stroke, |m: f32| m.min(stroke)));
    }
    min
}

/// Fraction of set pixels in the edge map.
#[allow(clippy::cast_precision_loss)]
fn edge_density(edges: &GrayImage) -> f64 {
    let total = u64::from(edges.width()) * u64::from(edges.height());
    if total == 0 {
        return 0.0;
    }
    let set: u64 = edges.pixels().map(|p| u64::from(p.0[0] != 0)).sum();
    set as f64 / total as f64
}
