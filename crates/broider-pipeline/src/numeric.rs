//! Numeric kernels shared by the analysis stages.
//!
//! Pure functions over raster buffers: grayscale and alpha extraction,
//! a fixed 3×3 Gaussian, Sobel gradients, gradient-to-bin quantization,
//! magnitude thresholding, a two-pass Chamfer distance transform, and a
//! seeded linear-congruential generator.
//!
//! All functions are total: out-of-range intermediate values saturate,
//! and boundary pixels use replicate-edge sampling.

use image::{GrayImage, Luma};

/// Signed gradient raster produced by the Sobel operators.
pub type GradientImage = image::ImageBuffer<Luma<i16>, Vec<i16>>;

/// Convert RGBA to Rec.709 luminance: `Y = 0.2126R + 0.7152G + 0.0722B`.
#[must_use = "returns the grayscale image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_grayscale(image: &image::RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y).0;
        let y_lin = 0.2126f32.mul_add(
            f32::from(p[0]),
            0.7152f32.mul_add(f32::from(p[1]), 0.0722 * f32::from(p[2])),
        );
        Luma([y_lin.round().clamp(0.0, 255.0) as u8])
    })
}

/// Extract the alpha channel as a single-channel raster.
#[must_use = "returns the alpha image"]
pub fn extract_alpha(image: &image::RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([image.get_pixel(x, y).0[3]])
    })
}

/// 3×3 binomial Gaussian `{1,2,1; 2,4,2; 1,2,1}/16` with replicate-edge
/// boundary and round-half-up normalization.
#[must_use = "returns the blurred image"]
#[allow(clippy::cast_possible_truncation)]
pub fn gaussian_blur_3x3(gray: &GrayImage) -> GrayImage {
    const KERNEL: [[u32; 3]; 3] = [[1, 2, 1], [2, 4, 2], [1, 2, 1]];
    let (w, h) = gray.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut acc = 0u32;
        for (ky, row) in KERNEL.iter().enumerate() {
            for (kx, weight) in row.iter().enumerate() {
                let sx = clamp_coord(i64::from(x) + kx as i64 - 1, w);
                let sy = clamp_coord(i64::from(y) + ky as i64 - 1, h);
                acc += weight * u32::from(gray.get_pixel(sx, sy).0[0]);
            }
        }
        Luma([((acc + 8) / 16) as u8])
    })
}

/// Horizontal and vertical Sobel gradients (replicate-edge, signed).
#[must_use = "returns the gradient pair"]
pub fn sobel(gray: &GrayImage) -> (GradientImage, GradientImage) {
    (
        imageproc::gradients::horizontal_sobel(gray),
        imageproc::gradients::vertical_sobel(gray),
    )
}

/// Quantize gradient direction over the half-circle [0, π) into `n`
/// bins: `a = atan2(gy, gx)`, fold negatives by +π, then
/// `bin = clamp(floor(a·n/π), 0, n−1)`.
#[must_use = "returns the bin image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn bins_from_gradients(gx: &GradientImage, gy: &GradientImage, n: u8) -> GrayImage {
    GrayImage::from_fn(gx.width(), gx.height(), |x, y| {
        let angle = fold_angle(f32::from(gy.get_pixel(x, y).0[0]), f32::from(gx.get_pixel(x, y).0[0]));
        let bin = (angle * f32::from(n) / std::f32::consts::PI).floor();
        Luma([bin.clamp(0.0, f32::from(n) - 1.0) as u8])
    })
}

/// `atan2(gy, gx)` folded into [0, π).
#[must_use]
pub fn fold_angle(gy: f32, gx: f32) -> f32 {
    let mut a = gy.atan2(gx);
    if a < 0.0 {
        a += std::f32::consts::PI;
    }
    a
}

/// Binary magnitude mask: 255 iff `hypot(gx, gy) ≥ tau`.
#[must_use = "returns the binary mask"]
pub fn magnitude_threshold(gx: &GradientImage, gy: &GradientImage, tau: f32) -> GrayImage {
    GrayImage::from_fn(gx.width(), gx.height(), |x, y| {
        let m = f32::from(gx.get_pixel(x, y).0[0]).hypot(f32::from(gy.get_pixel(x, y).0[0]));
        Luma([if m >= tau { 255 } else { 0 }])
    })
}

/// Mean gradient magnitude across the raster; 0 for an empty raster.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_magnitude(gx: &GradientImage, gy: &GradientImage) -> f32 {
    let count = gx.width() as u64 * gx.height() as u64;
    if count == 0 {
        return 0.0;
    }
    let sum: f64 = gx
        .iter()
        .zip(gy.iter())
        .map(|(&h, &v)| f64::from(f32::from(h).hypot(f32::from(v))))
        .sum();
    (sum / count as f64) as f32
}

/// Two-pass Chamfer distance transform with costs 1 (orthogonal) and
/// 1.4 (diagonal).
///
/// Pixels with a non-zero input value get distance 0; all others get
/// the Chamfer-approximate distance to the nearest non-zero pixel, or
/// `f32::INFINITY` when none exists. The forward pass scans
/// top-left → bottom-right over neighbors (−1,0), (0,−1), (−1,−1),
/// (+1,−1); the backward pass mirrors it.
#[must_use = "returns the distance field"]
pub fn distance_transform(binary: &GrayImage) -> Vec<f32> {
    const ORTHOGONAL: f32 = 1.0;
    const DIAGONAL: f32 = 1.4;

    let w = binary.width() as usize;
    let h = binary.height() as usize;
    let mut dist = vec![f32::INFINITY; w * h];
    for (i, p) in binary.pixels().enumerate() {
        if p.0[0] != 0 {
            dist[i] = 0.0;
        }
    }

    // Forward pass.
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let mut d = dist[i];
            if x > 0 {
                d = d.min(dist[i - 1] + ORTHOGONAL);
            }
            if y > 0 {
                d = d.min(dist[i - w] + ORTHOGONAL);
                if x > 0 {
                    d = d.min(dist[i - w - 1] + DIAGONAL);
                }
                if x + 1 < w {
                    d = d.min(dist[i - w + 1] + DIAGONAL);
                }
            }
            dist[i] = d;
        }
    }

    // Backward pass over the mirrored neighborhood.
    for y in (0..h).rev() {
        for x in (0..w).rev() {
            let i = y * w + x;
            let mut d = dist[i];
            if x + 1 < w {
                d = d.min(dist[i + 1] + ORTHOGONAL);
            }
            if y + 1 < h {
                d = d.min(dist[i + w] + ORTHOGONAL);
                if x + 1 < w {
                    d = d.min(dist[i + w + 1] + DIAGONAL);
                }
                if x > 0 {
                    d = d.min(dist[i + w - 1] + DIAGONAL);
                }
            }
            dist[i] = d;
        }
    }

    dist
}

/// Nearest-neighbor resample to exact target dimensions.
///
/// Used where value identity matters: bin maps and binary masks must
/// keep their exact byte values across scaling.
#[must_use = "returns the resized image"]
pub fn resize_nearest(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    image::imageops::resize(image, width, height, image::imageops::FilterType::Nearest)
}

/// Scale `(w, h)` so the longest axis is at most `max_dimension`,
/// preserving aspect and never enlarging. Both results stay ≥ 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn fit_inside(w: u32, h: u32, max_dimension: u32) -> (u32, u32) {
    let long_axis = w.max(h);
    if long_axis <= max_dimension {
        return (w, h);
    }
    let scale = f64::from(max_dimension) / f64::from(long_axis);
    (
        ((f64::from(w) * scale).round() as u32).max(1),
        ((f64::from(h) * scale).round() as u32).max(1),
    )
}

/// Seeded linear-congruential generator:
/// `s = s·1664525 + 1013904223 mod 2³²`, uniform reals from the high
/// bits. Deterministic for a fixed seed.
#[derive(Debug, Clone)]
pub struct SeededRng {
    state: u32,
}

impl SeededRng {
    /// Create a generator from a seed.
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next uniform value in [0, 1).
    #[allow(clippy::cast_precision_loss)]
    pub fn next_f32(&mut self) -> f32 {
        self.state = self.state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        (self.state >> 8) as f32 / (1u32 << 24) as f32
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_coord(v: i64, len: u32) -> u32 {
    v.clamp(0, i64::from(len) - 1) as u32
}
