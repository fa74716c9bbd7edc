//! Fast frequency-bucket color quantization.
//!
//! Reduces the normalized image to at most K colors: sample a
//! downscaled copy, bucket channel values to multiples of 16, keep the
//! K most frequent buckets as the palette, then remap every
//! full-resolution pixel to its nearest palette color in RGB space.
//! Alpha passes through untouched.

use std::collections::HashMap;

use image::imageops::FilterType;
use image::RgbaImage;
use rayon::prelude::*;

use crate::numeric;
use crate::types::{EmbroideryError, PaletteColor};

/// Longest side of the sampling raster.
const SAMPLE_MAX_DIMENSION: u32 = 400;
/// Every Nth pixel of the sampling raster is counted.
const SAMPLE_STRIDE: usize = 4;
/// Channel bucket width.
const CHANNEL_STEP: u32 = 16;

/// Quantization result: the remapped raster, the palette, and how many
/// distinct bucketed colors were observed before the palette clamp.
#[derive(Debug, Clone)]
pub struct QuantizeOutcome {
    /// Full-resolution raster whose every RGB equals a palette entry.
    pub image: RgbaImage,
    /// At most `max_colors` entries, most frequent first.
    pub palette: Vec<PaletteColor>,
    /// Distinct bucketed colors seen while sampling. When this exceeds
    /// `max_colors` the warning analyzer reports the reduction.
    pub candidate_count: usize,
}

/// Quantize `image` to at most `max_colors` colors.
///
/// Ties between equally frequent buckets break by first observation,
/// so the palette is deterministic for a fixed input.
///
/// # Errors
///
/// Returns [`EmbroideryError::InvalidInput`] for a zero-sized raster.
pub fn quantize(image: &RgbaImage, max_colors: u8) -> Result<QuantizeOutcome, EmbroideryError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(EmbroideryError::InvalidInput("empty image".to_owned()));
    }

    // Nearest-neighbor keeps sampled colors exact.
    let (sw, sh) = numeric::fit_inside(image.width(), image.height(), SAMPLE_MAX_DIMENSION);
    let sampled = if (sw, sh) == (image.width(), image.height()) {
        image.clone()
    } else {
        image::imageops::resize(image, sw, sh, FilterType::Nearest)
    };

    // Frequency map over bucketed colors; the stored index preserves
    // first-observation order for stable tie-breaks.
    let mut frequencies: HashMap<[u8; 4], (usize, usize)> = HashMap::new();
    for (i, pixel) in sampled.pixels().enumerate() {
        if i % SAMPLE_STRIDE != 0 {
            continue;
        }
        let p = pixel.0;
        let key = [bucket(p[0]), bucket(p[1]), bucket(p[2]), p[3]];
        let order = frequencies.len();
        let entry = frequencies.entry(key).or_insert((0, order));
        entry.0 += 1;
    }
    let candidate_count = frequencies.len();

    let mut ranked: Vec<([u8; 4], (usize, usize))> = frequencies.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

    let palette: Vec<PaletteColor> = ranked
        .iter()
        .take(usize::from(max_colors))
        .map(|(c, _)| PaletteColor::new(c[0], c[1], c[2], c[3]))
        .collect();

    let image = remap(image, &palette);

    Ok(QuantizeOutcome {
        image,
        palette,
        candidate_count,
    })
}

/// Round a channel to its nearest multiple of 16, saturating at 255.
#[allow(clippy::cast_possible_truncation)]
fn bucket(channel: u8) -> u8 {
    ((u32::from(channel) + CHANNEL_STEP / 2) / CHANNEL_STEP * CHANNEL_STEP).min(255) as u8
}

/// Replace every pixel's RGB with the nearest palette RGB (squared
/// Euclidean distance), preserving alpha. Rows remap in parallel.
fn remap(image: &RgbaImage, palette: &[PaletteColor]) -> RgbaImage {
    let width = image.width() as usize;
    let mut out = image.clone();
    let buf: &mut [u8] = &mut out;
    buf.par_chunks_mut(width * 4).for_each(|row| {
        for pixel in row.chunks_exact_mut(4) {
            let [r, g, b] = nearest_rgb(palette, pixel[0], pixel[1], pixel[2]);
            pixel[0] = r;
            pixel[1] = g;
            pixel[2] = b;
        }
    });
    out
}

fn nearest_rgb(palette: &[PaletteColor], r: u8, g: u8, b: u8) -> [u8; 3] {
    let mut best = [r, g, b];
    let mut best_distance = u32::MAX;
    for color in palette {
        let dr = i32::from(color.r) - i32::from(r);
        let dg = i32::from(color.g) - i32::from(g);
        let db = i32::from(color.b) - i32::from(b);
        #[allow(clippy::cast_sign_loss)]
        let distance = (dr * dr + dg * dg + db * db) as u32;
        if distance < best_distance {
            best_distance = distance;
            best = color.rgb();
        }
    }
    best
}
