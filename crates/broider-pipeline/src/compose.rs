//! Multi-layer compositing.
//!
//! Builds the stylized raster by blending a fixed layer stack over the
//! quantized base, in order: hatch (multiply, restricted to opaque
//! pixels), per-bin thread tiles (overlay through orientation masks),
//! dashed edges (grayscale overlay), and the dashed rim stitch (white
//! overlay). The ordering is load-bearing: hatch sits under thread,
//! thread under edges, edges under the rim.
//!
//! Full-frame tile sheets and per-bin masks are fetched through the
//! [`TileMaskCache`], so repeated requests at the same dimensions skip
//! the expansion work. Base alpha is never modified by any layer.

use image::{GrayImage, RgbaImage};

use crate::cache::{self, MaskKey, TileKey, TileKind, TileMaskCache};
use crate::edges::EdgeOutcome;
use crate::numeric;
use crate::options::{EmbroideryOptions, Hatch};
use crate::orientation::OrientationOutcome;
use crate::texture::{TextureSet, THREAD_BIN_COUNT};

/// Per-channel multiply blend: `a·b/255`.
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn multiply(a: u8, b: u8) -> u8 {
    ((u32::from(a) * u32::from(b)) / 255) as u8
}

/// Per-channel overlay blend:
/// `a < 128 ? 2ab/255 : 255 − 2(255−a)(255−b)/255`.
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn overlay(a: u8, b: u8) -> u8 {
    if a < 128 {
        ((2 * u32::from(a) * u32::from(b)) / 255) as u8
    } else {
        (255 - (2 * (255 - u32::from(a)) * (255 - u32::from(b))) / 255) as u8
    }
}

/// Mix `base` toward `blended` by coverage `w` in [0, 255].
#[inline]
#[allow(clippy::cast_possible_truncation)]
fn mix(base: u8, blended: u8, w: u32) -> u8 {
    ((u32::from(base) * (255 - w) + u32::from(blended) * w) / 255) as u8
}

/// Composite the full layer stack.
#[must_use = "returns the composited raster"]
pub fn composite(
    quantized: &RgbaImage,
    textures: &TextureSet,
    edges: &EdgeOutcome,
    orientation: &OrientationOutcome,
    options: &EmbroideryOptions,
    caches: &TileMaskCache,
) -> RgbaImage {
    let (width, height) = quantized.dimensions();
    let mut acc = quantized.clone();

    // 1. Alpha mask, extracted once and reused below.
    let alpha_mask: Vec<u8> = numeric::extract_alpha(quantized).into_raw();

    // 2. Hatch underneath everything else.
    if options.hatch != Hatch::None {
        let sheet = caches.tile_or_insert_with(
            TileKey {
                kind: TileKind::Hatch,
                angle_bin: 0,
                width,
                height,
            },
            || tile_sheet(&textures.hatch, width, height),
        );
        blend_sheet(&mut acc, &sheet, Some(&alpha_mask), multiply);
    }

    // 3. Thread layers in bin index order.
    let n = orientation.bin_count;
    let signature = cache::bins_signature(&orientation.bins, n);
    for bin in 0..n {
        let tile_index = bin_tile_index(bin, n);
        let sheet = caches.tile_or_insert_with(
            TileKey {
                kind: TileKind::Thread,
                angle_bin: tile_index,
                width,
                height,
            },
            || tile_sheet(&textures.threads[usize::from(tile_index)], width, height),
        );
        let mask = caches.mask_or_insert_with(
            MaskKey {
                bin,
                width,
                height,
                signature: signature.clone(),
            },
            || bin_mask(&orientation.bins, bin),
        );
        blend_sheet(&mut acc, &sheet, Some(&mask), overlay);
    }

    // 4. Dashed edge overlay: the edge gray doubles as coverage.
    blend_gray(&mut acc, &edges.dashed);

    // 5. Rim stitch, only for stitchable widths.
    if options.border_stitch && options.border_width > 2 {
        blend_rim(&mut acc, &edges.rim_band, options.border_width);
    }

    acc
}

/// Map an orientation bin onto a tile bank index when the estimator's
/// bin count differs from the bank size.
fn bin_tile_index(bin: u8, bin_count: u8) -> u8 {
    if bin_count == 0 {
        return 0;
    }
    let index = u32::from(bin) * u32::from(THREAD_BIN_COUNT) / u32::from(bin_count);
    #[allow(clippy::cast_possible_truncation)]
    let index = (index as u8).min(THREAD_BIN_COUNT - 1);
    index
}

/// Expand a small tile into a full-frame RGBA sheet by repetition.
fn tile_sheet(tile: &RgbaImage, width: u32, height: u32) -> Vec<u8> {
    let (tw, th) = tile.dimensions();
    let mut sheet = vec![0u8; width as usize * height as usize * 4];
    if tw == 0 || th == 0 {
        return sheet;
    }
    for y in 0..height {
        for x in 0..width {
            let src = tile.get_pixel(x % tw, y % th).0;
            let off = (y as usize * width as usize + x as usize) * 4;
            sheet[off..off + 4].copy_from_slice(&src);
        }
    }
    sheet
}

/// A 255/0 mask selecting pixels whose orientation bin equals `bin`.
fn bin_mask(bins: &GrayImage, bin: u8) -> Vec<u8> {
    bins.as_raw()
        .iter()
        .map(|&b| if b == bin { 255 } else { 0 })
        .collect()
}

/// Blend a full-frame RGBA sheet into the accumulator.
///
/// Coverage is the sheet's own alpha scaled by the optional mask; the
/// accumulator's alpha channel is left untouched.
fn blend_sheet(
    acc: &mut RgbaImage,
    sheet: &[u8],
    mask: Option<&[u8]>,
    blend: impl Fn(u8, u8) -> u8,
) {
    for (i, pixel) in acc.pixels_mut().enumerate() {
        let off = i * 4;
        let source_alpha = u32::from(sheet[off + 3]);
        let restriction = mask.map_or(255, |m| u32::from(m[i]));
        let w = source_alpha * restriction / 255;
        if w == 0 {
            continue;
        }
        for c in 0..3 {
            let blended = blend(pixel.0[c], sheet[off + c]);
            pixel.0[c] = mix(pixel.0[c], blended, w);
        }
    }
}

/// Overlay a grayscale buffer: each pixel's gray value is both the
/// blend source and its own coverage.
fn blend_gray(acc: &mut RgbaImage, gray: &GrayImage) {
    for (pixel, source) in acc.pixels_mut().zip(gray.pixels()) {
        let g = source.0[0];
        if g == 0 {
            continue;
        }
        let w = u32::from(g);
        for c in 0..3 {
            let blended = overlay(pixel.0[c], g);
            pixel.0[c] = mix(pixel.0[c], blended, w);
        }
    }
}

/// White overlay through the dashed rim mask: rim pixels whose dash
/// phase `⌊x / max(4, 2·width)⌋` is even.
fn blend_rim(acc: &mut RgbaImage, rim_band: &GrayImage, width: u8) {
    let period = (u32::from(width) * 2).max(4);
    // enumerate_pixels on the mask and pixels_mut on the accumulator
    // walk the same row-major order.
    for (pixel, (x, _, source)) in acc.pixels_mut().zip(rim_band.enumerate_pixels()) {
        if source.0[0] == 0 || (x / period) % 2 != 0 {
            continue;
        }
        for c in 0..3 {
            let blended = overlay(pixel.0[c], 255);
            pixel.0[c] = mix(pixel.0[c], blended, 255);
        }
    }
}
