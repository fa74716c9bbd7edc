//! Background compositing for non-transparent output.
//!
//! When transparency is not preserved, the stylized raster is
//! composited source-over an opaque background sheet: a solid color or
//! a named fabric raster tiled to frame. A missing fabric silently
//! falls back to the default solid; asset availability is the
//! embedding application's concern, not a request failure.

use std::collections::HashMap;

use image::{Rgba, RgbaImage};

use crate::options::Background;

/// Default background color, also the fabric fallback.
pub const FALLBACK_RGB: [u8; 3] = [0xE5, 0xE0, 0xD6];

/// Composite `image` over the requested background. The result is
/// fully opaque.
#[must_use = "returns the composited raster"]
pub fn apply(
    image: &RgbaImage,
    background: Option<&Background>,
    fabrics: &HashMap<String, RgbaImage>,
) -> RgbaImage {
    let (width, height) = image.dimensions();
    match background {
        Some(Background::Fabric { name }) => match fabrics.get(name) {
            Some(fabric) => over_fabric(image, fabric),
            None => {
                tracing::debug!(name, "fabric not registered, using fallback color");
                over_color(image, FALLBACK_RGB)
            }
        },
        Some(Background::Color { rgb }) => over_color(image, *rgb),
        None => over_color(image, FALLBACK_RGB),
    }
}

fn over_color(image: &RgbaImage, rgb: [u8; 3]) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        *pixel = source_over(pixel.0, rgb);
    }
    out
}

fn over_fabric(image: &RgbaImage, fabric: &RgbaImage) -> RgbaImage {
    let (fw, fh) = fabric.dimensions();
    if fw == 0 || fh == 0 {
        return over_color(image, FALLBACK_RGB);
    }
    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let f = fabric.get_pixel(x % fw, y % fh).0;
        *pixel = source_over(pixel.0, [f[0], f[1], f[2]]);
    }
    out
}

/// Porter-Duff source-over against an opaque background pixel.
#[allow(clippy::cast_possible_truncation)]
fn source_over(source: [u8; 4], background: [u8; 3]) -> Rgba<u8> {
    let alpha = u32::from(source[3]);
    let mut out = [0u8; 4];
    for c in 0..3 {
        let blended =
            (u32::from(source[c]) * alpha + u32::from(background[c]) * (255 - alpha)) / 255;
        out[c] = blended as u8;
    }
    out[3] = 255;
    Rgba(out)
}
