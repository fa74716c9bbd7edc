//! Thread and hatch texture synthesis.
//!
//! Small tileable textures drawn with tiny-skia: a bank of stripe
//! tiles pre-rotated to each synthesis angle (thread shading comes
//! from a dark→light→dark gradient across each stripe), and one hatch
//! weave tile. Generation is deterministic, so a process-wide cache
//! keyed by the drawing configuration reuses whole texture sets.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use image::{Rgba, RgbaImage};
use tiny_skia::{
    Color, GradientStop, LineCap, LinearGradient, Paint, PathBuilder, Pixmap, Point, Rect,
    SpreadMode, Stroke, Transform,
};

use crate::options::Hatch;

/// Number of pre-rotated thread tiles. Fixed at synthesis time,
/// independent of the orientation estimator's bin count.
pub const THREAD_BIN_COUNT: u8 = 6;
/// Thread tile side in pixels.
pub const THREAD_TILE_SIZE: u32 = 64;
/// Hatch tile side in pixels.
pub const HATCH_TILE_SIZE: u32 = 32;
/// Retained texture configurations.
const CONFIG_CAPACITY: usize = 8;

/// One synthesized texture set: the thread tile bank plus the hatch
/// tile (fully transparent for [`Hatch::None`]).
#[derive(Debug)]
pub struct TextureSet {
    /// [`THREAD_BIN_COUNT`] tiles; tile `i` is rotated by `i·180°/count`.
    pub threads: Vec<RgbaImage>,
    /// Tileable hatch weave.
    pub hatch: RgbaImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureKey {
    thickness: u8,
    hatch: Hatch,
    density_bits: u32,
}

/// Bounded cache of synthesized texture sets, keyed by
/// `(thickness, hatch, density)`. Holds the most recent
/// [`CONFIG_CAPACITY`] configurations; insertion order evicts.
pub struct TextureCache {
    inner: Mutex<TextureCacheInner>,
}

struct TextureCacheInner {
    sets: HashMap<TextureKey, Arc<TextureSet>>,
    order: VecDeque<TextureKey>,
}

impl TextureCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TextureCacheInner {
                sets: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Fetch the texture set for a configuration, synthesizing on miss.
    pub fn get(&self, thickness: u8, hatch: Hatch, density: f32) -> Arc<TextureSet> {
        let key = TextureKey {
            thickness,
            hatch,
            density_bits: density.to_bits(),
        };
        if let Ok(inner) = self.inner.lock() {
            if let Some(hit) = inner.sets.get(&key) {
                return Arc::clone(hit);
            }
        }

        // Synthesize outside the lock; a concurrent duplicate is
        // byte-identical, so last write wins.
        let set = Arc::new(synthesize(thickness, hatch, density));
        if let Ok(mut inner) = self.inner.lock() {
            if !inner.sets.contains_key(&key) {
                inner.sets.insert(key, Arc::clone(&set));
                inner.order.push_back(key);
                while inner.order.len() > CONFIG_CAPACITY {
                    if let Some(evicted) = inner.order.pop_front() {
                        tracing::debug!(?evicted, "evicting texture configuration");
                        inner.sets.remove(&evicted);
                    }
                }
            }
        }
        set
    }

    /// Current number of cached configurations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.sets.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TextureCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Synthesize the full texture set for a configuration.
#[must_use = "returns the synthesized textures"]
pub fn synthesize(thickness: u8, hatch: Hatch, density: f32) -> TextureSet {
    let threads = (0..THREAD_BIN_COUNT)
        .map(|i| {
            let angle = f32::from(i) * 180.0 / f32::from(THREAD_BIN_COUNT);
            thread_tile(angle, thickness, density)
        })
        .collect();
    TextureSet {
        threads,
        hatch: hatch_tile(hatch, density),
    }
}

/// Draw one thread tile: parallel stripes rotated to `angle_deg`.
///
/// Each stripe is a `thickness`-wide rectangle filled with a
/// horizontal #333 → #888 → #333 gradient, approximating cylindrical
/// thread shading perpendicular to the stripe. Stripes are drawn
/// across an extended span so rotation leaves no uncovered corners.
fn thread_tile(angle_deg: f32, thickness: u8, density: f32) -> RgbaImage {
    let size = THREAD_TILE_SIZE;
    let Some(mut pixmap) = Pixmap::new(size, size) else {
        return RgbaImage::new(size, size);
    };

    #[allow(clippy::cast_precision_loss)]
    let s = size as f32;
    let t = f32::from(thickness);
    let spacing = (t * 1.2 / density).round().max(2.0);
    let center = s / 2.0;
    let transform = Transform::from_rotate_at(angle_deg, center, center);

    let mut x = -s;
    while x < 2.0 * s {
        if let Some(rect) = Rect::from_xywh(x, -s, t, 3.0 * s) {
            let stops = vec![
                GradientStop::new(0.0, Color::from_rgba8(0x33, 0x33, 0x33, 0xFF)),
                GradientStop::new(0.5, Color::from_rgba8(0x88, 0x88, 0x88, 0xFF)),
                GradientStop::new(1.0, Color::from_rgba8(0x33, 0x33, 0x33, 0xFF)),
            ];
            if let Some(shader) = LinearGradient::new(
                Point::from_xy(x, 0.0),
                Point::from_xy(x + t, 0.0),
                stops,
                SpreadMode::Pad,
                Transform::identity(),
            ) {
                let paint = Paint {
                    shader,
                    anti_alias: true,
                    ..Paint::default()
                };
                pixmap.fill_rect(rect, &paint, transform, None);
            }
        }
        x += spacing;
    }

    pixmap_to_rgba(&pixmap)
}

/// Draw the hatch tile for a style.
fn hatch_tile(hatch: Hatch, density: f32) -> RgbaImage {
    let size = HATCH_TILE_SIZE;
    let Some(mut pixmap) = Pixmap::new(size, size) else {
        return RgbaImage::new(size, size);
    };

    let spacing = (4.0 / density).round().max(3.0);
    match hatch {
        Hatch::None => {}
        Hatch::Diagonal => stroke_lines(&mut pixmap, 45.0, spacing, 102),
        Hatch::Cross => {
            stroke_lines(&mut pixmap, 45.0, spacing, 77);
            stroke_lines(&mut pixmap, -45.0, spacing, 77);
        }
    }

    pixmap_to_rgba(&pixmap)
}

/// Stroke parallel 1px lines at `angle_deg`, `spacing` apart, by
/// drawing vertical lines in a rotated frame.
fn stroke_lines(pixmap: &mut Pixmap, angle_deg: f32, spacing: f32, alpha: u8) {
    #[allow(clippy::cast_precision_loss)]
    let s = pixmap.width() as f32;
    let center = s / 2.0;
    let transform = Transform::from_rotate_at(angle_deg, center, center);

    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, alpha);
    paint.anti_alias = true;
    let stroke = Stroke {
        width: 1.0,
        line_cap: LineCap::Butt,
        ..Stroke::default()
    };

    let mut x = -s;
    while x < 2.0 * s {
        let mut pb = PathBuilder::new();
        pb.move_to(x, -s);
        pb.line_to(x, 2.0 * s);
        if let Some(path) = pb.finish() {
            pixmap.stroke_path(&path, &paint, &stroke, transform, None);
        }
        x += spacing;
    }
}

/// Convert a premultiplied pixmap to a straight-alpha `RgbaImage`.
#[allow(clippy::cast_possible_truncation)]
fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let data = pixmap.data();
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (i, pixel) in img.pixels_mut().enumerate() {
        let off = i * 4;
        let a = data[off + 3];
        if a == 0 {
            *pixel = Rgba([0, 0, 0, 0]);
        } else {
            // Un-premultiply: channel = premultiplied * 255 / alpha.
            let r = u16::from(data[off]) * 255 / u16::from(a);
            let g = u16::from(data[off + 1]) * 255 / u16::from(a);
            let b = u16::from(data[off + 2]) * 255 / u16::from(a);
            *pixel = Rgba([r as u8, g as u8, b as u8, a]);
        }
    }
    img
}
