//! Request options: parsing, defaults, and clamping.
//!
//! The embedding application hands the pipeline a free-form JSON record.
//! Everything is validated, defaulted, and clamped **here, once**;
//! downstream stages receive [`EmbroideryOptions`] and never
//! re-validate. Unknown keys in the record are ignored (the record is
//! free-form), but an unknown *enumeration value* is an error.

use serde::{Deserialize, Serialize};

use crate::types::EmbroideryError;

/// Cross-hatching overlay style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hatch {
    /// No hatch layer.
    None,
    /// Single set of 45° lines.
    #[default]
    Diagonal,
    /// Both ±45° line sets.
    Cross,
}

/// Orientation estimation method.
///
/// `lic` is advertised for line-integral-convolution flow but is an
/// alias of the binned estimator at a finer bin count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrientationMethod {
    /// Quantized gradient direction over the half-circle.
    #[default]
    #[serde(rename = "binned-8")]
    Binned8,
    /// Finer-binned alias accepted for flow-style consumers.
    #[serde(rename = "lic")]
    Lic,
}

/// Edge extraction style. Both values run the thresholded-Sobel
/// pipeline; `xdog` is an accepted alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStyle {
    /// Thresholded-Sobel contour extraction.
    #[default]
    Canny,
    /// Alias of [`EdgeStyle::Canny`].
    Xdog,
}

/// Input material mode, tuning analysis sizes and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Photographic input: finer bins, higher edge threshold.
    #[default]
    Photo,
    /// Flat-color artwork: coarser bins, lower edge threshold.
    Logo,
}

/// Background to composite under the result when transparency is not
/// preserved. The color hex is parsed at the options boundary so the
/// background stage never re-validates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Background {
    /// Solid color.
    Color {
        /// Parsed `#RRGGBB` triple.
        rgb: [u8; 3],
    },
    /// Named fabric texture, resolved from the pipeline's registry.
    Fabric {
        /// Registry key of the fabric raster.
        name: String,
    },
}

/// Fully validated and clamped request options.
///
/// Construct via [`EmbroideryOptions::from_value`] (the free-form JSON
/// boundary) or [`Default`]. All numeric fields are already inside
/// their documented ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbroideryOptions {
    /// Palette size bound, clamped to [2, 12].
    pub max_colors: u8,
    /// Simulated thread width in pixels, clamped to [1, 10].
    pub thread_thickness: u8,
    /// When `false`, the result is composited over a background.
    pub preserve_transparency: bool,
    /// Hatch overlay style.
    pub hatch: Hatch,
    /// Optional background; `None` falls back to the default solid.
    pub background: Option<Background>,
    /// Orientation estimation method.
    pub orientation: OrientationMethod,
    /// Edge extraction style (aliased).
    pub edge_style: EdgeStyle,
    /// Photo or logo material mode.
    pub mode: Mode,
    /// Reserved lighting control in [0, 1]; does not affect pixels.
    pub sheen: f32,
    /// Whether to stitch a dashed rim along the alpha silhouette.
    pub border_stitch: bool,
    /// Rim stitch width in pixels, clamped to [1, 10]; defaults to
    /// `thread_thickness`.
    pub border_width: u8,
    /// Texture density multiplier, clamped to [0.5, 2].
    pub density_scale: f32,
    /// Reserved grain control in [0, 1]; does not affect pixels.
    pub grain_randomness: f32,
}

impl EmbroideryOptions {
    /// Default palette size bound.
    pub const DEFAULT_MAX_COLORS: u8 = 8;
    /// Default thread thickness in pixels.
    pub const DEFAULT_THREAD_THICKNESS: u8 = 3;
    /// Default transparency handling.
    pub const DEFAULT_PRESERVE_TRANSPARENCY: bool = true;
    /// Default reserved sheen value.
    pub const DEFAULT_SHEEN: f32 = 0.25;
    /// Default rim stitch toggle.
    pub const DEFAULT_BORDER_STITCH: bool = true;
    /// Default texture density multiplier.
    pub const DEFAULT_DENSITY_SCALE: f32 = 1.0;
    /// Default reserved grain value.
    pub const DEFAULT_GRAIN_RANDOMNESS: f32 = 0.15;

    /// Parse a free-form options record, applying defaults and clamps.
    ///
    /// # Errors
    ///
    /// Returns [`EmbroideryError::UnsupportedOption`] for an unknown
    /// enumeration value and [`EmbroideryError::InvalidInput`] for a
    /// malformed record or background hex.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, EmbroideryError> {
        let raw: RawOptions = serde_json::from_value(value.clone())
            .map_err(|e| EmbroideryError::InvalidInput(format!("malformed options: {e}")))?;

        let thread_thickness = clamp_int(raw.thread_thickness, Self::DEFAULT_THREAD_THICKNESS, 1, 10);

        let hatch = match raw.hatch.as_deref() {
            None => Hatch::default(),
            Some("none") => Hatch::None,
            Some("diagonal") => Hatch::Diagonal,
            Some("cross") => Hatch::Cross,
            Some(other) => {
                return Err(EmbroideryError::UnsupportedOption(format!(
                    "unknown hatch \"{other}\""
                )))
            }
        };

        let orientation = match raw.style.orientation.as_deref() {
            None => OrientationMethod::default(),
            Some("binned-8") => OrientationMethod::Binned8,
            Some("lic") => OrientationMethod::Lic,
            Some(other) => {
                return Err(EmbroideryError::UnsupportedOption(format!(
                    "unknown orientation \"{other}\""
                )))
            }
        };

        let edge_style = match raw.style.edges.as_deref() {
            None => EdgeStyle::default(),
            Some("canny") => EdgeStyle::Canny,
            Some("xdog") => EdgeStyle::Xdog,
            Some(other) => {
                return Err(EmbroideryError::UnsupportedOption(format!(
                    "unknown edge style \"{other}\""
                )))
            }
        };

        let mode = match raw.style.mode.as_deref() {
            None => Mode::default(),
            Some("photo") => Mode::Photo,
            Some("logo") => Mode::Logo,
            Some(other) => {
                return Err(EmbroideryError::UnsupportedOption(format!(
                    "unknown mode \"{other}\""
                )))
            }
        };

        let background = raw.background.map(parse_background).transpose()?;

        Ok(Self {
            max_colors: clamp_int(raw.max_colors, Self::DEFAULT_MAX_COLORS, 2, 12),
            thread_thickness,
            preserve_transparency: raw
                .preserve_transparency
                .unwrap_or(Self::DEFAULT_PRESERVE_TRANSPARENCY),
            hatch,
            background,
            orientation,
            edge_style,
            mode,
            sheen: clamp_float(raw.lighting.sheen, Self::DEFAULT_SHEEN, 0.0, 1.0),
            border_stitch: raw.border.stitch.unwrap_or(Self::DEFAULT_BORDER_STITCH),
            border_width: clamp_int(raw.border.width, thread_thickness, 1, 10),
            density_scale: clamp_float(raw.density.scale, Self::DEFAULT_DENSITY_SCALE, 0.5, 2.0),
            grain_randomness: clamp_float(
                raw.grain.randomness,
                Self::DEFAULT_GRAIN_RANDOMNESS,
                0.0,
                1.0,
            ),
        })
    }
}

impl Default for EmbroideryOptions {
    fn default() -> Self {
        Self {
            max_colors: Self::DEFAULT_MAX_COLORS,
            thread_thickness: Self::DEFAULT_THREAD_THICKNESS,
            preserve_transparency: Self::DEFAULT_PRESERVE_TRANSPARENCY,
            hatch: Hatch::default(),
            background: None,
            orientation: OrientationMethod::default(),
            edge_style: EdgeStyle::default(),
            mode: Mode::default(),
            sheen: Self::DEFAULT_SHEEN,
            border_stitch: Self::DEFAULT_BORDER_STITCH,
            border_width: Self::DEFAULT_THREAD_THICKNESS,
            density_scale: Self::DEFAULT_DENSITY_SCALE,
            grain_randomness: Self::DEFAULT_GRAIN_RANDOMNESS,
        }
    }
}

/// Untyped mirror of the incoming record. Every field is optional;
/// unknown keys are ignored because the record is free-form.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawOptions {
    max_colors: Option<i64>,
    thread_thickness: Option<i64>,
    preserve_transparency: Option<bool>,
    hatch: Option<String>,
    background: Option<RawBackground>,
    style: RawStyle,
    lighting: RawLighting,
    border: RawBorder,
    density: RawDensity,
    grain: RawGrain,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBackground {
    #[serde(rename = "type")]
    kind: Option<String>,
    hex: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStyle {
    orientation: Option<String>,
    edges: Option<String>,
    mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLighting {
    sheen: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawBorder {
    stitch: Option<bool>,
    width: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDensity {
    scale: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGrain {
    randomness: Option<f64>,
}

fn parse_background(raw: RawBackground) -> Result<Background, EmbroideryError> {
    match raw.kind.as_deref() {
        Some("color") => {
            let hex = raw.hex.ok_or_else(|| {
                EmbroideryError::InvalidInput("background color requires \"hex\"".to_owned())
            })?;
            Ok(Background::Color {
                rgb: parse_hex(&hex)?,
            })
        }
        Some("fabric") => {
            let name = raw.name.ok_or_else(|| {
                EmbroideryError::InvalidInput("background fabric requires \"name\"".to_owned())
            })?;
            Ok(Background::Fabric { name })
        }
        Some(other) => Err(EmbroideryError::UnsupportedOption(format!(
            "unknown background type \"{other}\""
        ))),
        None => Err(EmbroideryError::InvalidInput(
            "background requires \"type\"".to_owned(),
        )),
    }
}

/// Parse a `#RRGGBB` color string.
fn parse_hex(hex: &str) -> Result<[u8; 3], EmbroideryError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(EmbroideryError::InvalidInput(format!(
            "invalid background hex \"{hex}\""
        )));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| {
            EmbroideryError::InvalidInput(format!("invalid background hex \"{hex}\""))
        })
    };
    Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_int(value: Option<i64>, default: u8, min: u8, max: u8) -> u8 {
    value.map_or(default, |v| v.clamp(i64::from(min), i64::from(max)) as u8)
}

#[allow(clippy::cast_possible_truncation)]
fn clamp_float(value: Option<f64>, default: f32, min: f32, max: f32) -> f32 {
    value.map_or(default, |v| (v as f32).clamp(min, max))
}
