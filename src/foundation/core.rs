use crate::foundation::error::{ScopeError, ScopeResult};
use serde::{Deserialize, Serialize};

pub use kurbo::{BezPath, Point, Rect};

/// Identifier of an acquisition channel (or a derived filter output) in a [`crate::ChannelStore`].
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ChannelId(pub u32);

/// Identifier of one trace drawn on the plot.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TraceId(pub u32);

/// Plot area dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlotSize {
    /// Width in pixels (number of pixel columns).
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PlotSize {
    /// Create a validated, non-degenerate plot size.
    pub fn new(width: u32, height: u32) -> ScopeResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScopeError::validation("plot width and height must be > 0"));
        }
        Ok(Self { width, height })
    }

    /// Number of cells in a `width x height` buffer.
    pub fn cells(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Return `true` when either dimension is zero.
    pub fn is_degenerate(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Bytes in `[r, g, b, a]` order.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Channel display color, linear `0..=1` components, opaque.
///
/// Deserializes from `"#RRGGBB"`, `[r, g, b]` or `{"r": .., "g": .., "b": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rgb {
    /// Red component.
    pub r: f32,
    /// Green component.
    pub g: f32,
    /// Blue component.
    pub b: f32,
}

impl Rgb {
    /// Build a color from float components (clamped to `0..=1`).
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    /// Build a color from 8-bit components.
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
        )
    }

    /// Parse `#RRGGBB` (leading `#` optional, case-insensitive).
    pub fn parse_hex(s: &str) -> ScopeResult<Self> {
        parse_hex(s).map_err(ScopeError::validation)
    }

    /// Opaque premultiplied RGBA8 for this color.
    pub fn to_rgba8_premul(self) -> Rgba8Premul {
        fn to_u8(x: f32) -> u8 {
            (x.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        Rgba8Premul {
            r: to_u8(self.r),
            g: to_u8(self.g),
            b: to_u8(self.b),
            a: 255,
        }
    }

    /// Linear interpolation between two colors.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Hex(String),
            Obj { r: f32, g: f32, b: f32 },
            Arr(Vec<f32>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Hex(s) => parse_hex(&s).map_err(serde::de::Error::custom),
            Repr::Obj { r, g, b } => Ok(Self::new(r, g, b)),
            Repr::Arr(v) => {
                if v.len() == 3 {
                    Ok(Self::new(v[0], v[1], v[2]))
                } else {
                    Err(serde::de::Error::custom(
                        "rgb array must have len 3 ([r,g,b])",
                    ))
                }
            }
        }
    }
}

fn parse_hex(s: &str) -> Result<Rgb, String> {
    let s = s.trim();
    let s = s.strip_prefix('#').unwrap_or(s);

    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    if s.len() != 6 || !s.is_ascii() {
        return Err("hex color must be #RRGGBB (case-insensitive)".to_owned());
    }
    let r = hex_byte(&s[0..2])?;
    let g = hex_byte(&s[2..4])?;
    let b = hex_byte(&s[4..6])?;
    Ok(Rgb::from_rgb8(r, g, b))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
