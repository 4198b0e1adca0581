use crate::foundation::core::{Rgb, Rgba8Premul};
use crate::foundation::error::{ScopeError, ScopeResult};

/// Names accepted by [`ColorRamp::by_name`].
pub const RAMP_NAMES: &[&str] = &[
    "grayscale",
    "ironbow",
    "kry",
    "rainbow",
    "reverse-rainbow",
    "viridis",
];

/// 256-entry lookup mapping normalized density to premultiplied RGBA.
///
/// Entry `0` is fully transparent so empty density cells leave the layers beneath visible; all
/// other entries are opaque.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorRamp {
    name: &'static str,
    lut: Box<[Rgba8Premul; 256]>,
}

impl ColorRamp {
    /// Look up a built-in ramp.
    pub fn by_name(name: &str) -> ScopeResult<Self> {
        let (name, stops): (&'static str, &[(f32, u32)]) = match name {
            "grayscale" => ("grayscale", &GRAYSCALE[..]),
            "ironbow" => ("ironbow", &IRONBOW[..]),
            "kry" => ("kry", &KRY[..]),
            "rainbow" => ("rainbow", &RAINBOW[..]),
            "reverse-rainbow" => ("reverse-rainbow", &REVERSE_RAINBOW[..]),
            "viridis" => ("viridis", &VIRIDIS[..]),
            other => {
                return Err(ScopeError::validation(format!(
                    "unknown color ramp '{other}' (expected one of: {})",
                    RAMP_NAMES.join(", ")
                )));
            }
        };
        Ok(Self {
            name,
            lut: build_lut(stops),
        })
    }

    /// Ramp name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Raw lookup table.
    pub fn lut(&self) -> &[Rgba8Premul; 256] {
        &self.lut
    }

    /// Color for `t` in `[0, 1]` (clamped; NaN maps to transparent).
    pub fn sample(&self, t: f32) -> Rgba8Premul {
        if t.is_nan() {
            return Rgba8Premul::transparent();
        }
        self.lut[(t.clamp(0.0, 1.0) * 255.0).round() as usize]
    }
}

static GRAYSCALE: [(f32, u32); 2] = [(0.0, 0x000000), (1.0, 0xffffff)];

static IRONBOW: [(f32, u32); 7] = [
    (0.0, 0x000000),
    (0.15, 0x1c0373),
    (0.35, 0x8a0c8f),
    (0.55, 0xd92d2d),
    (0.75, 0xf98f0a),
    (0.9, 0xfde04b),
    (1.0, 0xffffff),
];

static KRY: [(f32, u32); 4] = [
    (0.0, 0x000000),
    (1.0 / 3.0, 0xff0000),
    (2.0 / 3.0, 0xffff00),
    (1.0, 0xffffff),
];

static VIRIDIS: [(f32, u32); 5] = [
    (0.0, 0x440154),
    (0.25, 0x3b528b),
    (0.5, 0x21918c),
    (0.75, 0x5ec962),
    (1.0, 0xfde725),
];

static RAINBOW: [(f32, u32); 5] = [
    (0.0, 0x0000ff),
    (0.25, 0x00ffff),
    (0.5, 0x00ff00),
    (0.75, 0xffff00),
    (1.0, 0xff0000),
];

static REVERSE_RAINBOW: [(f32, u32); 5] = [
    (0.0, 0xff0000),
    (0.25, 0xffff00),
    (0.5, 0x00ff00),
    (0.75, 0x00ffff),
    (1.0, 0x0000ff),
];

fn rgb_hex(c: u32) -> Rgb {
    Rgb::from_rgb8((c >> 16) as u8, (c >> 8) as u8, c as u8)
}

fn build_lut(stops: &[(f32, u32)]) -> Box<[Rgba8Premul; 256]> {
    let mut lut = Box::new([Rgba8Premul::transparent(); 256]);
    for (i, slot) in lut.iter_mut().enumerate().skip(1) {
        let t = i as f32 / 255.0;
        let hi = stops
            .iter()
            .position(|&(at, _)| at >= t)
            .unwrap_or(stops.len() - 1)
            .max(1);
        let (t0, c0) = stops[hi - 1];
        let (t1, c1) = stops[hi];
        let local = if t1 > t0 { (t - t0) / (t1 - t0) } else { 1.0 };
        *slot = rgb_hex(c0).lerp(rgb_hex(c1), local).to_rgba8_premul();
    }
    lut
}

#[cfg(test)]
#[path = "../../tests/unit/render/ramp.rs"]
mod tests;
