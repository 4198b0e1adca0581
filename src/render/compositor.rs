use rayon::prelude::*;

use crate::foundation::core::{PlotSize, Rgb};
use crate::foundation::error::{ScopeError, ScopeResult};
use crate::foundation::math::{mul_div255_u8, unit_to_u8};
use crate::reduce::intensity::IntensityBuffer;
use crate::render::density::DensityImage;
use crate::render::frame::FrameRGBA;

/// Premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Premultiplied source-over (`ONE, ONE_MINUS_SRC_ALPHA`).
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), inv));
    }
    out
}

/// Map an accumulated intensity through a trace color.
///
/// `coverage = min(intensity, 1)`, and the result is `color * coverage` with alpha `coverage`,
/// already premultiplied.
pub fn tone_map(intensity: f32, color: Rgb) -> PremulRgba8 {
    let a = if intensity.is_finite() {
        intensity.clamp(0.0, 1.0)
    } else {
        0.0
    };
    [
        unit_to_u8(color.r * a),
        unit_to_u8(color.g * a),
        unit_to_u8(color.b * a),
        unit_to_u8(a),
    ]
}

/// In-place source-over of a full premultiplied layer onto `dst`.
pub fn over_in_place(dst: &mut [u8], src: &[u8]) -> ScopeResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ScopeError::validation(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    dst.par_chunks_exact_mut(4)
        .zip(src.par_chunks_exact(4))
        .for_each(|(d, s)| {
            let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
            d.copy_from_slice(&out);
        });
    Ok(())
}

/// Builds one output frame: underlay, traces, density images, overlay.
pub struct Compositor {
    size: PlotSize,
    data: Vec<u8>,
}

impl Compositor {
    /// Allocate a transparent target.
    pub fn new(size: PlotSize) -> ScopeResult<Self> {
        let len = size
            .cells()
            .checked_mul(4)
            .ok_or_else(|| ScopeError::exhausted("frame buffer size overflow"))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            ScopeError::exhausted(format!(
                "failed to allocate {}x{} frame: {e}",
                size.width, size.height
            ))
        })?;
        data.resize(len, 0);
        Ok(Self { size, data })
    }

    /// Target size.
    pub fn size(&self) -> PlotSize {
        self.size
    }

    /// Overwrite every pixel with a premultiplied color.
    pub fn clear(&mut self, rgba: PremulRgba8) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Composite a full-plot premultiplied layer (underlay or overlay).
    pub fn draw_layer(&mut self, layer: &[u8]) -> ScopeResult<()> {
        over_in_place(&mut self.data, layer)
    }

    /// Tone-map one trace's intensity buffer and blend it over the frame.
    pub fn draw_trace(&mut self, intensity: &IntensityBuffer, color: Rgb) -> ScopeResult<()> {
        if intensity.size() != self.size {
            return Err(ScopeError::validation(format!(
                "trace buffer is {}x{} but frame is {}x{}",
                intensity.width(),
                intensity.height(),
                self.size.width,
                self.size.height
            )));
        }
        let w = self.size.width as usize;
        self.data
            .par_chunks_exact_mut(w * 4)
            .enumerate()
            .for_each(|(row, line)| {
                for (col, d) in line.chunks_exact_mut(4).enumerate() {
                    let v = intensity.get(col as u32, row as u32);
                    if v <= 0.0 {
                        continue;
                    }
                    let out = over([d[0], d[1], d[2], d[3]], tone_map(v, color));
                    d.copy_from_slice(&out);
                }
            });
        Ok(())
    }

    /// Resample a density image to the plot, tone-map it through its ramp and blend it over.
    pub fn draw_density(&mut self, img: &DensityImage) {
        let (pw, ph) = (self.size.width, self.size.height);
        let w = pw as usize;
        self.data
            .par_chunks_exact_mut(w * 4)
            .enumerate()
            .for_each(|(row, line)| {
                for (col, d) in line.chunks_exact_mut(4).enumerate() {
                    let src = img.sample_for_plot(col as u32, row as u32, pw, ph);
                    if src[3] == 0 {
                        continue;
                    }
                    let out = over([d[0], d[1], d[2], d[3]], src);
                    d.copy_from_slice(&out);
                }
            });
    }

    /// Hand the pixels over.
    pub fn finish(self) -> FrameRGBA {
        FrameRGBA {
            width: self.size.width,
            height: self.size.height,
            data: self.data,
            premultiplied: true,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
