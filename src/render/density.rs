use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::foundation::error::{ScopeError, ScopeResult};
use crate::render::ramp::ColorRamp;

/// Whole-plot visualizations that skip per-column reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityKind {
    /// Overlaid unit intervals binned into a 2-D hit count.
    EyeDiagram,
    /// Time/frequency power image.
    Spectrogram,
    /// Scrolling history of spectra, newest row on top.
    Waterfall,
}

/// Values mapped onto the two ends of the color ramp.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DensityRange {
    /// Value drawn with the first opaque ramp entry.
    pub min: f32,
    /// Value drawn with the last ramp entry.
    pub max: f32,
}

impl DensityRange {
    fn normalize(self, v: f32) -> f32 {
        let span = self.max - self.min;
        if span > 0.0 {
            (v - self.min) / span
        } else if v > self.min {
            1.0
        } else {
            0.0
        }
    }
}

/// A precomputed 2-D density buffer drawn straight onto the plot.
///
/// `values` is row-major with row `0` at the top. Cells at or below `range.min` and NaN cells are
/// transparent.
#[derive(Clone, Debug)]
pub struct DensityImage {
    kind: DensityKind,
    width: u32,
    height: u32,
    values: Vec<f32>,
    ramp: ColorRamp,
    range: DensityRange,
}

impl DensityImage {
    /// Build an image; `values.len()` must equal `width * height`.
    pub fn new(
        kind: DensityKind,
        width: u32,
        height: u32,
        values: Vec<f32>,
        ramp: ColorRamp,
        range: DensityRange,
    ) -> ScopeResult<Self> {
        if width == 0 || height == 0 {
            return Err(ScopeError::validation("density image must be non-empty"));
        }
        let expected = (width as usize).saturating_mul(height as usize);
        if values.len() != expected {
            return Err(ScopeError::validation(format!(
                "density image {width}x{height} needs {expected} values, got {}",
                values.len()
            )));
        }
        if !range.min.is_finite() || !range.max.is_finite() || range.max < range.min {
            return Err(ScopeError::validation(format!(
                "invalid density range [{}, {}]",
                range.min, range.max
            )));
        }
        Ok(Self {
            kind,
            width,
            height,
            values,
            ramp,
            range,
        })
    }

    /// Visualization kind.
    pub fn kind(&self) -> DensityKind {
        self.kind
    }

    /// Source width in cells.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Source height in cells.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Ramp used for tone mapping.
    pub fn ramp(&self) -> &ColorRamp {
        &self.ramp
    }

    /// Tone-mapped color of one source cell; transparent outside the grid.
    pub fn cell_color(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let Some(&v) = self
            .values
            .get(y as usize * self.width as usize + x as usize)
        else {
            return [0; 4];
        };
        if v.is_nan() || v <= self.range.min {
            return [0; 4];
        }
        let t = self.range.normalize(v).max(1.0 / 255.0);
        self.ramp.sample(t).to_array()
    }

    /// Nearest-neighbour sample for plot pixel `(col, row)` of a `plot_w x plot_h` plot.
    pub fn sample_for_plot(&self, col: u32, row: u32, plot_w: u32, plot_h: u32) -> [u8; 4] {
        if plot_w == 0 || plot_h == 0 {
            return [0; 4];
        }
        let sx = (u64::from(col) * u64::from(self.width) / u64::from(plot_w))
            .min(u64::from(self.width - 1)) as u32;
        let sy = (u64::from(row) * u64::from(self.height) / u64::from(plot_h))
            .min(u64::from(self.height - 1)) as u32;
        self.cell_color(sx, sy)
    }
}

/// Rolling history of spectra for [`DensityKind::Waterfall`].
#[derive(Clone, Debug)]
pub struct WaterfallScroller {
    width: u32,
    depth: u32,
    rows: VecDeque<Vec<f32>>,
}

impl WaterfallScroller {
    /// Scroller for spectra of `width` bins keeping `depth` rows.
    pub fn new(width: u32, depth: u32) -> ScopeResult<Self> {
        if width == 0 || depth == 0 {
            return Err(ScopeError::validation(
                "waterfall width and depth must be > 0",
            ));
        }
        Ok(Self {
            width,
            depth,
            rows: VecDeque::with_capacity(depth as usize),
        })
    }

    /// Rows currently held.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Return `true` before the first row is pushed.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Push the newest spectrum; the oldest row falls off once `depth` rows are held.
    pub fn push_row(&mut self, spectrum: &[f32]) -> ScopeResult<()> {
        if spectrum.len() != self.width as usize {
            return Err(ScopeError::validation(format!(
                "waterfall expects {} bins, got {}",
                self.width,
                spectrum.len()
            )));
        }
        if self.rows.len() == self.depth as usize {
            self.rows.pop_back();
        }
        self.rows.push_front(spectrum.to_vec());
        Ok(())
    }

    /// Current history as an image, newest row on top; rows not yet filled are transparent.
    pub fn to_image(&self, ramp: ColorRamp, range: DensityRange) -> ScopeResult<DensityImage> {
        let mut values = Vec::with_capacity(self.width as usize * self.depth as usize);
        for row in &self.rows {
            values.extend_from_slice(row);
        }
        values.resize(self.width as usize * self.depth as usize, f32::NAN);
        DensityImage::new(
            DensityKind::Waterfall,
            self.width,
            self.depth,
            values,
            ramp,
            range,
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/density.rs"]
mod tests;
