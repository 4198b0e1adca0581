use serde::{Deserialize, Serialize};

use crate::foundation::core::PlotSize;

/// The visible window of a plot.
///
/// X units are femtoseconds; Y units are the waveform's value units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewWindow {
    /// Horizontal zoom: pixels per femtosecond.
    pub pixels_per_x_unit: f64,
    /// Time at the left edge of the plot, femtoseconds.
    pub x_axis_offset: i64,
    /// Plot area in pixels.
    pub plot: PlotSize,
    /// Value added to every sample before scaling.
    #[serde(default)]
    pub y_offset: f32,
    /// Vertical zoom: pixels per value unit.
    pub y_scale: f32,
}

impl ViewWindow {
    /// Return `true` when the window maps time onto at least one pixel.
    pub fn is_degenerate(&self) -> bool {
        self.plot.is_degenerate()
            || !self.pixels_per_x_unit.is_finite()
            || self.pixels_per_x_unit <= 0.0
            || !self.y_scale.is_finite()
            || !self.y_offset.is_finite()
    }

    /// Same zoom and plot size, ignoring horizontal position.
    pub fn same_zoom(&self, other: &Self) -> bool {
        self.pixels_per_x_unit.to_bits() == other.pixels_per_x_unit.to_bits()
            && self.plot == other.plot
    }
}

/// How a trace is placed vertically.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum TraceRole {
    /// Main trace of the plot, centred vertically and scaled by the view window.
    #[default]
    Primary,
    /// Annotation lane (digital bus, filter output) drawn in a fixed band of the plot.
    ///
    /// Values are normalized: `0.0` sits on `lane_base_px`, `1.0` is `lane_height_px` above it.
    Overlay {
        /// Lane baseline, pixels above the bottom edge.
        lane_base_px: f32,
        /// Lane height in pixels.
        lane_height_px: f32,
    },
}
