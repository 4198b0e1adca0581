//! Vector annotation layers drawn on the CPU with `vello_cpu`.
//!
//! An [`AnnotationPainter`] contributes to two full-plot layers per frame: the underlay (drawn
//! before any trace) and the overlay (drawn after everything else). Coordinates are plot pixels
//! with the origin at the top-left corner.

use serde::{Deserialize, Serialize};

use crate::foundation::core::{BezPath, PlotSize, Point, Rect, Rgb};
use crate::foundation::error::{ScopeError, ScopeResult};
use crate::geometry::view::ViewWindow;

/// Alpha of minor grid lines.
pub const GRID_ALPHA: u8 = 0x60;

/// One full-plot raster target.
pub struct VectorLayer {
    ctx: vello_cpu::RenderContext,
    size: PlotSize,
    commands: usize,
}

impl VectorLayer {
    /// Layer covering `size`; both dimensions must fit in `u16`.
    pub fn new(size: PlotSize) -> ScopeResult<Self> {
        if size.is_degenerate() {
            return Err(ScopeError::validation("annotation layer needs a non-empty plot"));
        }
        let w: u16 = size.width.try_into().map_err(|_| {
            ScopeError::validation(format!("plot width exceeds u16: {}", size.width))
        })?;
        let h: u16 = size.height.try_into().map_err(|_| {
            ScopeError::validation(format!("plot height exceeds u16: {}", size.height))
        })?;
        let mut ctx = vello_cpu::RenderContext::new(w, h);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(Self {
            ctx,
            size,
            commands: 0,
        })
    }

    /// Layer size.
    pub fn size(&self) -> PlotSize {
        self.size
    }

    /// Return `true` while nothing has been drawn.
    pub fn is_empty(&self) -> bool {
        self.commands == 0
    }

    /// Fill a rectangle with a straight-alpha color.
    pub fn fill_rect(&mut self, rect: Rect, rgba: [u8; 4]) {
        self.set_color(rgba);
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            rect.x0, rect.y0, rect.x1, rect.y1,
        ));
        self.commands += 1;
    }

    /// Fill a closed path with a straight-alpha color.
    pub fn fill_path(&mut self, path: &BezPath, rgba: [u8; 4]) {
        self.set_color(rgba);
        self.ctx.fill_path(&bezpath_to_cpu(path));
        self.commands += 1;
    }

    /// One-pixel horizontal line across the plot at top-down `y`.
    pub fn hline(&mut self, y: f64, rgba: [u8; 4]) {
        let y = y.floor();
        self.fill_rect(Rect::new(0.0, y, f64::from(self.size.width), y + 1.0), rgba);
    }

    /// One-pixel vertical line across the plot at `x`.
    pub fn vline(&mut self, x: f64, rgba: [u8; 4]) {
        let x = x.floor();
        self.fill_rect(Rect::new(x, 0.0, x + 1.0, f64::from(self.size.height)), rgba);
    }

    /// Rasterize into premultiplied RGBA8 bytes.
    pub fn render(mut self) -> Vec<u8> {
        let mut pixmap = vello_cpu::Pixmap::new(self.ctx.width(), self.ctx.height());
        self.ctx.flush();
        self.ctx.render_to_pixmap(&mut pixmap);
        pixmap.data_as_u8_slice().to_vec()
    }

    fn set_color(&mut self, [r, g, b, a]: [u8; 4]) {
        self.ctx
            .set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
    }
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let p = |p: Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(a) => out.move_to(p(a)),
            PathEl::LineTo(a) => out.line_to(p(a)),
            PathEl::QuadTo(a, b) => out.quad_to(p(a), p(b)),
            PathEl::CurveTo(a, b, c) => out.curve_to(p(a), p(b), p(c)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

/// External drawing collaborator contributing to the annotation layers.
pub trait AnnotationPainter {
    /// Draw opaque background content (gradient, grid, trigger markers).
    fn paint_underlay(&self, _layer: &mut VectorLayer, _view: &ViewWindow) -> ScopeResult<()> {
        Ok(())
    }

    /// Draw foreground content (cursors, markers).
    fn paint_overlay(&self, _layer: &mut VectorLayer, _view: &ViewWindow) -> ScopeResult<()> {
        Ok(())
    }
}

/// Ordered set of painters for one plot.
#[derive(Default)]
pub struct Annotations {
    painters: Vec<Box<dyn AnnotationPainter>>,
}

impl Annotations {
    /// No painters: the frame background stays opaque black.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Annotations::push`].
    pub fn with(mut self, painter: impl AnnotationPainter + 'static) -> Self {
        self.push(Box::new(painter));
        self
    }

    /// Append a painter; painters draw in insertion order.
    pub fn push(&mut self, painter: Box<dyn AnnotationPainter>) {
        self.painters.push(painter);
    }

    /// Number of painters.
    pub fn len(&self) -> usize {
        self.painters.len()
    }

    /// Return `true` when no painter is registered.
    pub fn is_empty(&self) -> bool {
        self.painters.is_empty()
    }

    /// Rasterized underlay, or `None` when nothing was drawn.
    pub fn render_underlay(&self, view: &ViewWindow) -> ScopeResult<Option<Vec<u8>>> {
        self.render_with(view, |p, layer| p.paint_underlay(layer, view))
    }

    /// Rasterized overlay, or `None` when nothing was drawn.
    pub fn render_overlay(&self, view: &ViewWindow) -> ScopeResult<Option<Vec<u8>>> {
        self.render_with(view, |p, layer| p.paint_overlay(layer, view))
    }

    fn render_with(
        &self,
        view: &ViewWindow,
        mut paint: impl FnMut(&dyn AnnotationPainter, &mut VectorLayer) -> ScopeResult<()>,
    ) -> ScopeResult<Option<Vec<u8>>> {
        if self.painters.is_empty() {
            return Ok(None);
        }
        let mut layer = VectorLayer::new(view.plot)?;
        for p in &self.painters {
            paint(p.as_ref(), &mut layer)?;
        }
        if layer.is_empty() {
            return Ok(None);
        }
        Ok(Some(layer.render()))
    }
}

/// X pixel of an absolute time (fs).
fn x_for_time(view: &ViewWindow, t_fs: i64) -> f64 {
    t_fs.saturating_sub(view.x_axis_offset) as f64 * view.pixels_per_x_unit
}

/// Top-down y pixel of a primary-trace value.
fn y_for_value(view: &ViewWindow, v: f32) -> f64 {
    let h = f64::from(view.plot.height);
    h - (f64::from(v + view.y_offset) * f64::from(view.y_scale) + h / 2.0)
}

fn rgba(c: Rgb, a: u8) -> [u8; 4] {
    let p = c.to_rgba8_premul();
    [p.r, p.g, p.b, a]
}

/// Background gradient, division grid and trigger marker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Graticule {
    /// Background color at the top edge.
    pub background_top: Rgb,
    /// Background color at the bottom edge.
    pub background_bottom: Rgb,
    /// Grid line color.
    pub grid_color: Rgb,
    /// Horizontal and vertical division counts.
    pub divisions: [u32; 2],
    /// Draw a marker at time zero on the top edge.
    pub trigger_marker: bool,
}

impl AnnotationPainter for Graticule {
    fn paint_underlay(&self, layer: &mut VectorLayer, view: &ViewWindow) -> ScopeResult<()> {
        let PlotSize { width, height } = layer.size();
        let (w, h) = (f64::from(width), f64::from(height));

        let last = height.saturating_sub(1).max(1) as f32;
        for row in 0..height {
            let c = self
                .background_top
                .lerp(self.background_bottom, row as f32 / last);
            layer.fill_rect(Rect::new(0.0, f64::from(row), w, f64::from(row) + 1.0), rgba(c, 255));
        }

        let grid = rgba(self.grid_color, GRID_ALPHA);
        let [dx, dy] = self.divisions;
        for i in 1..dx {
            layer.vline(w * f64::from(i) / f64::from(dx), grid);
        }
        for i in 1..dy {
            layer.hline(h * f64::from(i) / f64::from(dy), grid);
        }

        if self.trigger_marker {
            let x = x_for_time(view, 0);
            if (0.0..w).contains(&x) {
                let mut tri = BezPath::new();
                tri.move_to((x - 4.0, 0.0));
                tri.line_to((x + 4.0, 0.0));
                tri.line_to((x, 6.0));
                tri.close_path();
                layer.fill_path(&tri, rgba(self.grid_color, 255));
            }
        }
        Ok(())
    }
}

/// A labelled extremum on the primary trace.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakMarker {
    /// Time of the peak, fs.
    pub time_fs: i64,
    /// Value at the peak.
    pub value: f32,
}

/// Time/value cursors and peak markers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorOverlay {
    /// Cursor and marker color.
    pub color: Rgb,
    /// Vertical cursors at absolute times, fs.
    #[serde(default)]
    pub time_cursors: Vec<i64>,
    /// Horizontal cursors at primary-trace values.
    #[serde(default)]
    pub value_cursors: Vec<f32>,
    /// Peak markers.
    #[serde(default)]
    pub peaks: Vec<PeakMarker>,
}

impl AnnotationPainter for CursorOverlay {
    fn paint_overlay(&self, layer: &mut VectorLayer, view: &ViewWindow) -> ScopeResult<()> {
        let c = rgba(self.color, 255);
        let PlotSize { width, height } = layer.size();
        let (w, h) = (f64::from(width), f64::from(height));

        for &t in &self.time_cursors {
            let x = x_for_time(view, t);
            if (0.0..w).contains(&x) {
                layer.vline(x, c);
            }
        }
        for &v in &self.value_cursors {
            let y = y_for_value(view, v);
            if (0.0..h).contains(&y) {
                layer.hline(y, c);
            }
        }
        for peak in &self.peaks {
            let x = x_for_time(view, peak.time_fs);
            let y = y_for_value(view, peak.value);
            if !(0.0..w).contains(&x) || !(0.0..h).contains(&y) {
                continue;
            }
            let mut diamond = BezPath::new();
            diamond.move_to((x, y - 3.0));
            diamond.line_to((x + 3.0, y));
            diamond.line_to((x, y + 3.0));
            diamond.line_to((x - 3.0, y));
            diamond.close_path();
            layer.fill_path(&diamond, c);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/annotate.rs"]
mod tests;
