use rayon::prelude::*;

use crate::foundation::error::{ScopeError, ScopeResult};
use crate::geometry::planner::{ConfigBlock, IndexTable, RenderGeometry};
use crate::reduce::intensity::IntensityBuffer;
use crate::reduce::strategy::ReductionStrategy;
use crate::waveform::model::{Samples, Timebase};

/// Default number of pixel columns handled by one worker unit.
pub const DEFAULT_COLUMN_GROUP: u32 = 16;

/// Sample positions of one waveform, seen from the column walkers.
#[derive(Clone, Copy)]
enum Timeline<'a> {
    Dense {
        len: usize,
    },
    Sparse {
        offsets: &'a [i64],
        durations: &'a [i64],
        table: &'a IndexTable,
    },
}

impl Timeline<'_> {
    fn offset(&self, i: usize) -> i64 {
        match self {
            Self::Dense { .. } => i as i64,
            Self::Sparse { offsets, .. } => offsets[i],
        }
    }

    fn end(&self, i: usize) -> i64 {
        match self {
            Self::Dense { .. } => i as i64 + 1,
            Self::Sparse {
                offsets, durations, ..
            } => offsets[i].saturating_add(durations[i]),
        }
    }

    /// First sample a column walker looks at.
    fn first(&self, cfg: &ConfigBlock, col: u32) -> usize {
        match self {
            Self::Dense { len } => {
                let tick = cfg.column_search_tick(col);
                tick.clamp(0, (*len as i64).saturating_sub(1).max(0)) as usize
            }
            Self::Sparse { table, .. } => table.get(col as usize).unwrap_or(0) as usize,
        }
    }
}

struct Walker<'a> {
    cfg: &'a ConfigBlock,
    timeline: Timeline<'a>,
    buffer: &'a IntensityBuffer,
    len: usize,
}

impl Walker<'_> {
    fn x(&self, i: usize) -> f64 {
        self.cfg.x_px(self.timeline.offset(i))
    }

    /// Right end of the interval sample `i` holds: the next sample's start, or its own end.
    fn hold_end(&self, i: usize) -> f64 {
        if i + 1 < self.len {
            self.x(i + 1)
        } else {
            self.cfg.x_px(self.timeline.end(i))
        }
    }

    fn start(&self, col: u32) -> usize {
        self.timeline.first(self.cfg, col).saturating_sub(1)
    }

    /// Does the held interval of sample `i` touch `[c0, c0 + 1)`?
    fn holds_into(&self, i: usize, c0: f64) -> bool {
        let xa = self.x(i);
        xa < c0 + 1.0 && (self.hold_end(i) > c0 || xa >= c0)
    }

    fn interpolated(&self, values: &[f32], col: u32) {
        let alpha = self.cfg.alpha;
        let c0 = f64::from(col);
        let c1 = c0 + 1.0;

        if self.len == 1 {
            let x = self.x(0);
            if x >= c0 && x < c1 {
                let y = self.cfg.y_px(values[0]);
                self.buffer.add_span(col, y, y, alpha);
            }
            return;
        }

        let mut i = self.start(col);
        while i + 1 < self.len {
            let xa = self.x(i);
            if xa >= c1 {
                break;
            }
            let xb = self.x(i + 1);
            if xb >= c0 {
                let ya = self.cfg.y_px(values[i]);
                let yb = self.cfg.y_px(values[i + 1]);
                let (y0, y1) = if xb > xa {
                    let t0 = ((xa.max(c0) - xa) / (xb - xa)) as f32;
                    let t1 = ((xb.min(c1) - xa) / (xb - xa)) as f32;
                    (ya + (yb - ya) * t0, ya + (yb - ya) * t1)
                } else {
                    (ya, yb)
                };
                self.buffer.add_span(col, y0, y1, alpha);
            }
            i += 1;
        }
    }

    fn zero_hold(&self, values: &[f32], col: u32) {
        let alpha = self.cfg.alpha;
        let c0 = f64::from(col);
        let c1 = c0 + 1.0;

        let mut i = self.start(col);
        while i < self.len {
            if self.x(i) >= c1 {
                break;
            }
            let y = self.cfg.y_px(values[i]);
            if self.holds_into(i, c0) {
                self.buffer.add_span(col, y, y, alpha);
            }
            if i + 1 < self.len {
                let xn = self.x(i + 1);
                if xn >= c0 && xn < c1 {
                    let yn = self.cfg.y_px(values[i + 1]);
                    self.riser(col, y, yn, alpha);
                }
            }
            i += 1;
        }
    }

    /// Vertical step between two levels, excluding the rows of the levels themselves.
    fn riser(&self, col: u32, y_from: f32, y_to: f32, alpha: f32) {
        let Some(rows) = self.buffer.rows_between(y_from, y_to) else {
            return;
        };
        let ends = [self.buffer.row_of(y_from), self.buffer.row_of(y_to)];
        for row in rows {
            if !ends.contains(&Some(row)) {
                self.buffer.add(col, row, alpha);
            }
        }
    }

    fn histogram(&self, values: &[f32], col: u32) {
        let c0 = f64::from(col);
        let c1 = c0 + 1.0;

        let mut sum = 0.0f32;
        let mut starts = false;
        let mut covering = None;
        let mut i = self.start(col);
        while i < self.len {
            let xa = self.x(i);
            if xa >= c1 {
                break;
            }
            if xa >= c0 {
                sum += values[i];
                starts = true;
            } else if self.hold_end(i) > c0 {
                covering = Some(values[i]);
            }
            i += 1;
        }

        let v = match (starts, covering) {
            (true, _) => sum,
            (false, Some(v)) => v,
            (false, None) => return,
        };
        self.buffer
            .add_span(col, self.cfg.y_px(0.0), self.cfg.y_px(v), self.cfg.alpha);
    }

    fn digital(&self, bits: &[bool], col: u32) {
        let c0 = f64::from(col);
        let c1 = c0 + 1.0;

        let (mut low, mut high) = (false, false);
        let mut i = self.start(col);
        while i < self.len {
            if self.x(i) >= c1 {
                break;
            }
            if self.holds_into(i, c0) {
                if bits[i] {
                    high = true;
                } else {
                    low = true;
                }
            }
            i += 1;
        }

        let (from, to) = match (low, high) {
            (false, false) => return,
            (true, false) => (0.0, 0.0),
            (false, true) => (1.0, 1.0),
            (true, true) => (0.0, 1.0),
        };
        self.buffer.add_span(
            col,
            self.cfg.y_px(from),
            self.cfg.y_px(to),
            self.cfg.alpha,
        );
    }
}

/// Run one reduction dispatch of `geometry` into `buffer`.
///
/// Column groups of `column_group_width` are processed in parallel on the current rayon pool.
/// Each group first folds the persistence decay (`cell *= persist_scale`) over its own columns
/// and then adds the fresh contribution of every sample that lands in them. The call returns once
/// every group has finished.
#[tracing::instrument(level = "trace", skip_all, fields(strategy = strategy.name()))]
pub fn reduce(
    geometry: &RenderGeometry,
    strategy: ReductionStrategy,
    buffer: &IntensityBuffer,
    column_group_width: u32,
) -> ScopeResult<()> {
    let cfg = &geometry.config;
    if buffer.width() != cfg.plot_width || buffer.height() != cfg.plot_height {
        return Err(ScopeError::validation(format!(
            "intensity buffer is {}x{} but geometry expects {}x{}",
            buffer.width(),
            buffer.height(),
            cfg.plot_width,
            cfg.plot_height
        )));
    }
    if column_group_width == 0 {
        return Err(ScopeError::validation("column_group_width must be >= 1"));
    }

    let wfm = &geometry.waveform;
    let timeline = match (wfm.timebase(), geometry.index.as_ref()) {
        (Timebase::Uniform, _) => Timeline::Dense { len: wfm.len() },
        (Timebase::Sparse { offsets, durations }, Some(table)) => Timeline::Sparse {
            offsets,
            durations,
            table,
        },
        (Timebase::Sparse { .. }, None) => {
            return Err(ScopeError::invalid_geometry(
                "sparse waveform planned without an index table",
            ));
        }
    };
    let walker = Walker {
        cfg,
        timeline,
        buffer,
        len: wfm.len(),
    };

    match (strategy, wfm.samples()) {
        (
            ReductionStrategy::AnalogInterpolated | ReductionStrategy::AnalogDense,
            Samples::Analog(v),
        ) => dispatch(cfg, buffer, column_group_width, |c| walker.interpolated(v, c)),
        (ReductionStrategy::AnalogZeroHold, Samples::Analog(v)) => {
            dispatch(cfg, buffer, column_group_width, |c| walker.zero_hold(v, c))
        }
        (ReductionStrategy::Histogram, Samples::Histogram(v)) => {
            dispatch(cfg, buffer, column_group_width, |c| walker.histogram(v, c))
        }
        (ReductionStrategy::Digital, Samples::Digital(b)) => {
            dispatch(cfg, buffer, column_group_width, |c| walker.digital(b, c))
        }
        (s, samples) => {
            return Err(ScopeError::unsupported(format!(
                "strategy '{}' cannot reduce {} samples",
                s.name(),
                samples.kind_name()
            )));
        }
    }
    Ok(())
}

fn dispatch(
    cfg: &ConfigBlock,
    buffer: &IntensityBuffer,
    group: u32,
    column: impl Fn(u32) + Sync,
) {
    let width = cfg.plot_width;
    let groups = width.div_ceil(group);
    let persist = cfg.persist_scale;
    (0..groups).into_par_iter().for_each(|g| {
        let start = g * group;
        let end = start.saturating_add(group).min(width);
        for c in start..end {
            buffer.decay_column(c, persist);
        }
        for c in start..end {
            column(c);
        }
    });
}

#[cfg(test)]
#[path = "../../tests/unit/reduce/kernels.rs"]
mod tests;
