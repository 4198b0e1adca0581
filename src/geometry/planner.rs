use std::sync::Arc;

use crate::foundation::error::{ScopeError, ScopeResult};
use crate::foundation::math::lower_bound_clamped;
use crate::geometry::view::{TraceRole, ViewWindow};
use crate::waveform::model::Waveform;

/// Guard, in offset units, subtracted from each column's start time before the index search so
/// the reducer also sees samples that begin slightly before the column.
pub const COLUMN_GUARD_TICKS: f64 = 2.0;

/// Per-trace constants consumed by the column reducer.
///
/// Horizontal mapping of sample `i`: `x = (offset[i] - inner_x_offset) * x_scale + x_offset`.
/// The offset subtraction happens in integers so large trigger offsets keep full precision.
/// Vertical mapping of value `v`, in pixels above the bottom edge:
/// `y = (v + y_offset) * y_scale + y_base`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfigBlock {
    /// Whole offset units at the left plot edge.
    pub inner_x_offset: i64,
    /// Fractional part of the left edge, already scaled to pixels (always `<= 0`).
    pub x_offset: f64,
    /// Pixels per offset unit.
    pub x_scale: f64,
    /// Baseline in pixels above the bottom edge.
    pub y_base: f32,
    /// Pixels per value unit.
    pub y_scale: f32,
    /// Value offset applied before scaling.
    pub y_offset: f32,
    /// Intensity added per sample contribution.
    pub alpha: f32,
    /// Decay applied to the previous frame's intensity; `0` discards it.
    pub persist_scale: f32,
    /// Plot width in pixels.
    pub plot_width: u32,
    /// Plot height in pixels.
    pub plot_height: u32,
    /// Number of samples in the waveform.
    pub sample_count: u64,
}

impl ConfigBlock {
    /// X position of an offset, in pixels from the left edge.
    pub fn x_px(&self, offset: i64) -> f64 {
        (offset.wrapping_sub(self.inner_x_offset)) as f64 * self.x_scale + self.x_offset
    }

    /// Y position of a value, in pixels above the bottom edge.
    pub fn y_px(&self, value: f32) -> f32 {
        (value + self.y_offset) * self.y_scale + self.y_base
    }

    /// Smallest offset a sample may have to be considered by column `col`.
    ///
    /// This is the inverse x mapping of the column's left edge, minus [`COLUMN_GUARD_TICKS`].
    pub fn column_search_tick(&self, col: u32) -> i64 {
        let rel = (f64::from(col) - self.x_offset) / self.x_scale;
        self.inner_x_offset
            .saturating_add((rel - COLUMN_GUARD_TICKS).ceil() as i64)
    }
}

/// For each pixel column, the index of the first sample the reducer must look at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexTable(pub Vec<u64>);

impl IndexTable {
    /// Entry for column `col`.
    pub fn get(&self, col: usize) -> Option<u64> {
        self.0.get(col).copied()
    }

    /// Number of columns covered.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Return `true` when the table has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the reducer needs for one trace in one frame.
#[derive(Clone, Debug)]
pub struct RenderGeometry {
    /// Scale/offset constants.
    pub config: ConfigBlock,
    /// Column start indices; `None` for uniformly sampled waveforms.
    pub index: Option<IndexTable>,
    /// The waveform this geometry was computed for.
    pub waveform: Arc<Waveform>,
}

/// Inputs to [`plan_geometry`].
#[derive(Clone, Copy, Debug)]
pub struct PlanRequest<'a> {
    /// Current waveform of the trace, if the channel has data.
    pub waveform: Option<&'a Arc<Waveform>>,
    /// Visible window.
    pub view: &'a ViewWindow,
    /// Vertical placement.
    pub role: TraceRole,
    /// Alpha before density compensation.
    pub base_alpha: f32,
    /// Decay coefficient chosen by the persistence accumulator for this frame.
    pub persist_scale: f32,
    /// Force an index table rebuild even if the cached one is reusable.
    pub full_recompute: bool,
}

/// How the last index table was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexReuse {
    /// Searched every column.
    Rebuilt,
    /// Same waveform and window as last frame.
    Reused,
    /// Pure pan by a whole number of columns; only exposed columns were searched.
    Shifted {
        /// Columns moved (positive: view moved right in time).
        columns: i64,
    },
}

/// Cached index table of one trace, reused across frames when the geometry is unchanged.
#[derive(Debug, Default)]
pub struct IndexCache {
    key: Option<CacheKey>,
    table: IndexTable,
    last_reuse: Option<IndexReuse>,
}

#[derive(Debug, Clone)]
struct CacheKey {
    waveform: Arc<Waveform>,
    view: ViewWindow,
}

impl IndexCache {
    /// Drop the cached table.
    pub fn invalidate(&mut self) {
        self.key = None;
        self.table.0.clear();
    }

    /// How the most recent sparse plan obtained its table.
    pub fn last_reuse(&self) -> Option<IndexReuse> {
        self.last_reuse
    }
}

/// Density-compensated alpha: `min(1, base / sqrt(samples_per_pixel)) * 2`.
///
/// Keeps a column that aggregates 100k samples visually comparable to one holding a single
/// sample. The constants are empirical display tuning.
pub fn effective_alpha(base_alpha: f32, samples_per_pixel: f64) -> f32 {
    if !samples_per_pixel.is_finite() || samples_per_pixel <= 0.0 {
        return (base_alpha.min(1.0) * 2.0).max(0.0);
    }
    let a = f64::from(base_alpha) / samples_per_pixel.sqrt();
    (a.min(1.0) * 2.0) as f32
}

/// Compute the reducer constants (and, for sparse data, the index table) for one trace.
///
/// Fails with [`ScopeError::InvalidGeometry`] when the trace cannot be drawn this frame; the
/// caller skips the trace.
#[tracing::instrument(level = "trace", skip_all, fields(full = req.full_recompute))]
pub fn plan_geometry(req: &PlanRequest<'_>, cache: &mut IndexCache) -> ScopeResult<RenderGeometry> {
    let Some(wfm) = req.waveform else {
        return Err(ScopeError::invalid_geometry("channel has no waveform"));
    };
    if wfm.is_empty() {
        return Err(ScopeError::invalid_geometry("waveform is empty"));
    }
    if wfm.timescale() <= 0 {
        return Err(ScopeError::invalid_geometry(format!(
            "timescale must be > 0 (got {})",
            wfm.timescale()
        )));
    }
    let view = req.view;
    if view.is_degenerate() {
        return Err(ScopeError::invalid_geometry("degenerate view window"));
    }

    let timescale = wfm.timescale();
    let left = view.x_axis_offset.saturating_sub(wfm.trigger_phase());
    let inner_x_offset = left.div_euclid(timescale);
    let frac_ticks = left.rem_euclid(timescale) as f64 / timescale as f64;
    let x_scale = view.pixels_per_x_unit * timescale as f64;
    if !x_scale.is_finite() || x_scale <= 0.0 {
        return Err(ScopeError::invalid_geometry("horizontal scale overflow"));
    }

    let spacing = wfm.average_spacing_ticks() * timescale as f64;
    let samples_per_pixel = 1.0 / (view.pixels_per_x_unit * spacing);

    let (y_base, y_scale, y_offset) = match req.role {
        TraceRole::Primary => (view.plot.height as f32 / 2.0, view.y_scale, view.y_offset),
        TraceRole::Overlay {
            lane_base_px,
            lane_height_px,
        } => (lane_base_px, lane_height_px, 0.0),
    };

    let config = ConfigBlock {
        inner_x_offset,
        x_offset: -frac_ticks * x_scale,
        x_scale,
        y_base,
        y_scale,
        y_offset,
        alpha: effective_alpha(req.base_alpha, samples_per_pixel),
        persist_scale: req.persist_scale.clamp(0.0, 1.0),
        plot_width: view.plot.width,
        plot_height: view.plot.height,
        sample_count: wfm.len() as u64,
    };

    let index = match wfm.sparse_offsets() {
        None => None,
        Some(offsets) => Some(index_table(
            &config,
            offsets,
            wfm,
            view,
            req.full_recompute,
            cache,
        )),
    };

    Ok(RenderGeometry {
        config,
        index,
        waveform: Arc::clone(wfm),
    })
}

fn index_table(
    config: &ConfigBlock,
    offsets: &[i64],
    wfm: &Arc<Waveform>,
    view: &ViewWindow,
    full_recompute: bool,
    cache: &mut IndexCache,
) -> IndexTable {
    let width = config.plot_width as usize;
    let search =
        |col: usize| lower_bound_clamped(offsets, config.column_search_tick(col as u32)) as u64;

    let reuse = match &cache.key {
        Some(key)
            if !full_recompute
                && Arc::ptr_eq(&key.waveform, wfm)
                && key.view.same_zoom(view) =>
        {
            let moved = view.x_axis_offset.wrapping_sub(key.view.x_axis_offset);
            let delta_px = moved as f64 * view.pixels_per_x_unit;
            let cols = delta_px.round();
            if moved == 0 {
                IndexReuse::Reused
            } else if cols != 0.0 && (delta_px - cols).abs() <= 1e-9 && cols.abs() < width as f64
            {
                IndexReuse::Shifted {
                    columns: cols as i64,
                }
            } else {
                IndexReuse::Rebuilt
            }
        }
        _ => IndexReuse::Rebuilt,
    };

    let table = match reuse {
        IndexReuse::Reused => cache.table.clone(),
        IndexReuse::Shifted { columns } => {
            let old = &cache.table.0;
            let out: Vec<u64> = (0..width)
                .map(|c| {
                    let src = c as i64 + columns;
                    if src >= 0 && (src as usize) < old.len() {
                        old[src as usize]
                    } else {
                        search(c)
                    }
                })
                .collect();
            IndexTable(out)
        }
        IndexReuse::Rebuilt => IndexTable((0..width).map(search).collect()),
    };

    tracing::trace!(?reuse, columns = width, "index table ready");
    cache.key = Some(CacheKey {
        waveform: Arc::clone(wfm),
        view: *view,
    });
    cache.table = table.clone();
    cache.last_reuse = Some(reuse);
    table
}

#[cfg(test)]
#[path = "../../tests/unit/geometry/planner.rs"]
mod tests;
