use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::foundation::core::PlotSize;
use crate::foundation::error::{ScopeError, ScopeResult};

/// Per-trace `width x height` accumulator of sample density.
///
/// Cells are `f32` stored as bits in `AtomicU32` so any number of column workers can add into the
/// same buffer through a shared reference. Row `0` is the top of the plot; callers address rows by
/// y position in pixels above the bottom edge through [`IntensityBuffer::rows_between`].
///
/// Workers only use relaxed ordering; the join of the parallel dispatch is the barrier that makes
/// their writes visible to the compositor.
#[derive(Debug)]
pub struct IntensityBuffer {
    size: PlotSize,
    cells: Vec<AtomicU32>,
}

impl IntensityBuffer {
    /// Allocate a zeroed buffer.
    ///
    /// Allocation is fallible: a failed reservation is reported as
    /// [`ScopeError::ResourceExhaustion`] instead of aborting inside the allocator.
    pub fn new(size: PlotSize) -> ScopeResult<Self> {
        if size.is_degenerate() {
            return Err(ScopeError::validation(
                "intensity buffer needs a non-empty plot",
            ));
        }
        let n = (size.width as usize)
            .checked_mul(size.height as usize)
            .ok_or_else(|| {
                ScopeError::exhausted(format!(
                    "intensity buffer {}x{} overflows usize",
                    size.width, size.height
                ))
            })?;
        let mut cells = Vec::new();
        cells.try_reserve_exact(n).map_err(|e| {
            ScopeError::exhausted(format!(
                "failed to allocate {}x{} intensity buffer: {e}",
                size.width, size.height
            ))
        })?;
        cells.resize_with(n, || AtomicU32::new(0));
        Ok(Self { size, cells })
    }

    /// Plot size this buffer covers.
    pub fn size(&self) -> PlotSize {
        self.size
    }

    /// Number of pixel columns.
    pub fn width(&self) -> u32 {
        self.size.width
    }

    /// Number of pixel rows.
    pub fn height(&self) -> u32 {
        self.size.height
    }

    /// Bytes held by the cells.
    pub fn byte_len(&self) -> usize {
        self.cells.len().saturating_mul(std::mem::size_of::<AtomicU32>())
    }

    fn index(&self, col: u32, row: u32) -> Option<usize> {
        (col < self.size.width && row < self.size.height)
            .then(|| row as usize * self.size.width as usize + col as usize)
    }

    /// Atomically add `v` to a cell. Out-of-range cells are ignored.
    pub fn add(&self, col: u32, row: u32, v: f32) {
        let Some(i) = self.index(col, row) else {
            return;
        };
        let cell = &self.cells[i];
        let mut cur = cell.load(Ordering::Relaxed);
        loop {
            let next = (f32::from_bits(cur) + v).to_bits();
            match cell.compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Current value of a cell (`0.0` when out of range).
    pub fn get(&self, col: u32, row: u32) -> f32 {
        self.index(col, row)
            .map(|i| f32::from_bits(self.cells[i].load(Ordering::Relaxed)))
            .unwrap_or(0.0)
    }

    /// Overwrite every cell with `v`.
    pub fn fill(&self, v: f32) {
        let bits = v.to_bits();
        for cell in &self.cells {
            cell.store(bits, Ordering::Relaxed);
        }
    }

    /// Multiply every cell of one column by `factor`; a factor `<= 0` clears the column.
    pub fn decay_column(&self, col: u32, factor: f32) {
        if col >= self.size.width || factor == 1.0 {
            return;
        }
        let w = self.size.width as usize;
        for row in 0..self.size.height as usize {
            let cell = &self.cells[row * w + col as usize];
            if factor <= 0.0 {
                cell.store(0, Ordering::Relaxed);
            } else {
                let v = f32::from_bits(cell.load(Ordering::Relaxed)) * factor;
                cell.store(v.to_bits(), Ordering::Relaxed);
            }
        }
    }

    /// Row-major copy of all cells.
    pub fn to_vec(&self) -> Vec<f32> {
        self.cells
            .iter()
            .map(|c| f32::from_bits(c.load(Ordering::Relaxed)))
            .collect()
    }

    /// Sum of one column.
    pub fn column_sum(&self, col: u32) -> f32 {
        (0..self.size.height).map(|row| self.get(col, row)).sum()
    }

    /// Row holding a y position (pixels above the bottom edge), if it lies on the plot.
    pub fn row_of(&self, y: f32) -> Option<u32> {
        self.rows_between(y, y).map(|r| *r.start())
    }

    /// Rows covered by the vertical span between two y positions, clipped to the plot.
    ///
    /// `y` in `[k, k + 1)` maps to row `height - 1 - k`. Returns `None` when the span lies
    /// entirely off the plot or either end is not finite.
    pub fn rows_between(&self, y_a: f32, y_b: f32) -> Option<RangeInclusive<u32>> {
        if !y_a.is_finite() || !y_b.is_finite() {
            return None;
        }
        let (lo, hi) = if y_a <= y_b { (y_a, y_b) } else { (y_b, y_a) };
        let h = self.size.height as f32;
        if hi < 0.0 || lo > h {
            return None;
        }
        let top = i64::from(self.size.height) - 1;
        let k_lo = (lo.floor() as i64).clamp(0, top);
        let k_hi = (hi.floor() as i64).clamp(0, top);
        Some((top - k_hi) as u32..=(top - k_lo) as u32)
    }

    /// Add `v` to every row between two y positions in one column.
    pub fn add_span(&self, col: u32, y_a: f32, y_b: f32, v: f32) {
        if let Some(rows) = self.rows_between(y_a, y_b) {
            for row in rows {
                self.add(col, row, v);
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/reduce/intensity.rs"]
mod tests;
