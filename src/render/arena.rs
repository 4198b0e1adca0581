use std::collections::HashMap;

use crate::foundation::core::{PlotSize, TraceId};
use crate::foundation::error::{ScopeError, ScopeResult};
use crate::geometry::planner::IndexCache;
use crate::reduce::intensity::IntensityBuffer;

/// Per-trace compute resources.
#[derive(Debug)]
pub struct TraceSlot {
    /// Accumulated intensity, persists across frames.
    pub intensity: IntensityBuffer,
    /// Cached column index table for sparse waveforms.
    pub index_cache: IndexCache,
}

/// Allocation counters of a [`TraceArena`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArenaStats {
    /// Slots currently alive.
    pub live_slots: usize,
    /// Bytes held by live intensity buffers.
    pub live_bytes: usize,
    /// Slots created since construction.
    pub created: u64,
    /// Slots destroyed since construction.
    pub destroyed: u64,
    /// Intensity buffers reallocated for a new plot size.
    pub resized: u64,
}

struct Entry {
    trace: TraceId,
    slot: TraceSlot,
}

/// Arena of per-trace resources keyed by [`TraceId`].
///
/// Lifecycle is explicit: [`TraceArena::create`] when a trace is added, [`TraceArena::destroy`]
/// when it is removed. Freed positions are reused by later traces.
#[derive(Default)]
pub struct TraceArena {
    stats: ArenaStats,

    // Lookup happens per trace per frame, never per sample.
    idx_by_trace: HashMap<TraceId, usize>,
    entries: Vec<Option<Entry>>,
    free: Vec<usize>,
}

impl TraceArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counters.
    pub fn stats(&self) -> ArenaStats {
        self.stats.clone()
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.idx_by_trace.len()
    }

    /// Return `true` when no slot is alive.
    pub fn is_empty(&self) -> bool {
        self.idx_by_trace.is_empty()
    }

    /// Return `true` when `trace` has a slot.
    pub fn contains(&self, trace: TraceId) -> bool {
        self.idx_by_trace.contains_key(&trace)
    }

    /// Allocate resources for `trace`.
    ///
    /// Fails with [`ScopeError::Validation`] if the trace already has a slot, and with
    /// [`ScopeError::ResourceExhaustion`] if the intensity buffer cannot be allocated.
    pub fn create(&mut self, trace: TraceId, plot: PlotSize) -> ScopeResult<()> {
        if self.contains(trace) {
            return Err(ScopeError::validation(format!(
                "trace {} already has resources",
                trace.0
            )));
        }
        let intensity = IntensityBuffer::new(plot)?;
        let bytes = intensity.byte_len();
        let entry = Entry {
            trace,
            slot: TraceSlot {
                intensity,
                index_cache: IndexCache::default(),
            },
        };
        let i = match self.free.pop() {
            Some(i) => {
                self.entries[i] = Some(entry);
                i
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };
        self.idx_by_trace.insert(trace, i);

        self.stats.created = self.stats.created.saturating_add(1);
        self.stats.live_slots = self.idx_by_trace.len();
        self.stats.live_bytes = self.stats.live_bytes.saturating_add(bytes);
        tracing::debug!(trace = trace.0, slot = i, bytes, "trace resources created");
        Ok(())
    }

    /// Release the resources of `trace`; returns `false` if it had none.
    pub fn destroy(&mut self, trace: TraceId) -> bool {
        let Some(i) = self.idx_by_trace.remove(&trace) else {
            return false;
        };
        if let Some(entry) = self.entries[i].take() {
            self.stats.live_bytes = self
                .stats
                .live_bytes
                .saturating_sub(entry.slot.intensity.byte_len());
        }
        self.free.push(i);
        self.stats.destroyed = self.stats.destroyed.saturating_add(1);
        self.stats.live_slots = self.idx_by_trace.len();
        tracing::debug!(trace = trace.0, slot = i, "trace resources destroyed");
        true
    }

    /// Resources of `trace`.
    pub fn get(&self, trace: TraceId) -> Option<&TraceSlot> {
        let i = *self.idx_by_trace.get(&trace)?;
        self.entries[i].as_ref().map(|e| &e.slot)
    }

    /// Mutable resources of `trace`.
    pub fn get_mut(&mut self, trace: TraceId) -> Option<&mut TraceSlot> {
        let i = *self.idx_by_trace.get(&trace)?;
        self.entries[i].as_mut().map(|e| &mut e.slot)
    }

    /// Reallocate the intensity buffer of `trace` for a new plot size.
    ///
    /// The buffer starts zeroed and the index cache is dropped. A no-op when the size is
    /// unchanged.
    pub fn resize(&mut self, trace: TraceId, plot: PlotSize) -> ScopeResult<()> {
        let Some(slot) = self.get_mut(trace) else {
            return Err(ScopeError::validation(format!(
                "trace {} has no resources",
                trace.0
            )));
        };
        if slot.intensity.size() == plot {
            return Ok(());
        }
        let fresh = IntensityBuffer::new(plot)?;
        let old_bytes = slot.intensity.byte_len();
        let new_bytes = fresh.byte_len();
        slot.intensity = fresh;
        slot.index_cache.invalidate();

        self.stats.resized = self.stats.resized.saturating_add(1);
        self.stats.live_bytes = self
            .stats
            .live_bytes
            .saturating_sub(old_bytes)
            .saturating_add(new_bytes);
        Ok(())
    }

    /// Mutable access to every live slot, for disjoint per-trace work.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TraceId, &mut TraceSlot)> {
        self.entries
            .iter_mut()
            .flatten()
            .map(|e| (e.trace, &mut e.slot))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/arena.rs"]
mod tests;
