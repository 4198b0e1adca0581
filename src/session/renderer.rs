use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::foundation::core::{ChannelId, Rgb, TraceId};
use crate::foundation::error::{ScopeError, ScopeResult};
use crate::geometry::planner::{PlanRequest, RenderGeometry, plan_geometry};
use crate::geometry::view::{TraceRole, ViewWindow};
use crate::persistence::accumulator::{
    BlendMode, ClearReason, PersistenceSettings, PersistenceState,
};
use crate::reduce::kernels::reduce;
use crate::reduce::strategy::ReductionStrategy;
use crate::render::annotate::Annotations;
use crate::render::arena::{ArenaStats, TraceArena};
use crate::render::compositor::Compositor;
use crate::render::density::DensityImage;
use crate::render::frame::FrameRGBA;
use crate::session::opts::RendererOpts;
use crate::waveform::model::Waveform;
use crate::waveform::store::ChannelStore;

/// Opaque black drawn beneath everything when no underlay painter is registered.
const BACKDROP: [u8; 4] = [0, 0, 0, 255];

/// Display settings of one trace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceStyle {
    /// Trace color.
    pub color: Rgb,
    /// Multiplier on the renderer's base alpha.
    #[serde(default = "default_alpha")]
    pub alpha: f32,
    /// Hold each analog sample flat instead of interpolating.
    #[serde(default)]
    pub zero_hold: bool,
    /// Keep decayed intensity across frames.
    #[serde(default)]
    pub persistence: bool,
    /// Per-trace decay; falls back to [`RendererOpts::persistence_decay`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay: Option<f32>,
}

fn default_alpha() -> f32 {
    1.0
}

impl TraceStyle {
    /// Opaque style with interpolation and no persistence.
    pub fn new(color: Rgb) -> Self {
        Self {
            color,
            alpha: 1.0,
            zero_hold: false,
            persistence: false,
            decay: None,
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> ScopeResult<()> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(ScopeError::validation("trace alpha must be finite and >= 0"));
        }
        if let Some(decay) = self.decay
            && !(0.0..=1.0).contains(&decay)
        {
            return Err(ScopeError::validation("trace decay must be within [0, 1]"));
        }
        Ok(())
    }
}

/// A trace to draw: which channel, where, and how.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceSpec {
    /// Trace id, unique per renderer.
    pub id: TraceId,
    /// Channel whose current waveform is drawn.
    pub channel: ChannelId,
    /// Vertical placement.
    #[serde(default)]
    pub role: TraceRole,
    /// Display settings.
    pub style: TraceStyle,
}

/// Outcome counters of one [`ScopeRenderer::render_frame`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Traces registered.
    pub traces_total: usize,
    /// Traces reduced this frame.
    pub traces_rendered: usize,
    /// Traces skipped (invalid geometry or unsupported variant).
    pub traces_skipped: usize,
}

struct TraceEntry {
    spec: TraceSpec,
    persistence: PersistenceState,
    full_recompute: bool,
    unsupported_logged: bool,
}

struct PrepJob {
    id: TraceId,
    waveform: Option<Arc<Waveform>>,
    role: TraceRole,
    base_alpha: f32,
    blend: BlendMode,
    full_recompute: bool,
}

/// Per-plot frame driver.
///
/// Owns the compute pool, the per-trace resources and persistence state. Each
/// [`ScopeRenderer::render_frame`] call plans every trace in parallel, runs one reduction
/// dispatch per valid trace, and composites only after all dispatches have returned.
pub struct ScopeRenderer {
    opts: RendererOpts,
    pool: rayon::ThreadPool,
    view: Option<ViewWindow>,
    traces: Vec<TraceEntry>,
    arena: TraceArena,
    densities: Vec<DensityImage>,
    loading: bool,
    poisoned: Option<String>,
    last_stats: FrameStats,
}

impl ScopeRenderer {
    /// Validate `opts` and build the compute pool.
    pub fn new(opts: RendererOpts) -> ScopeResult<Self> {
        opts.validate()?;
        let pool = build_thread_pool(opts.threads)?;
        Ok(Self {
            opts,
            pool,
            view: None,
            traces: Vec::new(),
            arena: TraceArena::new(),
            densities: Vec::new(),
            loading: false,
            poisoned: None,
            last_stats: FrameStats::default(),
        })
    }

    /// Options in use.
    pub fn opts(&self) -> &RendererOpts {
        &self.opts
    }

    /// Current view window.
    pub fn view(&self) -> Option<&ViewWindow> {
        self.view.as_ref()
    }

    /// Trace ids in registration (draw) order.
    pub fn trace_ids(&self) -> Vec<TraceId> {
        self.traces.iter().map(|t| t.spec.id).collect()
    }

    /// Counters of the last rendered frame.
    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    /// Allocation counters of the per-trace arena.
    pub fn arena_stats(&self) -> ArenaStats {
        self.arena.stats()
    }

    /// Row-major copy of a trace's intensity buffer.
    pub fn intensity(&self, trace: TraceId) -> Option<Vec<f32>> {
        self.arena.get(trace).map(|s| s.intensity.to_vec())
    }

    /// Error that poisoned the renderer, if any.
    pub fn poisoned(&self) -> Option<&str> {
        self.poisoned.as_deref()
    }

    /// Register a trace; it is drawn after every trace registered before it.
    pub fn add_trace(&mut self, spec: TraceSpec) -> ScopeResult<()> {
        spec.style.validate()?;
        if self.traces.iter().any(|t| t.spec.id == spec.id) {
            return Err(ScopeError::validation(format!(
                "trace {} is already registered",
                spec.id.0
            )));
        }
        if let Some(view) = self.view
            && !view.plot.is_degenerate()
        {
            self.guard_fatal(|this| this.arena.create(spec.id, view.plot))?;
        }
        for t in &mut self.traces {
            t.persistence.request_clear(ClearReason::ChannelAdded);
        }
        tracing::debug!(trace = spec.id.0, channel = spec.channel.0, "trace added");
        let persistence = PersistenceState::new(self.persistence_settings(&spec.style));
        self.traces.push(TraceEntry {
            spec,
            persistence,
            full_recompute: true,
            unsupported_logged: false,
        });
        Ok(())
    }

    /// Unregister a trace and free its resources; returns `false` if it was unknown.
    pub fn remove_trace(&mut self, id: TraceId) -> bool {
        let Some(pos) = self.traces.iter().position(|t| t.spec.id == id) else {
            return false;
        };
        self.traces.remove(pos);
        self.arena.destroy(id);
        for t in &mut self.traces {
            t.persistence.request_clear(ClearReason::ChannelRemoved);
        }
        tracing::debug!(trace = id.0, "trace removed");
        true
    }

    /// Replace the view window.
    ///
    /// Pans keep cached index tables; zoom and resize force a full recompute. Any change clears
    /// persistence.
    pub fn set_view(&mut self, view: ViewWindow) -> ScopeResult<()> {
        let reason = match &self.view {
            Some(old) => ClearReason::for_view_change(old, &view),
            None => Some(ClearReason::Resize),
        };
        self.view = Some(view);
        let Some(reason) = reason else {
            return Ok(());
        };
        tracing::trace!(?reason, "view changed");
        for t in &mut self.traces {
            t.persistence.request_clear(reason);
            t.full_recompute |= reason.needs_full_recompute();
        }
        if reason == ClearReason::Resize && !view.plot.is_degenerate() {
            self.guard_fatal(|this| this.ensure_resources(&view))?;
        }
        Ok(())
    }

    /// Change a trace's display settings.
    pub fn set_trace_style(&mut self, id: TraceId, style: TraceStyle) -> ScopeResult<()> {
        style.validate()?;
        let settings = self.persistence_settings(&style);
        let Some(t) = self.traces.iter_mut().find(|t| t.spec.id == id) else {
            return Err(ScopeError::validation(format!("unknown trace {}", id.0)));
        };
        if t.spec.style != style {
            t.persistence.request_clear(ClearReason::DisplaySettings);
        }
        t.persistence.set_settings(settings);
        t.spec.style = style;
        Ok(())
    }

    /// While loading, frames are skipped entirely; leaving the state clears persistence.
    pub fn set_loading(&mut self, loading: bool) {
        if self.loading && !loading {
            self.request_clear(ClearReason::Loading);
        }
        self.loading = loading;
    }

    /// Discard accumulated intensity of every trace before the next frame.
    pub fn request_clear(&mut self, reason: ClearReason) {
        for t in &mut self.traces {
            t.persistence.request_clear(reason);
            t.full_recompute |= reason.needs_full_recompute();
        }
    }

    /// Add a whole-plot density image drawn after the traces.
    pub fn add_density(&mut self, img: DensityImage) {
        self.densities.push(img);
    }

    /// Drop all density images.
    pub fn clear_densities(&mut self) {
        self.densities.clear();
    }

    /// Render one frame from the current channel contents.
    ///
    /// Returns `Ok(None)` while loading. Traces whose geometry is invalid or whose waveform has
    /// no reduction strategy are skipped; they show their last intensity when persisting, blank
    /// otherwise. A [`ScopeError::ResourceExhaustion`] poisons the renderer: this and every
    /// later call fails.
    #[tracing::instrument(skip_all, fields(traces = self.traces.len()))]
    pub fn render_frame(
        &mut self,
        store: &ChannelStore,
        annotations: &Annotations,
    ) -> ScopeResult<Option<FrameRGBA>> {
        if let Some(msg) = &self.poisoned {
            return Err(ScopeError::exhausted(format!("renderer is poisoned: {msg}")));
        }
        if self.loading {
            tracing::debug!("frame skipped while loading");
            return Ok(None);
        }
        let Some(view) = self.view else {
            return Err(ScopeError::validation("render_frame requires a view window"));
        };
        if view.plot.is_degenerate() {
            return Err(ScopeError::invalid_geometry("plot has no pixels"));
        }
        let snapshot = store.snapshot();
        let frame = self.guard_fatal(|this| {
            this.ensure_resources(&view)?;
            this.render_inner(&view, |ch| snapshot.get(ch).cloned(), annotations)
        })?;
        Ok(Some(frame))
    }

    fn render_inner(
        &mut self,
        view: &ViewWindow,
        current: impl Fn(ChannelId) -> Option<Arc<Waveform>>,
        annotations: &Annotations,
    ) -> ScopeResult<FrameRGBA> {
        let jobs: Vec<PrepJob> = self
            .traces
            .iter_mut()
            .map(|t| PrepJob {
                id: t.spec.id,
                waveform: current(t.spec.channel),
                role: t.spec.role,
                base_alpha: self.opts.base_alpha * t.spec.style.alpha,
                blend: t.persistence.begin_frame(),
                full_recompute: t.full_recompute,
            })
            .collect();

        let geometries = self.plan_all(view, &jobs);

        let mut stats = FrameStats {
            traces_total: self.traces.len(),
            ..FrameStats::default()
        };
        let group = self.opts.column_group_width;
        for ((entry, job), planned) in self.traces.iter_mut().zip(&jobs).zip(geometries) {
            let Some(slot) = self.arena.get(job.id) else {
                continue;
            };
            let outcome = planned.and_then(|g| {
                let strategy = ReductionStrategy::select(&g.waveform, entry.spec.style.zero_hold)?;
                self.pool
                    .install(|| reduce(&g, strategy, &slot.intensity, group))
            });
            match outcome {
                Ok(()) => {
                    entry.full_recompute = false;
                    stats.traces_rendered += 1;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    if job.blend == BlendMode::Reset {
                        slot.intensity.fill(0.0);
                    }
                    match e {
                        ScopeError::UnsupportedVariant(msg) => {
                            if !entry.unsupported_logged {
                                tracing::warn!(trace = job.id.0, "skipping trace: {msg}");
                                entry.unsupported_logged = true;
                            }
                        }
                        other => tracing::debug!(trace = job.id.0, "skipping trace: {other}"),
                    }
                    stats.traces_skipped += 1;
                }
            }
        }

        // Every reduction dispatch has returned; intensity buffers are now safe to read.
        let mut out = Compositor::new(view.plot)?;
        out.clear(BACKDROP);
        let underlay = annotations.render_underlay(view)?;
        let overlay = annotations.render_overlay(view)?;
        self.pool.install(|| -> ScopeResult<()> {
            if let Some(layer) = &underlay {
                out.draw_layer(layer)?;
            }
            for t in &self.traces {
                if let Some(slot) = self.arena.get(t.spec.id) {
                    out.draw_trace(&slot.intensity, t.spec.style.color)?;
                }
            }
            for d in &self.densities {
                out.draw_density(d);
            }
            if let Some(layer) = &overlay {
                out.draw_layer(layer)?;
            }
            Ok(())
        })?;

        tracing::debug!(
            rendered = stats.traces_rendered,
            skipped = stats.traces_skipped,
            densities = self.densities.len(),
            "frame composited"
        );
        self.last_stats = stats;
        Ok(out.finish())
    }

    /// Plan every trace in parallel; each task only touches its own index cache.
    fn plan_all(
        &mut self,
        view: &ViewWindow,
        jobs: &[PrepJob],
    ) -> Vec<ScopeResult<RenderGeometry>> {
        let mut caches: HashMap<TraceId, _> = self
            .arena
            .iter_mut()
            .map(|(id, slot)| (id, &mut slot.index_cache))
            .collect();
        let mut work: Vec<_> = jobs
            .iter()
            .map(|job| (job, caches.remove(&job.id)))
            .collect();
        self.pool.install(|| {
            work.par_iter_mut()
                .map(|(job, cache)| {
                    let Some(cache) = cache.as_deref_mut() else {
                        return Err(ScopeError::invalid_geometry("trace has no resources"));
                    };
                    let req = PlanRequest {
                        waveform: job.waveform.as_ref(),
                        view,
                        role: job.role,
                        base_alpha: job.base_alpha,
                        persist_scale: job.blend.persist_scale(),
                        full_recompute: job.full_recompute,
                    };
                    plan_geometry(&req, cache)
                })
                .collect()
        })
    }

    fn ensure_resources(&mut self, view: &ViewWindow) -> ScopeResult<()> {
        for t in &self.traces {
            if self.arena.contains(t.spec.id) {
                self.arena.resize(t.spec.id, view.plot)?;
            } else {
                self.arena.create(t.spec.id, view.plot)?;
            }
        }
        Ok(())
    }

    fn persistence_settings(&self, style: &TraceStyle) -> PersistenceSettings {
        PersistenceSettings {
            enabled: style.persistence,
            decay: style.decay.unwrap_or(self.opts.persistence_decay),
        }
    }

    /// Run `f`, poisoning the renderer if it fails fatally.
    fn guard_fatal<R>(&mut self, f: impl FnOnce(&mut Self) -> ScopeResult<R>) -> ScopeResult<R> {
        let out = f(self);
        if let Err(e) = &out
            && e.is_fatal()
        {
            tracing::error!("renderer poisoned: {e}");
            self.poisoned = Some(e.to_string());
        }
        out
    }
}

fn build_thread_pool(threads: Option<usize>) -> ScopeResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ScopeError::validation("'threads' must be >= 1 when set"));
    }
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("wavescope-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ScopeError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/session/renderer.rs"]
mod tests;
