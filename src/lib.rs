//! wavescope turns captured instrument waveforms into composited plot images.
//!
//! A capture may hold tens of millions of samples per channel and arrive many times per second.
//! wavescope decimates each one onto a fixed pixel grid fast enough to sustain interactive frame
//! rates, with optional persistence ("afterglow") across frames.
//!
//! # Pipeline overview
//!
//! 1. **Publish**: the acquisition side swaps immutable [`Waveform`]s into a [`ChannelStore`].
//! 2. **Plan**: per trace, [`plan_geometry`] maps the view window onto sample offsets
//!    ([`RenderGeometry`]), building or reusing a per-column index table for sparse data.
//! 3. **Reduce**: [`reduce`] accumulates every visible sample into the trace's
//!    [`IntensityBuffer`] with one of the [`ReductionStrategy`] kernels, folding persistence decay
//!    into the same pass.
//! 4. **Composite**: intensities are tone-mapped through the trace color and layered between the
//!    annotation underlay and overlay ([`Annotations`]) into a [`FrameRGBA`].
//!
//! [`ScopeRenderer`] drives the whole sequence once per frame.
//!
//! Design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate. Shared intensity cells are atomics.
//! - **Per-trace failure isolation**: only [`ScopeError::ResourceExhaustion`] is fatal.
//! - **Premultiplied RGBA8** end-to-end.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;
mod format;
mod geometry;
mod persistence;
mod reduce;
mod render;
mod session;
mod waveform;

pub use foundation::core::{BezPath, ChannelId, PlotSize, Point, Rect, Rgb, Rgba8Premul, TraceId};
pub use foundation::error::{ScopeError, ScopeResult};
pub use foundation::math::lower_bound_clamped;
pub use format::capture::{
    CaptureMetadata, CapturePaths, SampleFormat, SampleKind, decode, encode, read_capture,
    write_capture,
};
pub use geometry::planner::{
    COLUMN_GUARD_TICKS, ConfigBlock, IndexCache, IndexReuse, IndexTable, PlanRequest,
    RenderGeometry, effective_alpha, plan_geometry,
};
pub use geometry::view::{TraceRole, ViewWindow};
pub use persistence::accumulator::{
    BlendMode, ClearReason, PersistenceSettings, PersistenceState,
};
pub use reduce::intensity::IntensityBuffer;
pub use reduce::kernels::{DEFAULT_COLUMN_GROUP, reduce};
pub use reduce::strategy::ReductionStrategy;
pub use render::annotate::{
    AnnotationPainter, Annotations, CursorOverlay, GRID_ALPHA, Graticule, PeakMarker, VectorLayer,
};
pub use render::arena::{ArenaStats, TraceArena, TraceSlot};
pub use render::compositor::{Compositor, PremulRgba8, over, over_in_place, tone_map};
pub use render::density::{DensityImage, DensityKind, DensityRange, WaterfallScroller};
pub use render::frame::FrameRGBA;
pub use render::ramp::{ColorRamp, RAMP_NAMES};
pub use session::opts::{ENV_COLUMN_GROUP, ENV_THREADS, RendererOpts};
pub use session::renderer::{FrameStats, ScopeRenderer, TraceSpec, TraceStyle};
pub use waveform::model::{Samples, Timebase, Waveform};
pub use waveform::store::{ChannelSnapshot, ChannelStore, StoreTx};
