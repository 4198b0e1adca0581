//! Frame-to-frame persistence ("afterglow") decisions.
//!
//! The accumulator does not touch intensity cells itself. It decides, once per frame, whether
//! the trace's buffer keeps a decayed copy of the previous frame or starts from zero, and the
//! reducer folds that decision into its pass through [`BlendMode::persist_scale`].

use serde::{Deserialize, Serialize};

use crate::geometry::view::ViewWindow;

/// Why accumulated intensity must be discarded before the next frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    /// A trace was added to the plot.
    ChannelAdded,
    /// A trace was removed from the plot.
    ChannelRemoved,
    /// Horizontal position changed at constant zoom.
    Pan,
    /// Horizontal or vertical scale changed.
    Zoom,
    /// Color, alpha or persistence settings changed.
    DisplaySettings,
    /// Plot size changed.
    Resize,
    /// A session is being loaded.
    Loading,
}

impl ClearReason {
    /// Return `true` when the cached index table can no longer be shifted or reused.
    ///
    /// A pan keeps the cache (whole-column shifts are patched in place); settings changes and
    /// loading never touch geometry.
    pub fn needs_full_recompute(self) -> bool {
        matches!(self, Self::ChannelAdded | Self::Zoom | Self::Resize)
    }

    /// Classify a view change, or `None` when nothing visible moved.
    pub fn for_view_change(old: &ViewWindow, new: &ViewWindow) -> Option<Self> {
        if old == new {
            None
        } else if old.plot != new.plot {
            Some(Self::Resize)
        } else if !old.same_zoom(new)
            || old.y_scale.to_bits() != new.y_scale.to_bits()
            || old.y_offset.to_bits() != new.y_offset.to_bits()
        {
            Some(Self::Zoom)
        } else {
            Some(Self::Pan)
        }
    }
}

/// How a trace's intensity buffer is combined with this frame's contribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BlendMode {
    /// Zero the buffer; the fresh contribution is the sole content.
    Reset,
    /// `new = d * old + fresh`.
    Decay(f32),
}

impl BlendMode {
    /// Coefficient handed to the reducer (`0` for [`BlendMode::Reset`]).
    pub fn persist_scale(self) -> f32 {
        match self {
            Self::Reset => 0.0,
            Self::Decay(d) => d,
        }
    }
}

/// User-facing persistence preference of one trace.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    /// Keep decayed intensity across frames.
    pub enabled: bool,
    /// Decay coefficient `d`, clamped to `[0, 1]` when used.
    pub decay: f32,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            decay: 0.9,
        }
    }
}

/// Per-trace persistence state.
#[derive(Clone, Debug)]
pub struct PersistenceState {
    settings: PersistenceSettings,
    clear_pending: Option<ClearReason>,
    frames_kept: u64,
}

impl PersistenceState {
    /// New state; the first frame always starts from an empty buffer.
    pub fn new(settings: PersistenceSettings) -> Self {
        Self {
            settings,
            clear_pending: Some(ClearReason::ChannelAdded),
            frames_kept: 0,
        }
    }

    /// Current settings.
    pub fn settings(&self) -> PersistenceSettings {
        self.settings
    }

    /// Replace the settings; any change clears accumulated intensity.
    pub fn set_settings(&mut self, settings: PersistenceSettings) {
        if settings != self.settings {
            self.settings = settings;
            self.request_clear(ClearReason::DisplaySettings);
        }
    }

    /// Discard accumulated intensity before the next frame.
    pub fn request_clear(&mut self, reason: ClearReason) {
        if self.clear_pending.is_none() {
            self.clear_pending = Some(reason);
        }
    }

    /// Pending clear reason, if any.
    pub fn pending_clear(&self) -> Option<ClearReason> {
        self.clear_pending
    }

    /// Number of consecutive frames that carried intensity forward.
    pub fn frames_kept(&self) -> u64 {
        self.frames_kept
    }

    /// Decide this frame's blend and consume any pending clear.
    pub fn begin_frame(&mut self) -> BlendMode {
        let cleared = self.clear_pending.take();
        if !self.settings.enabled || cleared.is_some() {
            if let Some(reason) = cleared {
                tracing::trace!(?reason, "persistence reset");
            }
            self.frames_kept = 0;
            return BlendMode::Reset;
        }
        self.frames_kept = self.frames_kept.saturating_add(1);
        let d = if self.settings.decay.is_finite() {
            self.settings.decay.clamp(0.0, 1.0)
        } else {
            0.0
        };
        BlendMode::Decay(d)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/persistence/accumulator.rs"]
mod tests;
