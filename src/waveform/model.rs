use crate::foundation::error::{ScopeError, ScopeResult};

/// How sample times are stored.
#[derive(Clone, Debug, PartialEq)]
pub enum Timebase {
    /// Fixed spacing: sample `i` starts at offset `i` and lasts one unit.
    Uniform,
    /// Explicit per-sample offset and duration, in offset units.
    ///
    /// Offsets are expected to be non-decreasing and samples non-overlapping. This is assumed by
    /// the index search, not enforced here.
    Sparse {
        /// Start of each sample.
        offsets: Vec<i64>,
        /// Length of each sample.
        durations: Vec<i64>,
    },
}

/// Sample values of one capture.
#[derive(Clone, Debug, PartialEq)]
pub enum Samples {
    /// Floating-point value per sample.
    Analog(Vec<f32>),
    /// Boolean level per sample.
    Digital(Vec<bool>),
    /// Count per bucket; each sample is one histogram bin.
    Histogram(Vec<f32>),
    /// Parallel bus of boolean lanes per sample.
    ///
    /// Stored and carried through channel stores, but no reduction strategy exists for it yet.
    DigitalBus(Vec<Vec<bool>>),
}

impl Samples {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Self::Analog(v) | Self::Histogram(v) => v.len(),
            Self::Digital(v) => v.len(),
            Self::DigitalBus(v) => v.len(),
        }
    }

    /// Return `true` when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name used in logs and metadata.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Analog(_) => "analog",
            Self::Digital(_) => "digital",
            Self::Histogram(_) => "histogram",
            Self::DigitalBus(_) => "digital-bus",
        }
    }
}

/// One channel's captured data for one trigger event.
///
/// Waveforms are immutable once built; share them as `Arc<Waveform>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    timescale: i64,
    trigger_phase: i64,
    start_timestamp: i64,
    start_subtick: i64,
    timebase: Timebase,
    samples: Samples,
}

impl Waveform {
    /// Build a uniformly sampled waveform.
    ///
    /// `timescale` is the duration of one offset unit in femtoseconds.
    pub fn uniform(timescale: i64, samples: Samples) -> Self {
        Self {
            timescale,
            trigger_phase: 0,
            start_timestamp: 0,
            start_subtick: 0,
            timebase: Timebase::Uniform,
            samples,
        }
    }

    /// Build a sparse waveform from explicit offsets and durations.
    pub fn sparse(
        timescale: i64,
        offsets: Vec<i64>,
        durations: Vec<i64>,
        samples: Samples,
    ) -> ScopeResult<Self> {
        if offsets.len() != durations.len() || offsets.len() != samples.len() {
            return Err(ScopeError::validation(format!(
                "sparse waveform arrays differ in length (offsets={}, durations={}, samples={})",
                offsets.len(),
                durations.len(),
                samples.len()
            )));
        }
        Ok(Self {
            timescale,
            trigger_phase: 0,
            start_timestamp: 0,
            start_subtick: 0,
            timebase: Timebase::Sparse { offsets, durations },
            samples,
        })
    }

    /// Convenience: uniform analog waveform.
    pub fn uniform_analog(timescale: i64, values: Vec<f32>) -> Self {
        Self::uniform(timescale, Samples::Analog(values))
    }

    /// Set the sub-unit trigger phase (femtoseconds).
    pub fn with_trigger_phase(mut self, trigger_phase: i64) -> Self {
        self.trigger_phase = trigger_phase;
        self
    }

    /// Set the wall-clock anchor (`unix seconds`, `femtoseconds within that second`).
    pub fn with_start(mut self, timestamp: i64, subtick: i64) -> Self {
        self.start_timestamp = timestamp;
        self.start_subtick = subtick;
        self
    }

    /// Duration represented by one offset unit, femtoseconds.
    pub fn timescale(&self) -> i64 {
        self.timescale
    }

    /// Sub-unit time shift applied to every sample, femtoseconds.
    pub fn trigger_phase(&self) -> i64 {
        self.trigger_phase
    }

    /// Wall-clock seconds of the trigger.
    pub fn start_timestamp(&self) -> i64 {
        self.start_timestamp
    }

    /// Femtoseconds past [`Waveform::start_timestamp`].
    pub fn start_subtick(&self) -> i64 {
        self.start_subtick
    }

    /// Sample timing representation.
    pub fn timebase(&self) -> &Timebase {
        &self.timebase
    }

    /// Sample values.
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Return `true` when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Return `true` for [`Timebase::Uniform`].
    pub fn is_dense(&self) -> bool {
        matches!(self.timebase, Timebase::Uniform)
    }

    /// Start of sample `i`, in offset units.
    pub fn offset(&self, i: usize) -> i64 {
        match &self.timebase {
            Timebase::Uniform => i as i64,
            Timebase::Sparse { offsets, .. } => offsets[i],
        }
    }

    /// Length of sample `i`, in offset units.
    pub fn duration(&self, i: usize) -> i64 {
        match &self.timebase {
            Timebase::Uniform => 1,
            Timebase::Sparse { durations, .. } => durations[i],
        }
    }

    /// Offsets array for sparse waveforms.
    pub fn sparse_offsets(&self) -> Option<&[i64]> {
        match &self.timebase {
            Timebase::Uniform => None,
            Timebase::Sparse { offsets, .. } => Some(offsets),
        }
    }

    /// Ticks from the first sample's start to the last sample's end.
    pub fn time_span_ticks(&self) -> i64 {
        let n = self.len();
        if n == 0 {
            return 0;
        }
        let end = self.offset(n - 1).saturating_add(self.duration(n - 1));
        end.saturating_sub(self.offset(0))
    }

    /// Mean spacing between sample starts, in offset units.
    ///
    /// Single-sample waveforms report their own duration (at least one tick).
    pub fn average_spacing_ticks(&self) -> f64 {
        let n = self.len();
        match n {
            0 => 0.0,
            1 => self.duration(0).max(1) as f64,
            _ => {
                let span = self.offset(n - 1).saturating_sub(self.offset(0));
                if span <= 0 {
                    1.0
                } else {
                    span as f64 / (n - 1) as f64
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/waveform/model.rs"]
mod tests;
