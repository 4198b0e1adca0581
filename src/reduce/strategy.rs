use crate::foundation::error::{ScopeError, ScopeResult};
use crate::waveform::model::{Samples, Waveform};

/// Closed set of column reduction kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReductionStrategy {
    /// Sparse analog data, linear segments between consecutive samples.
    AnalogInterpolated,
    /// Analog data held flat until the next sample, with a vertical step at each change.
    AnalogZeroHold,
    /// Uniformly sampled analog data, linear segments, sample positions computed arithmetically.
    AnalogDense,
    /// Boolean presence per column.
    Digital,
    /// Per-column sum of bucket counts.
    Histogram,
}

impl ReductionStrategy {
    /// Pick the kernel for a waveform.
    ///
    /// `zero_hold` only affects analog data and wins over the dense/sparse distinction. Waveform
    /// variants without a kernel yield [`ScopeError::UnsupportedVariant`].
    pub fn select(wfm: &Waveform, zero_hold: bool) -> ScopeResult<Self> {
        match wfm.samples() {
            Samples::Analog(_) if zero_hold => Ok(Self::AnalogZeroHold),
            Samples::Analog(_) if wfm.is_dense() => Ok(Self::AnalogDense),
            Samples::Analog(_) => Ok(Self::AnalogInterpolated),
            Samples::Digital(_) => Ok(Self::Digital),
            Samples::Histogram(_) => Ok(Self::Histogram),
            Samples::DigitalBus(_) => Err(ScopeError::unsupported(format!(
                "no reduction kernel for {} waveforms",
                wfm.samples().kind_name()
            ))),
        }
    }

    /// Stable lowercase name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::AnalogInterpolated => "analog-interpolated",
            Self::AnalogZeroHold => "analog-zero-hold",
            Self::AnalogDense => "analog-dense",
            Self::Digital => "digital",
            Self::Histogram => "histogram",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/reduce/strategy.rs"]
mod tests;
