//! `sparsev1` / `densev1` sample files plus their JSON metadata.
//!
//! Both layouts are headerless and little-endian. The metadata file names the layout, the sample
//! kind and the time anchors:
//!
//! - `sparsev1`: packed records `{i64 offset, i64 duration, value}` where `value` is `f32` for
//!   analog/histogram data and one byte (`0`/`1`) for digital data.
//! - `densev1`: packed `value`s only; offsets and durations are implied as `0,1,2,..` and `1`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{ScopeError, ScopeResult};
use crate::waveform::model::{Samples, Waveform};

/// On-disk sample layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    /// Explicit offset/duration/value records.
    #[serde(rename = "sparsev1")]
    SparseV1,
    /// Values only.
    #[serde(rename = "densev1")]
    DenseV1,
}

/// Sample value kind recorded in metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// `f32` values.
    Analog,
    /// One byte per sample, `0` or `1`.
    Digital,
    /// `f32` bucket counts.
    Histogram,
}

impl SampleKind {
    fn value_bytes(self) -> usize {
        match self {
            Self::Analog | Self::Histogram => 4,
            Self::Digital => 1,
        }
    }
}

/// Contents of the metadata file stored next to a sample file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// Layout of the sample file.
    pub format: SampleFormat,
    /// Value kind.
    pub kind: SampleKind,
    /// Femtoseconds per offset unit.
    pub timescale: i64,
    /// Sub-unit trigger phase, femtoseconds.
    #[serde(default)]
    pub trigger_phase: i64,
    /// Wall-clock seconds of the trigger.
    #[serde(default)]
    pub start_timestamp: i64,
    /// Femtoseconds past `start_timestamp`.
    #[serde(default)]
    pub start_subtick: i64,
    /// Number of samples, when known. Checked on decode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

fn record_len(format: SampleFormat, kind: SampleKind) -> usize {
    match format {
        SampleFormat::SparseV1 => 16 + kind.value_bytes(),
        SampleFormat::DenseV1 => kind.value_bytes(),
    }
}

/// Serialize `wfm` into `format`, returning the matching metadata and payload.
pub fn encode(wfm: &Waveform, format: SampleFormat) -> ScopeResult<(CaptureMetadata, Vec<u8>)> {
    let kind = match wfm.samples() {
        Samples::Analog(_) => SampleKind::Analog,
        Samples::Digital(_) => SampleKind::Digital,
        Samples::Histogram(_) => SampleKind::Histogram,
        Samples::DigitalBus(_) => {
            return Err(ScopeError::format(
                "digital bus waveforms have no sparsev1/densev1 layout",
            ));
        }
    };

    let n = wfm.len();
    let mut out = Vec::with_capacity(n.saturating_mul(record_len(format, kind)));
    let put_times = |out: &mut Vec<u8>, i: usize| {
        if format == SampleFormat::SparseV1 {
            out.extend_from_slice(&wfm.offset(i).to_le_bytes());
            out.extend_from_slice(&wfm.duration(i).to_le_bytes());
        }
    };
    match wfm.samples() {
        Samples::Analog(v) | Samples::Histogram(v) => {
            for (i, x) in v.iter().enumerate() {
                put_times(&mut out, i);
                out.extend_from_slice(&x.to_le_bytes());
            }
        }
        Samples::Digital(v) => {
            for (i, &x) in v.iter().enumerate() {
                put_times(&mut out, i);
                out.push(u8::from(x));
            }
        }
        Samples::DigitalBus(_) => {}
    }

    let meta = CaptureMetadata {
        format,
        kind,
        timescale: wfm.timescale(),
        trigger_phase: wfm.trigger_phase(),
        start_timestamp: wfm.start_timestamp(),
        start_subtick: wfm.start_subtick(),
        count: Some(n as u64),
    };
    Ok((meta, out))
}

/// Rebuild a waveform from metadata and payload bytes.
pub fn decode(meta: &CaptureMetadata, bytes: &[u8]) -> ScopeResult<Waveform> {
    let rec = record_len(meta.format, meta.kind);
    if !bytes.len().is_multiple_of(rec) {
        return Err(ScopeError::format(format!(
            "{} payload of {} bytes is not a multiple of the {rec}-byte record",
            format_name(meta.format),
            bytes.len()
        )));
    }
    let n = bytes.len() / rec;
    if let Some(count) = meta.count
        && count != n as u64
    {
        return Err(ScopeError::format(format!(
            "metadata declares {count} samples but payload holds {n}"
        )));
    }

    let value_at = match meta.format {
        SampleFormat::SparseV1 => 16,
        SampleFormat::DenseV1 => 0,
    };

    let mut offsets = Vec::new();
    let mut durations = Vec::new();
    if meta.format == SampleFormat::SparseV1 {
        offsets.reserve_exact(n);
        durations.reserve_exact(n);
    }

    let samples = match meta.kind {
        SampleKind::Analog | SampleKind::Histogram => {
            let mut values = Vec::with_capacity(n);
            for r in bytes.chunks_exact(rec) {
                push_times(meta.format, r, &mut offsets, &mut durations);
                values.push(f32::from_le_bytes(le_array(&r[value_at..value_at + 4])));
            }
            if meta.kind == SampleKind::Analog {
                Samples::Analog(values)
            } else {
                Samples::Histogram(values)
            }
        }
        SampleKind::Digital => {
            let mut values = Vec::with_capacity(n);
            for (i, r) in bytes.chunks_exact(rec).enumerate() {
                push_times(meta.format, r, &mut offsets, &mut durations);
                values.push(match r[value_at] {
                    0 => false,
                    1 => true,
                    b => {
                        return Err(ScopeError::format(format!(
                            "digital sample {i} has non-boolean byte {b:#04x}"
                        )));
                    }
                });
            }
            Samples::Digital(values)
        }
    };

    let wfm = match meta.format {
        SampleFormat::SparseV1 => Waveform::sparse(meta.timescale, offsets, durations, samples)?,
        SampleFormat::DenseV1 => Waveform::uniform(meta.timescale, samples),
    };
    Ok(wfm
        .with_trigger_phase(meta.trigger_phase)
        .with_start(meta.start_timestamp, meta.start_subtick))
}

fn push_times(format: SampleFormat, rec: &[u8], offsets: &mut Vec<i64>, durations: &mut Vec<i64>) {
    if format == SampleFormat::SparseV1 {
        offsets.push(i64::from_le_bytes(le_array(&rec[0..8])));
        durations.push(i64::from_le_bytes(le_array(&rec[8..16])));
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn format_name(format: SampleFormat) -> &'static str {
    match format {
        SampleFormat::SparseV1 => "sparsev1",
        SampleFormat::DenseV1 => "densev1",
    }
}

/// Paths of a capture pair: `<dir>/<stem>.json` and `<dir>/<stem>.bin`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturePaths {
    /// Metadata JSON file.
    pub metadata: PathBuf,
    /// Sample payload file.
    pub samples: PathBuf,
}

impl CapturePaths {
    /// Paths for `stem` inside `dir`.
    pub fn new(dir: impl AsRef<Path>, stem: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            metadata: dir.join(format!("{stem}.json")),
            samples: dir.join(format!("{stem}.bin")),
        }
    }

    /// Derive the payload path from a metadata path (same stem, `.bin` extension).
    pub fn from_metadata(metadata: impl Into<PathBuf>) -> Self {
        let metadata = metadata.into();
        let samples = metadata.with_extension("bin");
        Self { metadata, samples }
    }
}

/// Encode `wfm` and write the metadata/payload pair.
pub fn write_capture(
    wfm: &Waveform,
    format: SampleFormat,
    paths: &CapturePaths,
) -> ScopeResult<CaptureMetadata> {
    let (meta, bytes) = encode(wfm, format)?;
    let json =
        serde_json::to_vec_pretty(&meta).map_err(|e| ScopeError::serde(e.to_string()))?;
    std::fs::write(&paths.metadata, json)
        .with_context(|| format!("write capture metadata '{}'", paths.metadata.display()))?;
    std::fs::write(&paths.samples, bytes)
        .with_context(|| format!("write capture samples '{}'", paths.samples.display()))?;
    tracing::debug!(
        samples = wfm.len(),
        format = format_name(format),
        path = %paths.samples.display(),
        "wrote capture"
    );
    Ok(meta)
}

/// Read and decode a metadata/payload pair.
pub fn read_capture(paths: &CapturePaths) -> ScopeResult<(CaptureMetadata, Waveform)> {
    let json = std::fs::read(&paths.metadata)
        .with_context(|| format!("read capture metadata '{}'", paths.metadata.display()))?;
    let meta: CaptureMetadata =
        serde_json::from_slice(&json).map_err(|e| ScopeError::serde(e.to_string()))?;
    let bytes = std::fs::read(&paths.samples)
        .with_context(|| format!("read capture samples '{}'", paths.samples.display()))?;
    let wfm = decode(&meta, &bytes)?;
    Ok((meta, wfm))
}

#[cfg(test)]
#[path = "../../tests/unit/format/capture.rs"]
mod tests;
