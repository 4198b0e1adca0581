/// Convenience result type used across wavescope.
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Top-level error taxonomy used by pipeline APIs.
///
/// Only [`ScopeError::ResourceExhaustion`] is fatal. Every other variant is scoped to a single
/// trace or a single file and never aborts a frame for the remaining traces.
#[derive(thiserror::Error, Debug)]
pub enum ScopeError {
    /// Invalid user-provided configuration or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// A trace cannot be mapped onto the plot this frame.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A waveform variant with no matching reduction strategy.
    #[error("unsupported waveform variant: {0}")]
    UnsupportedVariant(String),

    /// Allocation of a per-trace compute resource failed.
    #[error("resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// Malformed or inconsistent on-disk sample data.
    #[error("sample format error: {0}")]
    Format(String),

    /// Errors when serializing or deserializing metadata/configuration.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScopeError {
    /// Build a [`ScopeError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ScopeError::InvalidGeometry`] value.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Build a [`ScopeError::UnsupportedVariant`] value.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedVariant(msg.into())
    }

    /// Build a [`ScopeError::ResourceExhaustion`] value.
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhaustion(msg.into())
    }

    /// Build a [`ScopeError::Format`] value.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Build a [`ScopeError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Return `true` for conditions the pipeline cannot recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ResourceExhaustion(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
