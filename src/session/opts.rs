use serde::{Deserialize, Serialize};

use crate::foundation::core::Rgb;
use crate::foundation::error::{ScopeError, ScopeResult};
use crate::reduce::kernels::DEFAULT_COLUMN_GROUP;
use crate::render::annotate::Graticule;

/// Environment variable overriding [`RendererOpts::threads`].
pub const ENV_THREADS: &str = "WAVESCOPE_THREADS";
/// Environment variable overriding [`RendererOpts::column_group_width`].
pub const ENV_COLUMN_GROUP: &str = "WAVESCOPE_COLUMN_GROUP";

/// Renderer configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererOpts {
    /// Worker threads of the compute pool (`None` = rayon default).
    pub threads: Option<usize>,
    /// Pixel columns per reduction work unit.
    pub column_group_width: u32,
    /// Alpha before density compensation, multiplied by each trace's own alpha.
    pub base_alpha: f32,
    /// Decay used by traces that enable persistence without their own coefficient.
    pub persistence_decay: f32,
    /// Background gradient at the top edge.
    pub background_top: Rgb,
    /// Background gradient at the bottom edge.
    pub background_bottom: Rgb,
    /// Grid line color.
    pub grid_color: Rgb,
    /// Horizontal and vertical grid divisions.
    pub grid_divisions: [u32; 2],
}

impl Default for RendererOpts {
    fn default() -> Self {
        Self {
            threads: None,
            column_group_width: DEFAULT_COLUMN_GROUP,
            base_alpha: 1.0,
            persistence_decay: 0.9,
            background_top: Rgb::from_rgb8(0x20, 0x20, 0x28),
            background_bottom: Rgb::from_rgb8(0x08, 0x08, 0x0c),
            grid_color: Rgb::from_rgb8(0x80, 0x80, 0x80),
            grid_divisions: [10, 8],
        }
    }
}

impl RendererOpts {
    /// Parse options from JSON; missing fields keep their defaults.
    pub fn from_json_str(s: &str) -> ScopeResult<Self> {
        serde_json::from_str(s).map_err(|e| ScopeError::serde(e.to_string()))
    }

    /// Apply `WAVESCOPE_THREADS` / `WAVESCOPE_COLUMN_GROUP` when set.
    ///
    /// Unparseable values are reported rather than ignored.
    pub fn with_env_overrides(self) -> ScopeResult<Self> {
        self.with_overrides(
            std::env::var(ENV_THREADS).ok().as_deref(),
            std::env::var(ENV_COLUMN_GROUP).ok().as_deref(),
        )
    }

    pub(crate) fn with_overrides(
        mut self,
        threads: Option<&str>,
        column_group: Option<&str>,
    ) -> ScopeResult<Self> {
        if let Some(v) = threads {
            let n = v.trim().parse::<usize>().map_err(|e| {
                ScopeError::validation(format!("{ENV_THREADS}='{v}' is not a count: {e}"))
            })?;
            self.threads = Some(n);
        }
        if let Some(v) = column_group {
            self.column_group_width = v.trim().parse::<u32>().map_err(|e| {
                ScopeError::validation(format!("{ENV_COLUMN_GROUP}='{v}' is not a width: {e}"))
            })?;
        }
        Ok(self)
    }

    /// Check value ranges.
    pub fn validate(&self) -> ScopeResult<()> {
        if self.threads == Some(0) {
            return Err(ScopeError::validation("threads must be >= 1 when set"));
        }
        if self.column_group_width == 0 {
            return Err(ScopeError::validation("column_group_width must be >= 1"));
        }
        if !self.base_alpha.is_finite() || self.base_alpha < 0.0 {
            return Err(ScopeError::validation("base_alpha must be finite and >= 0"));
        }
        if !(0.0..=1.0).contains(&self.persistence_decay) {
            return Err(ScopeError::validation(
                "persistence_decay must be within [0, 1]",
            ));
        }
        Ok(())
    }

    /// Default underlay painter for these options.
    pub fn graticule(&self) -> Graticule {
        Graticule {
            background_top: self.background_top,
            background_bottom: self.background_bottom,
            grid_color: self.grid_color,
            divisions: self.grid_divisions,
            trigger_marker: true,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/opts.rs"]
mod tests;
