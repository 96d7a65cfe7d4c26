//! Tunable constants for layout, interaction and rendering.
//!
//! Defaults come from `config/mindmesh.yaml`, embedded at build time. A host
//! can load its own file with [`MindMeshConfig::from_yaml_file`]; any section
//! or field it omits keeps the default.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const EMBEDDED_CONFIG: &str = include_str!("../config/mindmesh.yaml");

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MindMeshConfig {
    pub interaction: InteractionConfig,
    pub structured: StructuredLayoutConfig,
    pub force: ForceLayoutConfig,
    pub render: RenderConfig,
    pub view: ViewConfig,
}

impl MindMeshConfig {
    /// Parse a YAML document over the built-in defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// The embedded defaults, or the compiled-in ones if the embedded file is bad
    pub fn embedded() -> Self {
        match Self::from_yaml_str(EMBEDDED_CONFIG) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(%err, "embedded mindmesh config invalid, using defaults");
                Self::default()
            }
        }
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Second click on the same node within this window expands it
    pub double_click_ms: u64,
    /// Focus-anchor resample period
    pub anchor_interval_ms: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            double_click_ms: 250,
            anchor_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredLayoutConfig {
    pub margin_top: f32,
    pub margin_side: f32,
    /// Gap between the isolated grid and the viewport's bottom edge
    pub margin_bottom: f32,
    pub min_row_gap: f32,
    /// Lower bound on usable row width
    pub min_width: f32,
    /// Nominal width of one node when deciding how many fit in a row
    pub node_width: f32,
    pub min_x_spacing: f32,
    /// Half-range of positional jitter in pixels
    pub jitter: f32,
    pub seed: u64,
    pub max_course_level: u8,
    pub isolated_columns: usize,
    pub isolated_cell_width: f32,
    pub isolated_cell_height: f32,
}

impl Default for StructuredLayoutConfig {
    fn default() -> Self {
        Self {
            margin_top: 100.0,
            margin_side: 120.0,
            margin_bottom: 60.0,
            min_row_gap: 220.0,
            min_width: 800.0,
            node_width: 120.0,
            min_x_spacing: 160.0,
            jitter: 2.0,
            seed: 7,
            max_course_level: 8,
            isolated_columns: 4,
            isolated_cell_width: 160.0,
            isolated_cell_height: 70.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceLayoutConfig {
    pub iterations: usize,
    pub gravity: f32,
    pub scaling_ratio: f32,
    pub slow_down: f32,
    /// Node size is `base_size + label_len * size_per_char`
    pub base_size: f32,
    pub size_per_char: f32,
    /// Side of the square used for random scatter fallback
    pub scatter: f32,
    pub seed: u64,
    pub max_step: f32,
    /// Live simulation heat retained per tick
    pub cooling: f32,
    /// Live simulation stops when mean displacement drops below this
    pub rest_speed: f32,
}

impl Default for ForceLayoutConfig {
    fn default() -> Self {
        Self {
            iterations: 250,
            gravity: 0.02,
            scaling_ratio: 15.0,
            slow_down: 1.2,
            base_size: 10.0,
            size_per_char: 0.8,
            scatter: 500.0,
            seed: 11,
            max_step: 40.0,
            cooling: 0.98,
            rest_speed: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub title_size: f32,
    pub subtitle_size: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub gap_y: f32,
    pub corner_radius: f32,
    /// Average glyph advance as a fraction of font size
    pub char_width: f32,
    pub shadow_blur: f32,
    pub shadow_blur_focused: f32,
    /// Opacity of nodes outside the focus neighborhood
    pub blur_opacity: f32,
    pub link_focus_boost: f32,
    pub dash_length: f32,
    pub gap_length: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title_size: 15.0,
            subtitle_size: 12.0,
            pad_x: 12.0,
            pad_y: 9.0,
            gap_y: 3.0,
            corner_radius: 10.0,
            char_width: 0.55,
            shadow_blur: 15.0,
            shadow_blur_focused: 25.0,
            blur_opacity: 0.25,
            link_focus_boost: 0.5,
            dash_length: 6.0,
            gap_length: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub fit_padding: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub scroll_zoom_speed: f32,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            fit_padding: 80.0,
            min_zoom: 0.1,
            max_zoom: 5.0,
            scroll_zoom_speed: 0.001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_matches_defaults() {
        let embedded = MindMeshConfig::from_yaml_str(EMBEDDED_CONFIG).unwrap();
        let defaults = MindMeshConfig::default();

        assert_eq!(embedded.interaction, defaults.interaction);
        assert_eq!(
            embedded.structured.min_row_gap,
            defaults.structured.min_row_gap
        );
        assert_eq!(embedded.force.iterations, defaults.force.iterations);
        assert_eq!(embedded.render.title_size, defaults.render.title_size);
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let config = MindMeshConfig::from_yaml_str("interaction:\n  double_click_ms: 400\n").unwrap();
        assert_eq!(config.interaction.double_click_ms, 400);
        assert_eq!(config.interaction.anchor_interval_ms, 100);
        assert_eq!(config.structured, StructuredLayoutConfig::default());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = MindMeshConfig::from_yaml_file("/nonexistent/mindmesh.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
