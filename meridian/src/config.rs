//! Rendering configuration.

use serde::{Deserialize, Serialize};

use crate::Color;

/// Marker drawn over every vertex of an editable layer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VertexMarkerStyle {
    /// A semi-transparent filled circle.
    SemiTransparentCircle,
    /// A small cross.
    #[default]
    Cross,
    /// No marker.
    None,
}

/// Explicit rendering options, passed to the renderer by the caller.
///
/// All fields have working defaults, so `RenderConfig::default()` gives a
/// usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    /// Style of the vertex markers drawn while a layer is edited.
    pub vertex_marker_style: VertexMarkerStyle,
    /// Half-size of the vertex markers in device units.
    pub vertex_marker_size: f64,
    /// Number of features to draw between cancellation checkpoints.
    pub checkpoint_interval: usize,
    /// When set, vertex markers are drawn for selected features only.
    pub marker_only_for_selection: bool,
    /// Color used to highlight selected features.
    pub selection_color: Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vertex_marker_style: VertexMarkerStyle::default(),
            vertex_marker_size: 3.0,
            checkpoint_interval: 1000,
            marker_only_for_selection: false,
            selection_color: Color::YELLOW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips() {
        let config = RenderConfig::default();
        let json = serde_json::to_string(&config).expect("serializable");
        let back: RenderConfig = serde_json::from_str(&json).expect("deserializable");
        assert_eq!(back, config);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: RenderConfig =
            serde_json::from_str(r#"{"vertexMarkerSize": 5.0}"#).expect("partial config");
        assert_eq!(config.vertex_marker_size, 5.0);
        assert_eq!(config.checkpoint_interval, 1000);
        assert_eq!(config.selection_color, Color::YELLOW);
    }
}
