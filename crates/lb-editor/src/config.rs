//! Editor configuration.
//!
//! Every tolerance is expressed in device pixels and converted to world
//! units with the current zoom at the point of use. Missing JSON keys fall
//! back to the defaults below.

use lb_core::{ShapeKind, StoreLimits};
use lb_render::RenderOptions;
use lb_render::hit::HitTolerances;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed editor config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid editor config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Factor applied by the zoom-in/out shortcuts.
    pub zoom_step: f64,
    /// Control-point hit and click-to-edit radius.
    pub control_point_tolerance_px: f64,
    /// Width of the invisible stroke that makes a connection clickable.
    pub trunk_hit_width_px: f64,
    /// Band around a node's boundary that starts a connection.
    pub ring_width_px: f64,
    /// Movement before a node or control-point press becomes a drag.
    pub drag_threshold_px: f64,
    /// Movement before a marquee becomes visible.
    pub select_threshold_px: f64,
    /// Radius around a pending endpoint that confirms it.
    pub confirm_radius_px: f64,
    pub handle_radius_px: f64,
    /// Control points move by this fraction of their connection's
    /// midpoint displacement when an endpoint is dragged.
    pub shift_factor: f64,
    pub max_nodes: Option<usize>,
    pub max_connections: Option<usize>,
    pub default_shape: ShapeKind,
    pub default_node_width: f64,
    pub default_node_height: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_zoom: lb_core::viewport::DEFAULT_MIN_ZOOM,
            max_zoom: lb_core::viewport::DEFAULT_MAX_ZOOM,
            zoom_step: 1.2,
            control_point_tolerance_px: 25.0,
            trunk_hit_width_px: 12.0,
            ring_width_px: 20.0,
            drag_threshold_px: 3.0,
            select_threshold_px: 5.0,
            confirm_radius_px: 24.0,
            handle_radius_px: 6.0,
            shift_factor: 0.5,
            max_nodes: None,
            max_connections: None,
            default_shape: ShapeKind::Rectangle,
            default_node_width: 120.0,
            default_node_height: 60.0,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let zoom_ok = self.min_zoom > 0.0 && self.min_zoom <= self.max_zoom;
        if !zoom_ok {
            return Err(ConfigError::Invalid(format!(
                "zoom bounds {}..{} are not a positive range",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.zoom_step.is_nan() || self.zoom_step <= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "zoom step {} must exceed 1",
                self.zoom_step
            )));
        }
        let lengths = [
            ("controlPointTolerancePx", self.control_point_tolerance_px),
            ("trunkHitWidthPx", self.trunk_hit_width_px),
            ("ringWidthPx", self.ring_width_px),
            ("dragThresholdPx", self.drag_threshold_px),
            ("selectThresholdPx", self.select_threshold_px),
            ("confirmRadiusPx", self.confirm_radius_px),
            ("handleRadiusPx", self.handle_radius_px),
        ];
        if let Some((name, v)) = lengths.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::Invalid(format!("{name} must be >= 0 (got {v})")));
        }
        if !self.shift_factor.is_finite() {
            return Err(ConfigError::Invalid("shiftFactor must be finite".into()));
        }
        Ok(())
    }

    pub fn store_limits(&self) -> StoreLimits {
        StoreLimits {
            max_nodes: self.max_nodes,
            max_connections: self.max_connections,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            hit_stroke_px: self.trunk_hit_width_px,
            handle_radius_px: self.handle_radius_px,
            pending_radius_px: self.confirm_radius_px,
            ..RenderOptions::default()
        }
    }

    /// Hit tolerances in world units at `zoom`.
    pub fn tolerances(&self, zoom: f64) -> HitTolerances {
        HitTolerances {
            control_point: self.control_point_tolerance_px / zoom,
            ring: self.ring_width_px / zoom,
            trunk: self.trunk_hit_width_px / 2.0 / zoom,
            confirm: self.confirm_radius_px / zoom,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EditorConfig::from_json(r#"{"shiftFactor": 1.0, "maxNodes": 50}"#).unwrap();
        assert_eq!(config.shift_factor, 1.0);
        assert_eq!(config.max_nodes, Some(50));
        assert_eq!(config.control_point_tolerance_px, 25.0);
        assert_eq!(config.ring_width_px, 20.0);
    }

    #[test]
    fn rejects_inverted_zoom_bounds() {
        let err = EditorConfig::from_json(r#"{"minZoom": 4.0, "maxZoom": 2.0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_tolerances_and_bad_json() {
        assert!(EditorConfig::from_json(r#"{"ringWidthPx": -1}"#).is_err());
        assert!(matches!(
            EditorConfig::from_json("{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn tolerances_shrink_as_zoom_grows() {
        let config = EditorConfig::default();
        let t = config.tolerances(2.0);
        assert_eq!(t.control_point, 12.5);
        assert_eq!(t.ring, 10.0);
        assert_eq!(t.trunk, 3.0);
        assert_eq!(t.confirm, 12.0);
    }
}
