//! Diagram data model: nodes, connections, and their descriptors.
//!
//! Positions are world-space and a node's `position` is its *center*.
//! Connections are undirected: `{from, to}` is an unordered pair, the field
//! names only record which end the user started from.

use crate::id::{ConnectionId, ControlPointId, NodeId};
use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

/// Connections hold at most this many control points (cubic).
pub const MAX_CONTROL_POINTS: usize = 2;

/// Smallest width/height a node may have, in world units.
pub const MIN_NODE_EXTENT: f64 = 1.0;

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0], exchanged as a hex string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Helper to parse a single hex digit.
fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from 8-bit channels. Survives a hex round-trip exactly.
    pub const fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0)
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();
        let pair = |i: usize| -> Option<f32> {
            Some((hex_val(bytes[i])? << 4 | hex_val(bytes[i + 1])?) as f32 / 255.0)
        };

        match bytes.len() {
            3 => {
                let r = hex_val(bytes[0])?;
                let g = hex_val(bytes[1])?;
                let b = hex_val(bytes[2])?;
                Some(Self::rgba(
                    (r * 17) as f32 / 255.0,
                    (g * 17) as f32 / 255.0,
                    (b * 17) as f32 / 255.0,
                    1.0,
                ))
            }
            6 => Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, 1.0)),
            8 => Some(Self::rgba(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
            _ => None,
        }
    }

    /// Emit as `#RRGGBB`, or `#RRGGBBAA` when not fully opaque.
    pub fn to_hex(&self) -> String {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let (r, g, b, a) = (channel(self.r), channel(self.g), channel(self.b), channel(self.a));
        if a == 255 {
            format!("#{r:02X}{g:02X}{b:02X}")
        } else {
            format!("#{r:02X}{g:02X}{b:02X}{a:02X}")
        }
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Color::from_hex(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color `{s}`")))
    }
}

// ─── Shape ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    Circle,
    #[default]
    Rectangle,
    RoundedRectangle,
    Triangle,
    Diamond,
    Pentagon,
    Hexagon,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub kind: ShapeKind,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub corner_radius: f64,
}

impl Shape {
    pub fn new(kind: ShapeKind, width: f64, height: f64) -> Self {
        let corner_radius = if kind == ShapeKind::RoundedRectangle {
            (width.min(height) * 0.15).round()
        } else {
            0.0
        };
        Self {
            kind,
            width,
            height,
            corner_radius,
        }
        .sanitized()
    }

    /// Clamp dimensions so `width, height > 0` always holds.
    pub fn sanitized(mut self) -> Self {
        let degenerate = |v: f64| !v.is_finite() || v < MIN_NODE_EXTENT;
        if degenerate(self.width) || degenerate(self.height) {
            log::warn!(
                "clamping degenerate node size {}x{}",
                self.width,
                self.height
            );
            let clamp = |v: f64| if v.is_finite() { v.max(MIN_NODE_EXTENT) } else { MIN_NODE_EXTENT };
            self.width = clamp(self.width);
            self.height = clamp(self.height);
        }
        if !self.corner_radius.is_finite() || self.corner_radius < 0.0 {
            self.corner_radius = 0.0;
        }
        self.corner_radius = self.corner_radius.min(self.width.min(self.height) / 2.0);
        self
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl Default for Shape {
    fn default() -> Self {
        Shape::new(ShapeKind::Rectangle, 120.0, 60.0)
    }
}

/// Partial shape update from the property panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapePatch {
    pub kind: Option<ShapeKind>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub corner_radius: Option<f64>,
}

impl ShapePatch {
    pub fn apply(&self, shape: &mut Shape) {
        if let Some(kind) = self.kind {
            shape.kind = kind;
        }
        if let Some(w) = self.width {
            shape.width = w;
        }
        if let Some(h) = self.height {
            shape.height = h;
        }
        if let Some(r) = self.corner_radius {
            shape.corner_radius = r;
        }
        *shape = shape.sanitized();
    }
}

// ─── Style ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    pub family: String,
    pub weight: u16, // 100..900
    pub size: f32,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Inter".into(),
            weight: 400,
            size: 14.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeStyle {
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width: f32,
    pub text_color: Color,
    pub font: FontSpec,
}

impl Default for NodeStyle {
    fn default() -> Self {
        Self {
            fill: Color::WHITE,
            stroke: Color::rgb8(0x33, 0x33, 0x40),
            stroke_width: 1.5,
            text_color: Color::BLACK,
            font: FontSpec::default(),
        }
    }
}

/// Partial style update from the property panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePatch {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: Option<f32>,
    pub text_color: Option<Color>,
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub font_weight: Option<u16>,
}

impl StylePatch {
    pub fn apply(&self, style: &mut NodeStyle) {
        if let Some(c) = self.fill {
            style.fill = c;
        }
        if let Some(c) = self.stroke {
            style.stroke = c;
        }
        if let Some(w) = self.stroke_width {
            style.stroke_width = w.max(0.0);
        }
        if let Some(c) = self.text_color {
            style.text_color = c;
        }
        if let Some(family) = &self.font_family {
            style.font.family = family.clone();
        }
        if let Some(size) = self.font_size {
            style.font.size = size.max(1.0);
        }
        if let Some(weight) = self.font_weight {
            style.font.weight = weight.clamp(100, 900);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionStyle {
    pub stroke: Color,
    pub stroke_width: f32,
    pub dashed: bool,
}

impl Default for ConnectionStyle {
    fn default() -> Self {
        Self {
            stroke: Color::rgb8(0x59, 0x59, 0x66),
            stroke_width: 2.0,
            dashed: false,
        }
    }
}

/// An image drawn over a node's shape. The href is opaque to the engine
/// (URL or data URI produced by the upload collaborator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageOverlay {
    pub href: String,
    #[serde(default = "full_opacity")]
    pub opacity: f32,
}

fn full_opacity() -> f32 {
    1.0
}

// ─── Nodes ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub position: Point,
    pub text: String,
    pub shape: Shape,
    pub style: NodeStyle,
    pub image: Option<ImageOverlay>,
}

impl Node {
    /// Axis-aligned bounds in world space.
    pub fn bounds(&self) -> Rect {
        Rect::from_center_size(self.position, self.shape.size())
    }
}

/// Everything needed to create a node. `id: None` lets the store generate one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeSpec {
    pub id: Option<NodeId>,
    pub position: Point,
    pub text: String,
    pub shape: Shape,
    pub style: NodeStyle,
    pub image: Option<ImageOverlay>,
}

impl NodeSpec {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }
}

// ─── Connections ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub id: ControlPointId,
    pub position: Point,
}

impl ControlPoint {
    pub fn new(position: Point) -> Self {
        Self {
            id: ControlPointId::generate(),
            position,
        }
    }
}

pub type ControlPoints = SmallVec<[ControlPoint; MAX_CONTROL_POINTS]>;

#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub id: ConnectionId,
    pub from: NodeId,
    pub to: NodeId,
    /// Ordered; the order decides which point shapes which third of a cubic.
    pub control_points: ControlPoints,
    pub style: ConnectionStyle,
    pub label: Option<String>,
}

impl Connection {
    pub fn new(id: ConnectionId, from: NodeId, to: NodeId) -> Self {
        Self {
            id,
            from,
            to,
            control_points: SmallVec::new(),
            style: ConnectionStyle::default(),
            label: None,
        }
    }

    /// True when this connection joins `a` and `b` in either direction.
    pub fn joins(&self, a: NodeId, b: NodeId) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }

    /// The endpoint opposite to `node`, if `node` is an endpoint.
    pub fn other_end(&self, node: NodeId) -> Option<NodeId> {
        if self.from == node {
            Some(self.to)
        } else if self.to == node {
            Some(self.from)
        } else {
            None
        }
    }

    /// 0 = line, 1 = quadratic, 2 = cubic.
    pub fn degree(&self) -> usize {
        self.control_points.len()
    }

    pub fn point(&self, id: ControlPointId) -> Option<&ControlPoint> {
        self.control_points.iter().find(|p| p.id == id)
    }

    pub fn point_mut(&mut self, id: ControlPointId) -> Option<&mut ControlPoint> {
        self.control_points.iter_mut().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_hex_roundtrip() {
        let c = Color::from_hex("#6C5CE7").unwrap();
        assert_eq!(c.to_hex(), "#6C5CE7");

        let c2 = Color::from_hex("#FF000080").unwrap();
        assert!((c2.a - 128.0 / 255.0).abs() < 0.01);
        assert_eq!(c2.to_hex().len(), 9);

        assert_eq!(Color::from_hex("fff"), Some(Color::WHITE));
        assert_eq!(Color::from_hex("#12"), None);
        assert_eq!(Color::from_hex("#GG0000"), None);
    }

    #[test]
    fn shape_sanitizes_non_positive_size() {
        let s = Shape::new(ShapeKind::Diamond, 0.0, -5.0);
        assert_eq!(s.width, MIN_NODE_EXTENT);
        assert_eq!(s.height, MIN_NODE_EXTENT);

        let s = Shape::new(ShapeKind::Circle, f64::NAN, 40.0);
        assert_eq!(s.width, MIN_NODE_EXTENT);
        assert_eq!(s.height, 40.0);
    }

    #[test]
    fn corner_radius_is_capped_by_half_extent() {
        let mut s = Shape::new(ShapeKind::RoundedRectangle, 100.0, 20.0);
        ShapePatch {
            corner_radius: Some(50.0),
            ..Default::default()
        }
        .apply(&mut s);
        assert_eq!(s.corner_radius, 10.0);
    }

    #[test]
    fn style_patch_only_touches_set_fields() {
        let mut style = NodeStyle::default();
        StylePatch {
            fill: Some(Color::BLACK),
            font_size: Some(20.0),
            ..Default::default()
        }
        .apply(&mut style);
        assert_eq!(style.fill, Color::BLACK);
        assert_eq!(style.font.size, 20.0);
        assert_eq!(style.stroke, NodeStyle::default().stroke);
    }

    #[test]
    fn connection_endpoint_helpers() {
        let (a, b, c) = (
            NodeId::intern("ma"),
            NodeId::intern("mb"),
            NodeId::intern("mc"),
        );
        let conn = Connection::new(ConnectionId::intern("m_ab"), a, b);
        assert!(conn.joins(b, a));
        assert!(!conn.joins(a, c));
        assert_eq!(conn.other_end(a), Some(b));
        assert_eq!(conn.other_end(c), None);
        assert_eq!(conn.degree(), 0);
    }

    #[test]
    fn shape_kind_uses_kebab_case() {
        let json = serde_json::to_string(&ShapeKind::RoundedRectangle).unwrap();
        assert_eq!(json, "\"rounded-rectangle\"");
    }
}
