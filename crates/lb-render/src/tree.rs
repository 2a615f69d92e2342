//! Scene store + viewport → render tree.
//!
//! One-way projection: the tree is rebuilt from the store whenever the
//! frame scheduler flushes, and nothing here writes back. Every coordinate
//! is world-space; `transform` is the single group-level affine that maps
//! the whole tree onto the device surface.

use lb_core::curve::{self, CurvePath};
use lb_core::geometry;
use lb_core::{
    Color, Connection, ConnectionId, ControlPointId, Node, NodeId, SceneStore, ShapeKind, Viewport,
};
use kurbo::{Point, Rect};
use serde::Serialize;

/// Device-pixel sizes of the decorations. Converted to world units with
/// the current zoom so they look constant on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Width of the invisible hit-stroke laid over each connection.
    pub hit_stroke_px: f64,
    pub handle_radius_px: f64,
    /// Radius of the pending-connection indicator.
    pub pending_radius_px: f64,
    pub selection_padding_px: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            hit_stroke_px: 12.0,
            handle_radius_px: 6.0,
            pending_radius_px: 24.0,
            selection_padding_px: 4.0,
        }
    }
}

/// Element whose label is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum LabelTarget {
    Node(NodeId),
    Connection(ConnectionId),
}

/// Interaction state the editor wants drawn on top of the scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayState {
    pub selected_nodes: Vec<NodeId>,
    pub selected_connections: Vec<ConnectionId>,
    /// Straight preview while a connection is being dragged out.
    pub preview: Option<CurvePath>,
    /// Pending connection awaiting confirmation; `end` is the indicator.
    pub pending: Option<CurvePath>,
    /// Marquee in world space, only once past the threshold.
    pub marquee: Option<Rect>,
    pub label_editor: Option<(LabelTarget, String)>,
}

// ─── Tree ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTree {
    /// World → device affine as `[a, b, c, d, e, f]` (SVG `matrix()` order).
    pub transform: [f64; 6],
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
    /// Drawn first, beneath every node.
    pub connections: Vec<ConnectionVisual>,
    /// Back-to-front.
    pub nodes: Vec<NodeVisual>,
    pub overlays: Overlays,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<Rect> for Bounds {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x0,
            y: r.y0,
            width: r.width(),
            height: r.height(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionVisual {
    pub id: ConnectionId,
    /// Path data in the `M/L/Q/C` mini-language.
    pub d: String,
    pub stroke: Color,
    pub stroke_width: f32,
    pub dashed: bool,
    /// Width of the transparent stroke used for pointer hits.
    pub hit_width: f64,
    pub selected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<TextVisual>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Primitive {
    Ellipse { cx: f64, cy: f64, rx: f64, ry: f64 },
    #[serde(rename_all = "camelCase")]
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        corner_radius: f64,
    },
    Polygon { points: Vec<[f64; 2]> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextVisual {
    pub lines: Vec<String>,
    /// Anchor of the text block's center.
    pub x: f64,
    pub y: f64,
    pub color: Color,
    pub font_family: String,
    pub font_size: f32,
    pub font_weight: u16,
    pub line_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVisual {
    pub href: String,
    pub bounds: Bounds,
    pub opacity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeVisual {
    pub id: NodeId,
    pub primitive: Primitive,
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width: f32,
    pub text: TextVisual,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageVisual>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleVisual {
    pub connection: ConnectionId,
    pub point: ControlPointId,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingVisual {
    pub d: String,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelEditorVisual {
    pub target: LabelTarget,
    pub draft: String,
    /// Device-space position for the host's text input.
    pub screen_x: f64,
    pub screen_y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlays {
    pub selection: Vec<Bounds>,
    pub handles: Vec<HandleVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingVisual>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marquee: Option<Bounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_editor: Option<LabelEditorVisual>,
}

// ─── Builders ────────────────────────────────────────────────────────────

pub fn build_tree(
    store: &SceneStore,
    viewport: &Viewport,
    overlay: &OverlayState,
    opts: &RenderOptions,
) -> RenderTree {
    let px = |len: f64| viewport.device_len_to_world(len);

    let connections = store
        .connections()
        .filter_map(|conn| {
            let selected = overlay.selected_connections.contains(&conn.id);
            connection_visual(store, conn, px(opts.hit_stroke_px), selected)
        })
        .collect();

    let nodes = store.nodes().map(node_visual).collect();

    let mut overlays = Overlays::default();
    let pad = px(opts.selection_padding_px);
    overlays.selection = overlay
        .selected_nodes
        .iter()
        .filter_map(|id| store.node(*id))
        .map(|n| n.bounds().inflate(pad, pad).into())
        .collect();

    for id in &overlay.selected_connections {
        if let Some(conn) = store.connection(*id) {
            overlays
                .handles
                .extend(conn.control_points.iter().map(|p| HandleVisual {
                    connection: conn.id,
                    point: p.id,
                    x: p.position.x,
                    y: p.position.y,
                    radius: px(opts.handle_radius_px),
                }));
        }
    }

    overlays.preview = overlay.preview.as_ref().map(CurvePath::to_svg);
    overlays.pending = overlay.pending.as_ref().map(|path| PendingVisual {
        d: path.to_svg(),
        x: path.end.x,
        y: path.end.y,
        radius: px(opts.pending_radius_px),
    });
    overlays.marquee = overlay.marquee.map(Bounds::from);
    overlays.label_editor = overlay
        .label_editor
        .as_ref()
        .and_then(|(target, draft)| label_editor_visual(store, viewport, *target, draft));

    RenderTree {
        transform: viewport.transform().as_coeffs(),
        zoom: viewport.zoom,
        width: viewport.device.width,
        height: viewport.device.height,
        connections,
        nodes,
        overlays,
    }
}

fn connection_visual(
    store: &SceneStore,
    conn: &Connection,
    hit_width: f64,
    selected: bool,
) -> Option<ConnectionVisual> {
    let path = match curve::route(store, conn) {
        Ok(path) => path,
        Err(e) => {
            log::debug!("skipping {:?}: {e}", conn.id);
            return None;
        }
    };
    let label = conn.label.as_ref().map(|text| {
        let anchor = path.label_anchor();
        text_visual(text, anchor, Color::BLACK, &lb_core::FontSpec::default())
    });
    Some(ConnectionVisual {
        id: conn.id,
        d: path.to_svg(),
        stroke: conn.style.stroke,
        stroke_width: conn.style.stroke_width,
        dashed: conn.style.dashed,
        hit_width,
        selected,
        label,
    })
}

pub fn node_visual(node: &Node) -> NodeVisual {
    let shape = &node.shape;
    let c = node.position;
    let primitive = match shape.kind {
        ShapeKind::Circle => Primitive::Ellipse {
            cx: c.x,
            cy: c.y,
            rx: shape.width / 2.0,
            ry: shape.height / 2.0,
        },
        ShapeKind::Rectangle | ShapeKind::RoundedRectangle => {
            let b = node.bounds();
            Primitive::Rect {
                x: b.x0,
                y: b.y0,
                width: b.width(),
                height: b.height(),
                corner_radius: if shape.kind == ShapeKind::Rectangle {
                    0.0
                } else {
                    shape.corner_radius
                },
            }
        }
        _ => Primitive::Polygon {
            points: geometry::polygon_vertices(c, shape)
                .into_iter()
                .map(|p| [p.x, p.y])
                .collect(),
        },
    };

    NodeVisual {
        id: node.id,
        primitive,
        fill: node.style.fill,
        stroke: node.style.stroke,
        stroke_width: node.style.stroke_width,
        text: text_visual(&node.text, c, node.style.text_color, &node.style.font),
        image: node.image.as_ref().map(|img| ImageVisual {
            href: img.href.clone(),
            bounds: node.bounds().into(),
            opacity: img.opacity,
        }),
    }
}

fn text_visual(text: &str, at: Point, color: Color, font: &lb_core::FontSpec) -> TextVisual {
    TextVisual {
        lines: text.lines().map(str::to_string).collect(),
        x: at.x,
        y: at.y,
        color,
        font_family: font.family.clone(),
        font_size: font.size,
        font_weight: font.weight,
        line_height: f64::from(font.size) * 1.2,
    }
}

/// World anchor of a label: node center or curve midpoint.
pub fn label_anchor(store: &SceneStore, target: LabelTarget) -> Option<Point> {
    match target {
        LabelTarget::Node(id) => store.node(id).map(|n| n.position),
        LabelTarget::Connection(id) => {
            let conn = store.connection(id)?;
            curve::route(store, conn).ok().map(|p| p.label_anchor())
        }
    }
}

fn label_editor_visual(
    store: &SceneStore,
    viewport: &Viewport,
    target: LabelTarget,
    draft: &str,
) -> Option<LabelEditorVisual> {
    let anchor = label_anchor(store, target)?;
    let screen = viewport.world_to_screen(anchor.x, anchor.y);
    Some(LabelEditorVisual {
        target,
        draft: draft.to_string(),
        screen_x: screen.x,
        screen_y: screen.y,
    })
}
