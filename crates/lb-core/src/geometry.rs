//! Pure geometry helpers: distances, node outlines, containment, and
//! edge-point projection. Everything is world-space.

use crate::model::{Node, Shape, ShapeKind};
use kurbo::{
    BezPath, Ellipse, Line, ParamCurveNearest, Point, Rect, RoundedRect, Shape as _, Vec2,
};

/// Below this length a vector is treated as zero.
pub const EPSILON: f64 = 1e-9;

pub fn distance(a: Point, b: Point) -> f64 {
    (b - a).hypot()
}

/// `clamp` that tolerates inverted bounds and NaN input (NaN maps to `min`).
pub fn clamp(v: f64, min: f64, max: f64) -> f64 {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if v.is_nan() { lo } else { v.clamp(lo, hi) }
}

/// Unit vector from `a` towards `b`, or `None` when the points coincide.
pub fn unit_towards(a: Point, b: Point) -> Option<Vec2> {
    let d = b - a;
    let len = d.hypot();
    (len > EPSILON).then(|| d / len)
}

/// Normalized rectangle spanning two corner points.
pub fn rect_from_corners(a: Point, b: Point) -> Rect {
    Rect::from_points(a, b)
}

/// Radius used to project a connection onto a node's boundary.
/// Exact for circles; `max(width, height) / 2` for everything else.
pub fn boundary_radius(shape: &Shape) -> f64 {
    match shape.kind {
        ShapeKind::Circle => shape.width / 2.0,
        _ => shape.width.max(shape.height) / 2.0,
    }
}

/// Point on `node`'s boundary along the line from its center towards
/// `toward`. Coincident points yield the center itself.
pub fn edge_point(node: &Node, toward: Point) -> Point {
    match unit_towards(node.position, toward) {
        Some(u) => node.position + u * boundary_radius(&node.shape),
        None => node.position,
    }
}

/// Vertices of the polygonal kinds, inscribed in the node's bounds.
/// Empty for circle and rectangles.
pub fn polygon_vertices(center: Point, shape: &Shape) -> Vec<Point> {
    let (hw, hh) = (shape.width / 2.0, shape.height / 2.0);
    match shape.kind {
        ShapeKind::Triangle => vec![
            Point::new(center.x, center.y - hh),
            Point::new(center.x + hw, center.y + hh),
            Point::new(center.x - hw, center.y + hh),
        ],
        ShapeKind::Diamond => vec![
            Point::new(center.x, center.y - hh),
            Point::new(center.x + hw, center.y),
            Point::new(center.x, center.y + hh),
            Point::new(center.x - hw, center.y),
        ],
        ShapeKind::Pentagon => regular_polygon(center, hw, hh, 5, -90.0),
        ShapeKind::Hexagon => regular_polygon(center, hw, hh, 6, 0.0),
        ShapeKind::Circle | ShapeKind::Rectangle | ShapeKind::RoundedRectangle => Vec::new(),
    }
}

fn regular_polygon(center: Point, rx: f64, ry: f64, sides: usize, start_deg: f64) -> Vec<Point> {
    (0..sides)
        .map(|i| {
            let a = (start_deg + 360.0 * i as f64 / sides as f64).to_radians();
            Point::new(center.x + rx * a.cos(), center.y + ry * a.sin())
        })
        .collect()
}

/// Closed outline of a shape centered at `center`.
pub fn outline(center: Point, shape: &Shape) -> BezPath {
    let rect = Rect::from_center_size(center, shape.size());
    match shape.kind {
        ShapeKind::Circle => Ellipse::from_rect(rect).to_path(0.1),
        ShapeKind::Rectangle => rect.to_path(0.1),
        ShapeKind::RoundedRectangle => {
            RoundedRect::from_rect(rect, shape.corner_radius).to_path(0.1)
        }
        _ => {
            let mut path = BezPath::new();
            let verts = polygon_vertices(center, shape);
            if let Some((first, rest)) = verts.split_first() {
                path.move_to(*first);
                for p in rest {
                    path.line_to(*p);
                }
                path.close_path();
            }
            path
        }
    }
}

/// Interior test against the node's own boundary (no margin).
pub fn contains(node: &Node, p: Point) -> bool {
    shape_contains(node.position, &node.shape, p)
}

fn shape_contains(center: Point, shape: &Shape, p: Point) -> bool {
    let rect = Rect::from_center_size(center, shape.size());
    match shape.kind {
        ShapeKind::Circle => Ellipse::from_rect(rect).contains(p),
        ShapeKind::Rectangle => rect.contains(p),
        ShapeKind::RoundedRectangle => RoundedRect::from_rect(rect, shape.corner_radius).contains(p),
        _ => rect.contains(p) && outline(center, shape).contains(p),
    }
}

/// Outer-ring test: inside the shape grown by `ring` on every side but not
/// inside the shape itself, so the interior always claims priority.
pub fn ring_contains(node: &Node, p: Point, ring: f64) -> bool {
    if ring <= 0.0 || contains(node, p) {
        return false;
    }
    let verts = polygon_vertices(node.position, &node.shape);
    if !verts.is_empty() {
        return outline_distance(&verts, p) <= ring;
    }
    let mut grown = node.shape;
    grown.width += ring * 2.0;
    grown.height += ring * 2.0;
    grown.corner_radius += ring;
    shape_contains(node.position, &grown, p)
}

/// Distance from `p` to the nearest edge of a closed polygon.
fn outline_distance(verts: &[Point], p: Point) -> f64 {
    let edges = verts.iter().zip(verts.iter().cycle().skip(1));
    edges
        .map(|(a, b)| Line::new(*a, *b).nearest(p, 1e-9).distance_sq)
        .fold(f64::INFINITY, f64::min)
        .sqrt()
}
