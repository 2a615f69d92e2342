//! Curve engine: connection paths, control-point topology, drag-follow.
//!
//! Control points are on-curve handles. With one handle the connection is
//! a quadratic passing through it at t = ½; with two it is a cubic passing
//! through them at t = ⅓ and t = ⅔ in list order. The Bezier control
//! points written to the path are derived from the handles on every route.

use crate::error::SceneError;
use crate::geometry::{self, EPSILON};
use crate::id::ControlPointId;
use crate::model::{Connection, ControlPoint, MAX_CONTROL_POINTS, Node};
use crate::store::SceneStore;
use kurbo::{CubicBez, Line, ParamCurve, ParamCurveNearest, Point, QuadBez, Vec2};
use std::fmt::Write as _;

/// Accuracy passed to kurbo's nearest-point solver, in world units.
const NEAREST_ACCURACY: f64 = 1e-3;

/// Curve degree with the *Bezier* control points (not the handles).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveKind {
    Line,
    Quad { ctrl: Point },
    Cubic { c1: Point, c2: Point },
}

/// A renderable connection path in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePath {
    pub start: Point,
    pub end: Point,
    pub kind: CurveKind,
}

/// Result of a click-to-edit on a connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlPointEdit {
    Added { id: ControlPointId, index: usize },
    Removed { id: ControlPointId, index: usize },
}

impl CurvePath {
    pub fn line(start: Point, end: Point) -> Self {
        Self {
            start,
            end,
            kind: CurveKind::Line,
        }
    }

    /// Build the path interpolating `handles` (0, 1 or 2 of them).
    /// Extra handles beyond the cap are ignored.
    pub fn through(start: Point, end: Point, handles: &[Point]) -> Self {
        let (s, e) = (start.to_vec2(), end.to_vec2());
        let kind = match handles {
            [] => CurveKind::Line,
            [h] => CurveKind::Quad {
                ctrl: (h.to_vec2() * 2.0 - (s + e) * 0.5).to_point(),
            },
            [p1, p2, ..] => {
                let (p1, p2) = (p1.to_vec2(), p2.to_vec2());
                CurveKind::Cubic {
                    c1: ((s * -5.0 + p1 * 18.0 - p2 * 9.0 + e * 2.0) / 6.0).to_point(),
                    c2: ((s * 2.0 - p1 * 9.0 + p2 * 18.0 - e * 5.0) / 6.0).to_point(),
                }
            }
        };
        Self { start, end, kind }
    }

    pub fn degree(&self) -> usize {
        match self.kind {
            CurveKind::Line => 0,
            CurveKind::Quad { .. } => 1,
            CurveKind::Cubic { .. } => 2,
        }
    }

    pub fn eval(&self, t: f64) -> Point {
        match self.kind {
            CurveKind::Line => Line::new(self.start, self.end).eval(t),
            CurveKind::Quad { ctrl } => QuadBez::new(self.start, ctrl, self.end).eval(t),
            CurveKind::Cubic { c1, c2 } => CubicBez::new(self.start, c1, c2, self.end).eval(t),
        }
    }

    /// Distance from `p` to the curve, and the parameter of the nearest point.
    pub fn nearest(&self, p: Point) -> (f64, f64) {
        let hit = match self.kind {
            CurveKind::Line => Line::new(self.start, self.end).nearest(p, NEAREST_ACCURACY),
            CurveKind::Quad { ctrl } => {
                QuadBez::new(self.start, ctrl, self.end).nearest(p, NEAREST_ACCURACY)
            }
            CurveKind::Cubic { c1, c2 } => {
                CubicBez::new(self.start, c1, c2, self.end).nearest(p, NEAREST_ACCURACY)
            }
        };
        (hit.distance_sq.sqrt(), hit.t)
    }

    /// Point on the curve closest to `p`.
    pub fn project(&self, p: Point) -> Point {
        let (_, t) = self.nearest(p);
        self.eval(t)
    }

    /// Where a connection label sits.
    pub fn label_anchor(&self) -> Point {
        self.eval(0.5)
    }

    /// Path data: `M x y L x y`, `M x y Q cx cy x y`, or
    /// `M x y C c1x c1y c2x c2y x y`.
    pub fn to_svg(&self) -> String {
        let mut d = format!("M {} {}", num(self.start.x), num(self.start.y));
        let _ = match self.kind {
            CurveKind::Line => write!(d, " L {} {}", num(self.end.x), num(self.end.y)),
            CurveKind::Quad { ctrl } => write!(
                d,
                " Q {} {} {} {}",
                num(ctrl.x),
                num(ctrl.y),
                num(self.end.x),
                num(self.end.y)
            ),
            CurveKind::Cubic { c1, c2 } => write!(
                d,
                " C {} {} {} {} {} {}",
                num(c1.x),
                num(c1.y),
                num(c2.x),
                num(c2.y),
                num(self.end.x),
                num(self.end.y)
            ),
        };
        d
    }
}

/// Compact number formatting for path data (3 decimals, no `-0`).
pub fn num(v: f64) -> String {
    let r = (v * 1000.0).round() / 1000.0;
    if r == 0.0 { "0".to_string() } else { format!("{r}") }
}

/// Edge-points of a connection between two nodes.
///
/// Coincident centers are degenerate: the path collapses to a zero-length
/// segment at the shared center. Logged, never returned as an error.
pub fn endpoints(from: &Node, to: &Node) -> (Point, Point) {
    if geometry::unit_towards(from.position, to.position).is_none() {
        log::debug!(
            "{}",
            SceneError::InvalidGeometry(format!(
                "{:?} and {:?} share a center; using a zero-length path",
                from.id, to.id
            ))
        );
        return (from.position, from.position);
    }
    (
        geometry::edge_point(from, to.position),
        geometry::edge_point(to, from.position),
    )
}

/// Path for `conn` given its resolved endpoint nodes.
pub fn route_nodes(conn: &Connection, from: &Node, to: &Node) -> CurvePath {
    let (start, end) = endpoints(from, to);
    let handles: Vec<Point> = conn.control_points.iter().map(|p| p.position).collect();
    CurvePath::through(start, end, &handles)
}

/// Path for `conn`, looking endpoints up in the store.
pub fn route(store: &SceneStore, conn: &Connection) -> Result<CurvePath, SceneError> {
    let from = store
        .node(conn.from)
        .ok_or_else(|| SceneError::node_not_found(conn.from))?;
    let to = store
        .node(conn.to)
        .ok_or_else(|| SceneError::node_not_found(conn.to))?;
    Ok(route_nodes(conn, from, to))
}

/// Straight preview while a connection is being dragged out of `source`.
/// Snaps to `target`'s edge-point when hovering a node.
pub fn preview(source: &Node, pointer: Point, target: Option<&Node>) -> CurvePath {
    match target {
        Some(t) if t.id != source.id => {
            let (start, end) = endpoints(source, t);
            CurvePath::line(start, end)
        }
        _ => CurvePath::line(geometry::edge_point(source, pointer), pointer),
    }
}

/// Click-to-edit. Within `tolerance` of an existing handle the nearest one
/// is removed; otherwise a handle is added at the projection of `at` onto
/// the current path. Proximity alone decides which.
pub fn toggle_control_point(
    conn: &mut Connection,
    path: &CurvePath,
    at: Point,
    tolerance: f64,
) -> Result<ControlPointEdit, SceneError> {
    let nearest = conn
        .control_points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, geometry::distance(p.position, at)))
        .filter(|(_, d)| *d <= tolerance)
        .min_by(|a, b| a.1.total_cmp(&b.1));

    if let Some((index, _)) = nearest {
        let removed = conn.control_points.remove(index);
        log::debug!("removed control point {:?} from {:?}", removed.id, conn.id);
        return Ok(ControlPointEdit::Removed {
            id: removed.id,
            index,
        });
    }

    if conn.control_points.len() >= MAX_CONTROL_POINTS {
        return Err(SceneError::CapacityExceeded {
            what: "control point",
            limit: MAX_CONTROL_POINTS,
        });
    }

    let point = ControlPoint::new(path.project(at));
    conn.control_points.push(point);
    log::debug!("added control point {:?} to {:?}", point.id, conn.id);
    Ok(ControlPointEdit::Added {
        id: point.id,
        index: conn.control_points.len() - 1,
    })
}

pub fn move_control_point(
    conn: &mut Connection,
    id: ControlPointId,
    to: Point,
) -> Result<(), SceneError> {
    let point = conn
        .point_mut(id)
        .ok_or_else(|| SceneError::point_not_found(id))?;
    point.position = to;
    Ok(())
}

pub fn remove_control_point(conn: &mut Connection, id: ControlPointId) -> Result<usize, SceneError> {
    let index = conn
        .control_points
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| SceneError::point_not_found(id))?;
    conn.control_points.remove(index);
    Ok(index)
}

/// Midpoint between a connection's two node centers.
pub fn center_midpoint(from: &Node, to: &Node) -> Point {
    from.position.midpoint(to.position)
}

/// Drag-follow: translate every handle by
/// `(new_mid − old_mid) × shift_factor`. Proportional, not exact.
pub fn follow_endpoints(conn: &mut Connection, old_mid: Point, new_mid: Point, shift_factor: f64) {
    let shift: Vec2 = (new_mid - old_mid) * shift_factor;
    if shift.hypot() <= EPSILON {
        return;
    }
    for p in conn.control_points.iter_mut() {
        p.position += shift;
    }
}
