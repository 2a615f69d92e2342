//! Hit testing: world point → the element a pointer-down should act on.
//!
//! Targets are tried in a fixed priority so overlapping gestures resolve
//! the same way every time: pending endpoint, control point, node
//! interior, node outer ring, connection trunk, then empty canvas. Nodes
//! are tried front-to-back (last painted = topmost).

use lb_core::curve;
use lb_core::geometry;
use lb_core::{ConnectionId, ControlPointId, NodeId, SceneStore};
use kurbo::{Point, Rect};

/// Tolerances in *world* units (callers convert device pixels by zoom).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTolerances {
    pub control_point: f64,
    pub ring: f64,
    /// Half the trunk hit-stroke width.
    pub trunk: f64,
    pub confirm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hit {
    PendingEndpoint,
    ControlPoint {
        connection: ConnectionId,
        point: ControlPointId,
    },
    NodeInterior(NodeId),
    NodeRing(NodeId),
    ConnectionTrunk {
        connection: ConnectionId,
        at: Point,
    },
    Empty,
}

/// Resolve `p` against the scene. `pending` is the world position of a
/// pending connection's indicator, if one is shown.
pub fn hit_test(store: &SceneStore, p: Point, pending: Option<Point>, tol: &HitTolerances) -> Hit {
    if let Some(end) = pending
        && geometry::distance(end, p) <= tol.confirm
    {
        return Hit::PendingEndpoint;
    }

    if let Some((connection, point)) = control_point_at(store, p, tol.control_point) {
        return Hit::ControlPoint { connection, point };
    }

    if let Some(node) = store.nodes().rev().find(|n| geometry::contains(n, p)) {
        return Hit::NodeInterior(node.id);
    }

    if let Some(node) = store
        .nodes()
        .rev()
        .find(|n| geometry::ring_contains(n, p, tol.ring))
    {
        return Hit::NodeRing(node.id);
    }

    if let Some(connection) = trunk_at(store, p, tol.trunk) {
        return Hit::ConnectionTrunk { connection, at: p };
    }

    Hit::Empty
}

/// Nearest control point within `tolerance`, across all connections.
fn control_point_at(
    store: &SceneStore,
    p: Point,
    tolerance: f64,
) -> Option<(ConnectionId, ControlPointId)> {
    store
        .connections()
        .flat_map(|c| c.control_points.iter().map(move |cp| (c.id, cp)))
        .map(|(conn, cp)| (conn, cp.id, geometry::distance(cp.position, p)))
        .filter(|(_, _, d)| *d <= tolerance)
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(conn, point, _)| (conn, point))
}

/// Nearest connection whose rendered trunk passes within `tolerance`.
fn trunk_at(store: &SceneStore, p: Point, tolerance: f64) -> Option<ConnectionId> {
    store
        .connections()
        .filter_map(|c| {
            let path = curve::route(store, c).ok()?;
            let (d, _) = path.nearest(p);
            (d <= tolerance).then_some((c.id, d))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Topmost node whose interior or outer ring contains `p`. Used as the
/// drop target when a connection gesture ends.
pub fn node_under(store: &SceneStore, p: Point, ring: f64) -> Option<NodeId> {
    store
        .nodes()
        .rev()
        .find(|n| geometry::contains(n, p))
        .or_else(|| {
            store
                .nodes()
                .rev()
                .find(|n| geometry::ring_contains(n, p, ring))
        })
        .map(|n| n.id)
}

/// Every node whose bounds intersect `rect` (marquee selection), in paint
/// order.
pub fn nodes_in_rect(store: &SceneStore, rect: Rect) -> Vec<NodeId> {
    let rect = rect.abs();
    store
        .nodes()
        .filter(|n| {
            let b = n.bounds();
            b.x0 <= rect.x1 && b.x1 >= rect.x0 && b.y0 <= rect.y1 && b.y1 >= rect.y0
        })
        .map(|n| n.id)
        .collect()
}
