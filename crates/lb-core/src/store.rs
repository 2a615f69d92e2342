//! Scene store: the single source of truth for nodes and connections.
//!
//! Backed by an undirected `petgraph` stable graph. Diagram nodes are graph
//! nodes, connections are graph edges, so removing a node drops its
//! incident edges in the same step. Two id maps give O(1) lookup. The store
//! is pure CRUD: it never computes curve geometry and never renders.

use crate::error::{ElementKind, SceneError};
use crate::id::{ConnectionId, ControlPointId, NodeId};
use crate::model::*;
use kurbo::Point;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Optional ceilings. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_nodes: Option<usize>,
    pub max_connections: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SceneStore {
    graph: StableUnGraph<Node, Connection>,
    node_index: HashMap<NodeId, NodeIndex>,
    connection_index: HashMap<ConnectionId, EdgeIndex>,
    /// Back-to-front paint order. Derived bookkeeping only: membership
    /// always mirrors `node_index`.
    paint_order: Vec<NodeId>,
    limits: StoreLimits,
}

impl SceneStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: StoreLimits) {
        self.limits = limits;
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn connection_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connection_index.get(&id).map(|idx| &self.graph[*idx])
    }

    /// Mutable access for the curve engine. Callers are responsible for
    /// keeping `control_points.len() <= MAX_CONTROL_POINTS`.
    pub fn connection_mut(&mut self, id: ConnectionId) -> Result<&mut Connection, SceneError> {
        let idx = *self
            .connection_index
            .get(&id)
            .ok_or_else(|| SceneError::connection_not_found(id))?;
        Ok(&mut self.graph[idx])
    }

    /// Nodes in back-to-front paint order.
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = &Node> + '_ {
        self.paint_order
            .iter()
            .filter_map(|id| self.node_index.get(id).map(|idx| &self.graph[*idx]))
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.graph.edge_indices().map(|e| &self.graph[e])
    }

    /// Ids of every connection incident to `node`. Empty for unknown ids.
    pub fn connections_of(&self, node: NodeId) -> Vec<ConnectionId> {
        match self.node_index.get(&node) {
            Some(idx) => self.graph.edges(*idx).map(|e| e.weight().id).collect(),
            None => Vec::new(),
        }
    }

    /// The connection joining `a` and `b`, in either direction.
    pub fn connection_between(&self, a: NodeId, b: NodeId) -> Option<&Connection> {
        let ia = *self.node_index.get(&a)?;
        let ib = *self.node_index.get(&b)?;
        self.graph.find_edge(ia, ib).map(|e| &self.graph[e])
    }

    /// Both endpoints of a connection.
    pub fn endpoints(&self, conn: &Connection) -> Option<(&Node, &Node)> {
        Some((self.node(conn.from)?, self.node(conn.to)?))
    }

    // ─── Nodes ───────────────────────────────────────────────────────────

    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NodeId, SceneError> {
        if let Some(max) = self.limits.max_nodes
            && self.node_count() >= max
        {
            return Err(SceneError::CapacityExceeded {
                what: "node",
                limit: max,
            });
        }
        let id = spec.id.unwrap_or_else(NodeId::generate);
        if self.node_index.contains_key(&id) {
            return Err(SceneError::DuplicateId {
                kind: ElementKind::Node,
                id: id.to_string(),
            });
        }
        let node = Node {
            id,
            position: spec.position,
            text: spec.text,
            shape: spec.shape.sanitized(),
            style: spec.style,
            image: spec.image,
        };
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        self.paint_order.push(id);
        log::trace!("added node {id:?}");
        Ok(id)
    }

    /// Remove a node and every incident connection. Returns the ids of the
    /// connections that went with it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Vec<ConnectionId>, SceneError> {
        let idx = self
            .node_index
            .remove(&id)
            .ok_or_else(|| SceneError::node_not_found(id))?;
        let cascaded: Vec<ConnectionId> = self.graph.edges(idx).map(|e| e.weight().id).collect();
        for conn in &cascaded {
            self.connection_index.remove(conn);
        }
        self.graph.remove_node(idx);
        self.paint_order.retain(|n| *n != id);
        log::trace!("removed node {id:?} with {} connection(s)", cascaded.len());
        Ok(cascaded)
    }

    /// Update a node's position; returns the connections touching it.
    pub fn move_node(&mut self, id: NodeId, position: Point) -> Result<Vec<ConnectionId>, SceneError> {
        let idx = *self
            .node_index
            .get(&id)
            .ok_or_else(|| SceneError::node_not_found(id))?;
        self.graph[idx].position = position;
        Ok(self.graph.edges(idx).map(|e| e.weight().id).collect())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        let idx = *self
            .node_index
            .get(&id)
            .ok_or_else(|| SceneError::node_not_found(id))?;
        Ok(&mut self.graph[idx])
    }

    pub fn set_node_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), SceneError> {
        self.node_mut(id)?.text = text.into();
        Ok(())
    }

    pub fn update_node_style(&mut self, id: NodeId, patch: &StylePatch) -> Result<(), SceneError> {
        patch.apply(&mut self.node_mut(id)?.style);
        Ok(())
    }

    pub fn update_node_shape(&mut self, id: NodeId, patch: &ShapePatch) -> Result<(), SceneError> {
        patch.apply(&mut self.node_mut(id)?.shape);
        Ok(())
    }

    pub fn set_node_image(&mut self, id: NodeId, image: Option<ImageOverlay>) -> Result<(), SceneError> {
        self.node_mut(id)?.image = image;
        Ok(())
    }

    /// Move a node to the end of the paint order (topmost).
    pub fn bring_to_front(&mut self, id: NodeId) -> Result<(), SceneError> {
        let pos = self
            .paint_order
            .iter()
            .position(|n| *n == id)
            .ok_or_else(|| SceneError::node_not_found(id))?;
        if pos + 1 != self.paint_order.len() {
            let id = self.paint_order.remove(pos);
            self.paint_order.push(id);
        }
        Ok(())
    }

    // ─── Connections ─────────────────────────────────────────────────────

    /// Connect `a` and `b`. Idempotent over the unordered pair: an existing
    /// connection is returned unchanged.
    pub fn add_connection(&mut self, a: NodeId, b: NodeId) -> Result<ConnectionId, SceneError> {
        self.add_connection_with_id(ConnectionId::generate(), a, b)
    }

    /// Like [`Self::add_connection`] with a caller-chosen id for new edges.
    pub fn add_connection_with_id(
        &mut self,
        id: ConnectionId,
        a: NodeId,
        b: NodeId,
    ) -> Result<ConnectionId, SceneError> {
        let (ia, ib) = self.endpoint_indices(a, b)?;
        if let Some(existing) = self.graph.find_edge(ia, ib) {
            return Ok(self.graph[existing].id);
        }
        self.insert_edge(ia, ib, Connection::new(id, a, b))
    }

    /// Insert a fully-formed connection (import, paste). Fails instead of
    /// deduplicating when the pair is already connected.
    pub fn insert_connection(&mut self, conn: Connection) -> Result<ConnectionId, SceneError> {
        let (ia, ib) = self.endpoint_indices(conn.from, conn.to)?;
        if let Some(existing) = self.graph.find_edge(ia, ib) {
            return Err(SceneError::DuplicateId {
                kind: ElementKind::Connection,
                id: self.graph[existing].id.to_string(),
            });
        }
        if conn.control_points.len() > MAX_CONTROL_POINTS {
            return Err(SceneError::CapacityExceeded {
                what: "control point",
                limit: MAX_CONTROL_POINTS,
            });
        }
        self.insert_edge(ia, ib, conn)
    }

    fn endpoint_indices(&self, a: NodeId, b: NodeId) -> Result<(NodeIndex, NodeIndex), SceneError> {
        if a == b {
            return Err(SceneError::InvalidEndpoints(a.to_string()));
        }
        let ia = *self
            .node_index
            .get(&a)
            .ok_or_else(|| SceneError::node_not_found(a))?;
        let ib = *self
            .node_index
            .get(&b)
            .ok_or_else(|| SceneError::node_not_found(b))?;
        Ok((ia, ib))
    }

    fn insert_edge(
        &mut self,
        ia: NodeIndex,
        ib: NodeIndex,
        conn: Connection,
    ) -> Result<ConnectionId, SceneError> {
        if let Some(max) = self.limits.max_connections
            && self.connection_count() >= max
        {
            return Err(SceneError::CapacityExceeded {
                what: "connection",
                limit: max,
            });
        }
        let id = conn.id;
        if self.connection_index.contains_key(&id) {
            return Err(SceneError::DuplicateId {
                kind: ElementKind::Connection,
                id: id.to_string(),
            });
        }
        let e = self.graph.add_edge(ia, ib, conn);
        self.connection_index.insert(id, e);
        log::trace!("added connection {id:?}");
        Ok(id)
    }

    pub fn remove_connection(&mut self, id: ConnectionId) -> Result<Connection, SceneError> {
        let e = self
            .connection_index
            .remove(&id)
            .ok_or_else(|| SceneError::connection_not_found(id))?;
        self.graph
            .remove_edge(e)
            .ok_or_else(|| SceneError::connection_not_found(id))
    }

    pub fn set_connection_label(
        &mut self,
        id: ConnectionId,
        label: Option<String>,
    ) -> Result<(), SceneError> {
        self.connection_mut(id)?.label = label.filter(|l| !l.is_empty());
        Ok(())
    }

    pub fn update_connection_style(
        &mut self,
        id: ConnectionId,
        style: ConnectionStyle,
    ) -> Result<(), SceneError> {
        self.connection_mut(id)?.style = style;
        Ok(())
    }

    /// Replace a connection's control points. Existing point ids are kept
    /// position-by-position so handles stay stable across edits.
    pub fn set_control_points(&mut self, id: ConnectionId, points: &[Point]) -> Result<(), SceneError> {
        if points.len() > MAX_CONTROL_POINTS {
            return Err(SceneError::CapacityExceeded {
                what: "control point",
                limit: MAX_CONTROL_POINTS,
            });
        }
        let conn = self.connection_mut(id)?;
        let ids: Vec<ControlPointId> = conn.control_points.iter().map(|p| p.id).collect();
        conn.control_points = points
            .iter()
            .enumerate()
            .map(|(i, &position)| ControlPoint {
                id: ids.get(i).copied().unwrap_or_else(ControlPointId::generate),
                position,
            })
            .collect();
        Ok(())
    }

    /// Drop everything (keeps the configured limits).
    pub fn clear(&mut self) {
        self.graph.clear();
        self.node_index.clear();
        self.connection_index.clear();
        self.paint_order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn abc() -> (SceneStore, NodeId, NodeId, NodeId) {
        let mut store = SceneStore::new();
        let a = store.add_node(NodeSpec::at(0.0, 0.0).with_text("A")).unwrap();
        let b = store.add_node(NodeSpec::at(200.0, 0.0).with_text("B")).unwrap();
        let c = store.add_node(NodeSpec::at(400.0, 0.0).with_text("C")).unwrap();
        (store, a, b, c)
    }

    #[test]
    fn add_connection_is_symmetric_and_idempotent() {
        let (mut store, a, b, _) = abc();
        let ab = store.add_connection(a, b).unwrap();
        let ba = store.add_connection(b, a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(store.add_connection(a, b).unwrap(), ab);
        assert_eq!(store.connection_count(), 1);
    }

    #[test]
    fn self_loop_is_rejected() {
        let (mut store, a, _, _) = abc();
        assert!(matches!(
            store.add_connection(a, a),
            Err(SceneError::InvalidEndpoints(_))
        ));
    }

    #[test]
    fn removing_middle_node_cascades_exactly_its_connections() {
        let (mut store, a, b, c) = abc();
        let ab = store.add_connection(a, b).unwrap();
        let bc = store.add_connection(b, c).unwrap();

        let mut removed = store.remove_node(b).unwrap();
        removed.sort_by_key(|id| id.to_string());
        let mut expected = vec![ab, bc];
        expected.sort_by_key(|id| id.to_string());

        assert_eq!(removed, expected);
        assert_eq!(store.connection_count(), 0);
        assert!(store.connection(ab).is_none());
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn move_node_reports_touching_connections() {
        let (mut store, a, b, c) = abc();
        let ab = store.add_connection(a, b).unwrap();
        store.add_connection(b, c).unwrap();
        let touched = store.move_node(a, Point::new(5.0, 5.0)).unwrap();
        assert_eq!(touched, vec![ab]);
        assert_eq!(store.node(a).unwrap().position, Point::new(5.0, 5.0));
    }

    #[test]
    fn unknown_ids_report_not_found() {
        let mut store = SceneStore::new();
        let ghost = NodeId::intern("ghost");
        assert!(matches!(
            store.remove_node(ghost),
            Err(SceneError::NotFound { .. })
        ));
        assert!(matches!(
            store.move_node(ghost, Point::ZERO),
            Err(SceneError::NotFound { .. })
        ));
        assert!(matches!(
            store.remove_connection(ConnectionId::intern("ghost_c")),
            Err(SceneError::NotFound { .. })
        ));
    }

    #[test]
    fn node_limit_reports_capacity() {
        let mut store = SceneStore::with_limits(StoreLimits {
            max_nodes: Some(1),
            max_connections: None,
        });
        store.add_node(NodeSpec::at(0.0, 0.0)).unwrap();
        assert!(matches!(
            store.add_node(NodeSpec::at(1.0, 1.0)),
            Err(SceneError::CapacityExceeded { what: "node", .. })
        ));
    }

    #[test]
    fn duplicate_explicit_node_id_is_rejected() {
        let mut store = SceneStore::new();
        let id = NodeId::intern("dup_node");
        store.add_node(NodeSpec::at(0.0, 0.0).with_id(id)).unwrap();
        assert!(matches!(
            store.add_node(NodeSpec::at(0.0, 0.0).with_id(id)),
            Err(SceneError::DuplicateId { .. })
        ));
    }

    #[test]
    fn set_control_points_caps_and_keeps_ids() {
        let (mut store, a, b, _) = abc();
        let ab = store.add_connection(a, b).unwrap();
        store
            .set_control_points(ab, &[Point::new(1.0, 1.0)])
            .unwrap();
        let first = store.connection(ab).unwrap().control_points[0].id;
        store
            .set_control_points(ab, &[Point::new(2.0, 2.0), Point::new(3.0, 3.0)])
            .unwrap();
        let conn = store.connection(ab).unwrap();
        assert_eq!(conn.control_points[0].id, first);
        assert_eq!(conn.control_points[1].position, Point::new(3.0, 3.0));

        let err = store
            .set_control_points(ab, &[Point::ZERO, Point::ZERO, Point::ZERO])
            .unwrap_err();
        assert!(matches!(err, SceneError::CapacityExceeded { .. }));
        assert_eq!(store.connection(ab).unwrap().degree(), 2);
    }

    #[test]
    fn paint_order_follows_insertion_and_bring_to_front() {
        let (mut store, a, b, c) = abc();
        store.bring_to_front(a).unwrap();
        let order: Vec<NodeId> = store.nodes().map(|n| n.id).collect();
        assert_eq!(order, vec![b, c, a]);
        store.remove_node(c).unwrap();
        let order: Vec<NodeId> = store.nodes().map(|n| n.id).collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn connection_between_ignores_direction() {
        let (mut store, a, b, c) = abc();
        let bc = store.add_connection(c, b).unwrap();
        assert_eq!(store.connection_between(b, c).map(|c| c.id), Some(bc));
        assert!(store.connection_between(a, c).is_none());
    }
}
