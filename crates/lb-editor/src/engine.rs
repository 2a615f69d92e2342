//! Mutation engine: the single write path into the scene.
//!
//! Interactive gestures and external collaborators (property panel,
//! command surface, history) all go through [`SceneEngine::apply`]. Each
//! applied mutation marks the frame scheduler and announces a
//! [`SceneEvent`], so observers never have to diff the store.

use crate::config::EditorConfig;
use crate::frame::{DirtySet, FrameScheduler};
use lb_core::curve::{self, ControlPointEdit};
use lb_core::exchange;
use lb_core::*;
use smallvec::SmallVec;
use std::collections::HashMap;

/// A change to the scene.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddNode(NodeSpec),
    RemoveNode(NodeId),
    /// Absolute target positions, applied as one batch.
    MoveNodes {
        moves: SmallVec<[(NodeId, Point); 4]>,
    },
    SetNodeText {
        id: NodeId,
        text: String,
    },
    UpdateNodeStyle {
        id: NodeId,
        patch: StylePatch,
    },
    UpdateNodeShape {
        id: NodeId,
        patch: ShapePatch,
    },
    SetNodeImage {
        id: NodeId,
        image: Option<ImageOverlay>,
    },
    BringToFront(NodeId),
    AddConnection {
        from: NodeId,
        to: NodeId,
    },
    RemoveConnection(ConnectionId),
    MoveControlPoint {
        connection: ConnectionId,
        point: ControlPointId,
        to: Point,
    },
    RemoveControlPoint {
        connection: ConnectionId,
        point: ControlPointId,
    },
    SetControlPoints {
        connection: ConnectionId,
        points: Vec<Point>,
    },
    SetConnectionLabel {
        id: ConnectionId,
        label: Option<String>,
    },
    UpdateConnectionStyle {
        id: ConnectionId,
        style: ConnectionStyle,
    },
}

/// What an applied mutation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Node(NodeId),
    Connection(ConnectionId),
    ControlPoint(ControlPointEdit),
    /// Connections removed along with a node.
    Cascaded(Vec<ConnectionId>),
    Done,
}

pub struct SceneEngine {
    pub store: SceneStore,
    pub viewport: Viewport,
    events: EventHub,
    frame: FrameScheduler,
    shift_factor: f64,
}

impl SceneEngine {
    pub fn new(config: &EditorConfig, width: f64, height: f64) -> Self {
        Self {
            store: SceneStore::with_limits(config.store_limits()),
            viewport: Viewport::new(width, height).with_zoom_bounds(config.min_zoom, config.max_zoom),
            events: EventHub::new(),
            frame: FrameScheduler::new(),
            shift_factor: config.shift_factor,
        }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn frame(&self) -> &FrameScheduler {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut FrameScheduler {
        &mut self.frame
    }

    /// Drain pending redraw work (once per animation frame).
    pub fn flush_frame(&mut self) -> Option<DirtySet> {
        self.frame.flush()
    }

    pub fn shift_factor(&self) -> f64 {
        self.shift_factor
    }

    pub fn set_shift_factor(&mut self, factor: f64) {
        self.shift_factor = factor;
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Apply a mutation. Errors leave the store unchanged.
    pub fn apply(&mut self, mutation: Mutation) -> Result<Applied, SceneError> {
        match mutation {
            Mutation::AddNode(spec) => {
                let id = self.store.add_node(spec)?;
                self.frame.mark_node(id);
                self.emit(SceneEvent::NodeAdded(id));
                Ok(Applied::Node(id))
            }
            Mutation::RemoveNode(id) => {
                let cascaded = self.store.remove_node(id)?;
                self.frame.mark_node(id);
                for c in &cascaded {
                    self.frame.mark_connection(*c);
                }
                self.emit(SceneEvent::NodeRemoved {
                    id,
                    cascaded: cascaded.clone(),
                });
                Ok(Applied::Cascaded(cascaded))
            }
            Mutation::MoveNodes { moves } => {
                self.move_nodes(&moves)?;
                Ok(Applied::Done)
            }
            Mutation::SetNodeText { id, text } => {
                self.store.set_node_text(id, text)?;
                self.node_changed(id, SceneEvent::NodeTextChanged(id))
            }
            Mutation::UpdateNodeStyle { id, patch } => {
                self.store.update_node_style(id, &patch)?;
                self.node_changed(id, SceneEvent::NodeStyleChanged(id))
            }
            Mutation::UpdateNodeShape { id, patch } => {
                self.store.update_node_shape(id, &patch)?;
                // Edge-points depend on the shape.
                for c in self.store.connections_of(id) {
                    self.frame.mark_connection(c);
                }
                self.node_changed(id, SceneEvent::NodeShapeChanged(id))
            }
            Mutation::SetNodeImage { id, image } => {
                self.store.set_node_image(id, image)?;
                self.node_changed(id, SceneEvent::NodeImageChanged(id))
            }
            Mutation::BringToFront(id) => {
                self.store.bring_to_front(id)?;
                self.node_changed(id, SceneEvent::NodeRaised(id))
            }
            Mutation::AddConnection { from, to } => {
                let existed = self.store.connection_between(from, to).map(|c| c.id);
                let id = self.store.add_connection(from, to)?;
                if existed.is_none() {
                    self.frame.mark_connection(id);
                    self.emit(SceneEvent::ConnectionAdded(id));
                }
                Ok(Applied::Connection(id))
            }
            Mutation::RemoveConnection(id) => {
                self.store.remove_connection(id)?;
                self.frame.mark_connection(id);
                self.emit(SceneEvent::ConnectionRemoved(id));
                Ok(Applied::Done)
            }
            Mutation::MoveControlPoint {
                connection,
                point,
                to,
            } => {
                curve::move_control_point(self.store.connection_mut(connection)?, point, to)?;
                self.points_changed(connection)
            }
            Mutation::RemoveControlPoint { connection, point } => {
                curve::remove_control_point(self.store.connection_mut(connection)?, point)?;
                self.points_changed(connection)
            }
            Mutation::SetControlPoints { connection, points } => {
                self.store.set_control_points(connection, &points)?;
                self.points_changed(connection)
            }
            Mutation::SetConnectionLabel { id, label } => {
                self.store.set_connection_label(id, label)?;
                self.frame.mark_connection(id);
                self.emit(SceneEvent::ConnectionLabelChanged(id));
                Ok(Applied::Done)
            }
            Mutation::UpdateConnectionStyle { id, style } => {
                self.store.update_connection_style(id, style)?;
                self.frame.mark_connection(id);
                self.emit(SceneEvent::ConnectionStyleChanged(id));
                Ok(Applied::Done)
            }
        }
    }

    /// Click-to-edit with an explicit world-space tolerance.
    pub fn toggle_control_point(
        &mut self,
        connection: ConnectionId,
        at: Point,
        tolerance: f64,
    ) -> Result<Applied, SceneError> {
        let conn = self
            .store
            .connection(connection)
            .ok_or_else(|| SceneError::connection_not_found(connection))?;
        let path = curve::route(&self.store, conn)?;
        let conn = self.store.connection_mut(connection)?;
        let edit = curve::toggle_control_point(conn, &path, at, tolerance)?;
        self.points_changed(connection)?;
        Ok(Applied::ControlPoint(edit))
    }

    /// Move a batch of nodes and drag-follow every touched connection
    /// exactly once, even when both of its endpoints moved.
    fn move_nodes(&mut self, moves: &[(NodeId, Point)]) -> Result<(), SceneError> {
        // Validate up front so a bad id leaves the batch unapplied.
        let mut before: HashMap<NodeId, Point> = HashMap::with_capacity(moves.len());
        for (id, _) in moves {
            let node = self
                .store
                .node(*id)
                .ok_or_else(|| SceneError::node_not_found(*id))?;
            before.insert(*id, node.position);
        }

        let old_mid = |store: &SceneStore, conn: &Connection| -> Option<Point> {
            let pos = |id: NodeId| {
                before
                    .get(&id)
                    .copied()
                    .or_else(|| store.node(id).map(|n| n.position))
            };
            Some(pos(conn.from)?.midpoint(pos(conn.to)?))
        };

        let mut touched: Vec<(ConnectionId, Point)> = Vec::new();
        for (id, _) in moves {
            for c in self.store.connections_of(*id) {
                if touched.iter().any(|(t, _)| *t == c) {
                    continue;
                }
                if let Some(conn) = self.store.connection(c)
                    && let Some(mid) = old_mid(&self.store, conn)
                {
                    touched.push((c, mid));
                }
            }
        }

        for (id, to) in moves {
            self.store.move_node(*id, *to)?;
            self.frame.mark_node(*id);
        }

        for (c, old) in touched {
            let Some((from, to)) = self
                .store
                .connection(c)
                .and_then(|conn| self.store.endpoints(conn))
            else {
                continue;
            };
            let new = curve::center_midpoint(from, to);
            let factor = self.shift_factor;
            curve::follow_endpoints(self.store.connection_mut(c)?, old, new, factor);
            self.frame.mark_connection(c);
        }

        self.emit(SceneEvent::NodesMoved(moves.iter().map(|(id, _)| *id).collect()));
        Ok(())
    }

    fn node_changed(&mut self, id: NodeId, event: SceneEvent) -> Result<Applied, SceneError> {
        self.frame.mark_node(id);
        self.emit(event);
        Ok(Applied::Done)
    }

    fn points_changed(&mut self, connection: ConnectionId) -> Result<Applied, SceneError> {
        self.frame.mark_connection(connection);
        self.emit(SceneEvent::ControlPointsChanged(connection));
        Ok(Applied::Done)
    }

    fn emit(&self, event: SceneEvent) {
        log::trace!("scene event {event:?}");
        self.events.emit(&event);
    }

    // ─── Viewport ────────────────────────────────────────────────────────

    pub fn pan(&mut self, ddx: f64, ddy: f64) {
        self.viewport.pan(ddx, ddy);
        self.frame.mark_viewport();
    }

    pub fn zoom_at(&mut self, dx: f64, dy: f64, factor: f64) {
        self.viewport.zoom_at(dx, dy, factor);
        self.frame.mark_viewport();
    }

    pub fn set_viewport(&mut self, origin: Point, zoom: f64) {
        self.viewport.set(origin, zoom);
        self.frame.mark_viewport();
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.resize(width, height);
        self.frame.mark_viewport();
    }

    // ─── Whole-scene operations ──────────────────────────────────────────

    pub fn export_json(&self) -> Result<String, SceneError> {
        exchange::export_json(&self.store)
    }

    /// Replace the scene from exchange JSON. The store is untouched on error.
    pub fn import_json(&mut self, json: &str) -> Result<(), SceneError> {
        exchange::import_json(&mut self.store, json)?;
        self.scene_replaced();
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Vec<u8>, SceneError> {
        exchange::snapshot(&self.store)
    }

    /// History collaborator's restore hook.
    pub fn apply_state(&mut self, snapshot: &[u8]) -> Result<(), SceneError> {
        exchange::apply_state(&mut self.store, snapshot)?;
        self.scene_replaced();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.scene_replaced();
    }

    fn scene_replaced(&mut self) {
        self.frame.mark_scene();
        self.emit(SceneEvent::SceneReplaced);
    }
}
