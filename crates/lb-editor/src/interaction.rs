//! Pointer gesture state machine.
//!
//! Exactly one [`Interaction`] is live at a time. Every non-idle variant
//! carries the id of the pointer that started it; that is the capture, and
//! it disappears with the variant on up or cancel.

use crate::editor::{Editor, PendingConnection};
use crate::engine::{Applied, Mutation};
use crate::input::{Modifiers, PointerButton, PointerId};
use lb_core::curve::ControlPointEdit;
use lb_core::geometry::{self, distance};
use lb_core::{ConnectionId, ControlPointId, NodeId, Point, SceneError, Vec2};
use lb_render::hit::{self, Hit};
use serde::Serialize;
use smallvec::SmallVec;

/// A node picked up by a drag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grab {
    pub id: NodeId,
    /// Node center minus the pointer's world position at press.
    pub offset: Vec2,
    pub original: Point,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Interaction {
    #[default]
    Idle,
    PanningCanvas {
        pointer: PointerId,
        /// Last device position.
        last: Point,
    },
    RectSelecting {
        pointer: PointerId,
        /// World corner fixed at press.
        anchor: Point,
        /// Device position at press.
        start: Point,
        current: Point,
        visible: bool,
        additive: bool,
    },
    DraggingNodes {
        pointer: PointerId,
        grabs: SmallVec<[Grab; 4]>,
        start: Point,
        moved: bool,
        clicked: NodeId,
        toggled: bool,
    },
    DraggingControlPoint {
        pointer: PointerId,
        connection: ConnectionId,
        point: ControlPointId,
        start: Point,
        original: Point,
        moved: bool,
        /// Added by this press (trunk click); a plain release keeps it.
        created: bool,
    },
    CreatingConnection {
        pointer: PointerId,
        source: NodeId,
        /// Pointer in world space.
        current: Point,
    },
}

/// Variant tag, for hosts and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionKind {
    Idle,
    PanningCanvas,
    RectSelecting,
    DraggingNodes,
    DraggingControlPoint,
    CreatingConnection,
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::Idle => InteractionKind::Idle,
            Self::PanningCanvas { .. } => InteractionKind::PanningCanvas,
            Self::RectSelecting { .. } => InteractionKind::RectSelecting,
            Self::DraggingNodes { .. } => InteractionKind::DraggingNodes,
            Self::DraggingControlPoint { .. } => InteractionKind::DraggingControlPoint,
            Self::CreatingConnection { .. } => InteractionKind::CreatingConnection,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// The capturing pointer, if a gesture is live.
    pub fn pointer(&self) -> Option<PointerId> {
        match self {
            Self::Idle => None,
            Self::PanningCanvas { pointer, .. }
            | Self::RectSelecting { pointer, .. }
            | Self::DraggingNodes { pointer, .. }
            | Self::DraggingControlPoint { pointer, .. }
            | Self::CreatingConnection { pointer, .. } => Some(*pointer),
        }
    }
}

impl Editor {
    pub(crate) fn pointer_down(
        &mut self,
        pointer: PointerId,
        device: Point,
        button: PointerButton,
        modifiers: Modifiers,
    ) {
        // Blur commits the label editor; the press does nothing else.
        if self.label_edit.is_some() {
            self.commit_label_edit();
            return;
        }
        if let Some(owner) = self.interaction.pointer() {
            log::trace!("pointer {pointer} ignored, captured by {owner}");
            return;
        }
        let refused = self.refused_press.take();

        let pans = button != PointerButton::Primary
            || self.space_held
            || (modifiers.alt && button == PointerButton::Primary);
        if pans {
            self.begin(Interaction::PanningCanvas {
                pointer,
                last: device,
            });
            return;
        }

        let world = self.to_world(device);
        let tol = self.config.tolerances(self.engine.viewport.zoom);
        let pending_end = self.pending.map(|p| p.end);
        let hit = hit::hit_test(&self.engine.store, world, pending_end, &tol);

        if let Some(pending) = self.pending.take() {
            self.engine.frame_mut().mark_overlays();
            if hit == Hit::PendingEndpoint {
                self.materialize(pending);
            } else {
                log::debug!("pending connection from {} discarded", pending.source);
            }
            return;
        }

        match hit {
            Hit::PendingEndpoint | Hit::Empty => {
                self.begin(Interaction::RectSelecting {
                    pointer,
                    anchor: world,
                    start: device,
                    current: world,
                    visible: false,
                    additive: modifiers.shift,
                });
            }
            Hit::ControlPoint { connection, point } => {
                let Some(original) = self
                    .engine
                    .store
                    .connection(connection)
                    .and_then(|c| c.point(point))
                    .map(|p| p.position)
                else {
                    return;
                };
                self.selection.select_connection(connection);
                self.begin(Interaction::DraggingControlPoint {
                    pointer,
                    connection,
                    point,
                    start: device,
                    original,
                    moved: false,
                    created: false,
                });
            }
            Hit::NodeInterior(id) => self.press_node(pointer, id, device, world, modifiers),
            Hit::NodeRing(source) => {
                self.begin(Interaction::CreatingConnection {
                    pointer,
                    source,
                    current: world,
                });
            }
            Hit::ConnectionTrunk { connection, at } => {
                self.selection.select_connection(connection);
                self.engine.frame_mut().mark_overlays();
                let result = self.engine.toggle_control_point(connection, at, tol.control_point);
                match result {
                    Ok(Applied::ControlPoint(ControlPointEdit::Added { id, .. })) => {
                        let original = self
                            .engine
                            .store
                            .connection(connection)
                            .and_then(|c| c.point(id))
                            .map_or(at, |p| p.position);
                        self.begin(Interaction::DraggingControlPoint {
                            pointer,
                            connection,
                            point: id,
                            start: device,
                            original,
                            moved: false,
                            created: true,
                        });
                    }
                    Ok(_) => {}
                    Err(e @ SceneError::CapacityExceeded { .. }) => {
                        // The second press of a click pair repeats the refusal.
                        let repeat = refused.is_some_and(|(c, p)| {
                            c == connection && distance(p, at) <= tol.control_point
                        });
                        if repeat {
                            log::debug!("repeated refusal on {connection} not surfaced");
                        } else {
                            self.report(&e);
                            self.refused_press = Some((connection, at));
                        }
                    }
                    Err(e) => self.report(&e),
                }
            }
        }
    }

    fn press_node(
        &mut self,
        pointer: PointerId,
        id: NodeId,
        device: Point,
        world: Point,
        modifiers: Modifiers,
    ) {
        let toggled = modifiers.shift;
        if toggled {
            self.selection.toggle(id);
        } else if !self.selection.contains(id) {
            self.selection.select_only(id);
        }
        self.engine.frame_mut().mark_overlays();

        let store = &self.engine.store;
        let grabs = self
            .selection
            .nodes
            .iter()
            .filter_map(|n| store.node(*n))
            .map(|n| Grab {
                id: n.id,
                offset: n.position - world,
                original: n.position,
            })
            .collect();
        self.begin(Interaction::DraggingNodes {
            pointer,
            grabs,
            start: device,
            moved: false,
            clicked: id,
            toggled,
        });
    }

    /// Confirm a pending connection: one new node, one new connection.
    fn materialize(&mut self, pending: PendingConnection) {
        let spec = self.default_node_spec(pending.end);
        let Some(Applied::Node(node)) = self.run(Mutation::AddNode(spec)) else {
            return;
        };
        let added = self.run(Mutation::AddConnection {
            from: pending.source,
            to: node,
        });
        if added.is_none() {
            self.run(Mutation::RemoveNode(node));
            return;
        }
        self.selection.select_only(node);
    }

    pub(crate) fn pointer_move(&mut self, pointer: PointerId, device: Point) {
        if self.interaction.pointer() != Some(pointer) {
            return;
        }
        let world = self.to_world(device);
        let mut state = std::mem::take(&mut self.interaction);
        match &mut state {
            Interaction::Idle => {}
            Interaction::PanningCanvas { last, .. } => {
                let delta = device - *last;
                *last = device;
                self.engine.pan(delta.x, delta.y);
            }
            Interaction::RectSelecting {
                start,
                current,
                visible,
                ..
            } => {
                *current = world;
                if !*visible && distance(*start, device) > self.config.select_threshold_px {
                    *visible = true;
                }
                if *visible {
                    self.engine.frame_mut().mark_overlays();
                }
            }
            Interaction::DraggingNodes {
                grabs,
                start,
                moved,
                ..
            } => {
                if *moved || distance(*start, device) > self.config.drag_threshold_px {
                    *moved = true;
                    // Nodes deleted mid-gesture drop out; the rest keep following.
                    grabs.retain(|g| self.engine.store.contains_node(g.id));
                    let moves = grabs.iter().map(|g| (g.id, world + g.offset)).collect();
                    self.run(Mutation::MoveNodes { moves });
                }
            }
            Interaction::DraggingControlPoint {
                connection,
                point,
                start,
                moved,
                ..
            } => {
                if *moved || distance(*start, device) > self.config.drag_threshold_px {
                    *moved = true;
                    self.run(Mutation::MoveControlPoint {
                        connection: *connection,
                        point: *point,
                        to: world,
                    });
                }
            }
            Interaction::CreatingConnection { current, .. } => {
                *current = world;
                self.engine.frame_mut().mark_overlays();
            }
        }
        self.interaction = state;
    }

    pub(crate) fn pointer_up(&mut self, pointer: PointerId, device: Point, _modifiers: Modifiers) {
        if self.interaction.pointer() != Some(pointer) {
            return;
        }
        let world = self.to_world(device);
        let state = std::mem::take(&mut self.interaction);
        self.engine.frame_mut().mark_overlays();
        match state {
            Interaction::Idle | Interaction::PanningCanvas { .. } => {}
            Interaction::RectSelecting {
                anchor,
                visible,
                additive,
                ..
            } => {
                if !visible {
                    self.selection.clear();
                    return;
                }
                let rect = geometry::rect_from_corners(anchor, world);
                let hits = hit::nodes_in_rect(&self.engine.store, rect);
                if !additive {
                    self.selection.clear();
                }
                for id in hits {
                    if !self.selection.contains(id) {
                        self.selection.nodes.push(id);
                    }
                }
                self.selection.connection = None;
            }
            Interaction::DraggingNodes {
                moved,
                clicked,
                toggled,
                ..
            } => {
                if !moved && !toggled && self.engine.store.contains_node(clicked) {
                    self.selection.select_only(clicked);
                }
            }
            Interaction::DraggingControlPoint {
                connection,
                point,
                moved,
                created,
                ..
            } => {
                if !moved && !created {
                    self.run(Mutation::RemoveControlPoint { connection, point });
                }
            }
            Interaction::CreatingConnection { source, .. } => {
                let ring = self.config.tolerances(self.engine.viewport.zoom).ring;
                match hit::node_under(&self.engine.store, world, ring) {
                    Some(target) if target == source => {
                        log::debug!("connection gesture released over its source");
                    }
                    Some(target) => {
                        if let Some(Applied::Connection(c)) = self.run(Mutation::AddConnection {
                            from: source,
                            to: target,
                        }) {
                            self.selection.select_connection(c);
                        }
                    }
                    None if self.engine.store.contains_node(source) => {
                        self.pending = Some(PendingConnection { source, end: world });
                    }
                    None => {}
                }
            }
        }
    }

    /// Resolve the live gesture without committing anything.
    pub(crate) fn pointer_cancel(&mut self, pointer: PointerId) {
        if self.interaction.pointer() != Some(pointer) {
            return;
        }
        let state = std::mem::take(&mut self.interaction);
        log::debug!("pointer {pointer} cancelled {:?}", state.kind());
        self.engine.frame_mut().mark_overlays();
        match state {
            Interaction::DraggingNodes {
                grabs, moved: true, ..
            } => {
                let moves = grabs
                    .iter()
                    .filter(|g| self.engine.store.contains_node(g.id))
                    .map(|g| (g.id, g.original))
                    .collect();
                self.run(Mutation::MoveNodes { moves });
            }
            Interaction::DraggingControlPoint {
                connection,
                point,
                original,
                moved,
                created,
                ..
            } => {
                if created {
                    self.run(Mutation::RemoveControlPoint { connection, point });
                } else if moved {
                    self.run(Mutation::MoveControlPoint {
                        connection,
                        point,
                        to: original,
                    });
                }
            }
            _ => {}
        }
    }

    fn begin(&mut self, interaction: Interaction) {
        log::trace!("begin {:?}", interaction.kind());
        self.interaction = interaction;
        self.engine.frame_mut().mark_overlays();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EditorConfig;
    use crate::input::InputEvent;
    use lb_core::NodeSpec;
    use pretty_assertions::assert_eq;

    fn editor() -> Editor {
        Editor::new(EditorConfig::default(), 800.0, 600.0)
    }

    #[test]
    fn kind_and_capture_follow_the_variant() {
        let idle = Interaction::Idle;
        assert_eq!(idle.kind(), InteractionKind::Idle);
        assert_eq!(idle.pointer(), None);
        let pan = Interaction::PanningCanvas {
            pointer: 4,
            last: Point::ZERO,
        };
        assert_eq!(pan.kind(), InteractionKind::PanningCanvas);
        assert_eq!(pan.pointer(), Some(4));
    }

    #[test]
    fn drag_moves_every_selected_node_by_the_same_delta() {
        let mut ed = editor();
        let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
        let b = ed.add_node(NodeSpec::at(300.0, 100.0)).unwrap();
        ed.select_nodes(&[a, b]);

        ed.handle(&InputEvent::down(1, 100.0, 100.0));
        assert_eq!(ed.interaction_kind(), InteractionKind::DraggingNodes);
        ed.handle(&InputEvent::moved(1, 130.0, 140.0));
        ed.handle(&InputEvent::up(1, 130.0, 140.0));

        assert_eq!(ed.store().node(a).unwrap().position, Point::new(130.0, 140.0));
        assert_eq!(ed.store().node(b).unwrap().position, Point::new(330.0, 140.0));
        assert_eq!(ed.selection().nodes, vec![a, b]);
        assert!(ed.interaction().is_idle());
    }

    #[test]
    fn click_without_drag_narrows_selection() {
        let mut ed = editor();
        let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
        let b = ed.add_node(NodeSpec::at(300.0, 100.0)).unwrap();
        ed.select_nodes(&[a, b]);
        ed.handle(&InputEvent::down(1, 301.0, 101.0));
        ed.handle(&InputEvent::up(1, 301.0, 101.0));
        assert_eq!(ed.selection().nodes, vec![b]);
        assert_eq!(ed.store().node(b).unwrap().position, Point::new(300.0, 100.0));
    }

    #[test]
    fn shift_click_toggles_membership() {
        let mut ed = editor();
        let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
        let b = ed.add_node(NodeSpec::at(300.0, 100.0)).unwrap();
        let shift_down = |x, y| InputEvent::PointerDown {
            pointer: 1,
            x,
            y,
            button: PointerButton::Primary,
            modifiers: Modifiers::SHIFT,
        };
        ed.handle(&shift_down(100.0, 100.0));
        ed.handle(&InputEvent::up(1, 100.0, 100.0));
        ed.handle(&shift_down(300.0, 100.0));
        ed.handle(&InputEvent::up(1, 300.0, 100.0));
        assert_eq!(ed.selection().nodes, vec![a, b]);
        ed.handle(&shift_down(100.0, 100.0));
        ed.handle(&InputEvent::up(1, 100.0, 100.0));
        assert_eq!(ed.selection().nodes, vec![b]);
    }

    #[test]
    fn cancel_restores_dragged_nodes() {
        let mut ed = editor();
        let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
        ed.handle(&InputEvent::down(1, 100.0, 100.0));
        ed.handle(&InputEvent::moved(1, 200.0, 200.0));
        assert_eq!(ed.store().node(a).unwrap().position, Point::new(200.0, 200.0));
        ed.handle(&InputEvent::PointerCancel { pointer: 1 });
        assert_eq!(ed.store().node(a).unwrap().position, Point::new(100.0, 100.0));
        assert!(ed.interaction().is_idle());
    }

    #[test]
    fn secondary_button_pans() {
        let mut ed = editor();
        ed.handle(&InputEvent::PointerDown {
            pointer: 1,
            x: 100.0,
            y: 100.0,
            button: PointerButton::Secondary,
            modifiers: Modifiers::NONE,
        });
        assert_eq!(ed.interaction_kind(), InteractionKind::PanningCanvas);
        ed.handle(&InputEvent::moved(1, 150.0, 80.0));
        ed.handle(&InputEvent::up(1, 150.0, 80.0));
        assert_eq!(ed.viewport().origin, Point::new(-50.0, 20.0));
    }
}
