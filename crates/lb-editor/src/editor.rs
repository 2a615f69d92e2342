//! Editor facade: the scene engine plus everything ephemeral around it.
//!
//! Holds selection, the live interaction session, a pending connection
//! awaiting confirmation, the label-edit sub-mode, and user-visible
//! notices. Pointer handling lives in [`crate::interaction`]; this module
//! owns the keyboard, the command surface, and the render projection.

use crate::config::EditorConfig;
use crate::engine::{Applied, Mutation, SceneEngine};
use crate::frame::DirtySet;
use crate::input::InputEvent;
use crate::interaction::{Interaction, InteractionKind};
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use lb_core::curve;
use lb_core::*;
use lb_render::hit::{self, Hit};
use lb_render::tree::{LabelTarget, OverlayState, RenderTree, build_tree};
use serde::Serialize;

/// Selected nodes (ordered by selection) and at most one connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub nodes: Vec<NodeId>,
    pub connection: Option<ConnectionId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.connection.is_none()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.connection = None;
    }

    pub fn select_only(&mut self, id: NodeId) {
        self.nodes.clear();
        self.nodes.push(id);
        self.connection = None;
    }

    pub fn select_connection(&mut self, id: ConnectionId) {
        self.nodes.clear();
        self.connection = Some(id);
    }

    /// Shift-click: add when absent, remove when present.
    pub fn toggle(&mut self, id: NodeId) {
        if let Some(pos) = self.nodes.iter().position(|n| *n == id) {
            self.nodes.remove(pos);
        } else {
            self.nodes.push(id);
        }
        self.connection = None;
    }

    /// Drop ids that no longer exist.
    fn prune(&mut self, store: &SceneStore) {
        self.nodes.retain(|id| store.contains_node(*id));
        if self.connection.is_some_and(|c| store.connection(c).is_none()) {
            self.connection = None;
        }
    }
}

/// A connection dragged onto empty canvas, waiting for a confirming click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingConnection {
    pub source: NodeId,
    /// World position of the indicator.
    pub end: Point,
}

/// Label-edit sub-mode.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEdit {
    pub target: LabelTarget,
    pub draft: String,
}

/// Transient message for the host's toast area.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub message: String,
}

pub struct Editor {
    pub(crate) config: EditorConfig,
    pub(crate) engine: SceneEngine,
    pub(crate) interaction: Interaction,
    pub(crate) selection: Selection,
    pub(crate) pending: Option<PendingConnection>,
    pub(crate) label_edit: Option<LabelEdit>,
    pub(crate) notices: Vec<Notice>,
    /// Space bar held: pointer-down pans.
    pub(crate) space_held: bool,
    /// Trunk press refused at capacity by the previous press, if that was
    /// the last press.
    pub(crate) refused_press: Option<(ConnectionId, Point)>,
}

impl Editor {
    pub fn new(config: EditorConfig, width: f64, height: f64) -> Self {
        let engine = SceneEngine::new(&config, width, height);
        Self {
            config,
            engine,
            interaction: Interaction::Idle,
            selection: Selection::default(),
            pending: None,
            label_edit: None,
            notices: Vec::new(),
            space_held: false,
            refused_press: None,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn engine(&self) -> &SceneEngine {
        &self.engine
    }

    pub fn store(&self) -> &SceneStore {
        &self.engine.store
    }

    pub fn viewport(&self) -> &Viewport {
        &self.engine.viewport
    }

    pub fn events(&self) -> &EventHub {
        self.engine.events()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn interaction_kind(&self) -> InteractionKind {
        self.interaction.kind()
    }

    pub fn pending(&self) -> Option<&PendingConnection> {
        self.pending.as_ref()
    }

    pub fn label_edit(&self) -> Option<&LabelEdit> {
        self.label_edit.as_ref()
    }

    /// Drain notices accumulated since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ─── Input dispatch ──────────────────────────────────────────────────

    /// Feed one input event. Returns `true` when a redraw is owed.
    pub fn handle(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::PointerDown {
                pointer,
                x,
                y,
                button,
                modifiers,
            } => self.pointer_down(*pointer, Point::new(*x, *y), *button, *modifiers),
            InputEvent::PointerMove {
                pointer, x, y, ..
            } => self.pointer_move(*pointer, Point::new(*x, *y)),
            InputEvent::PointerUp {
                pointer,
                x,
                y,
                modifiers,
            } => self.pointer_up(*pointer, Point::new(*x, *y), *modifiers),
            InputEvent::PointerCancel { pointer } => self.pointer_cancel(*pointer),
            InputEvent::DoubleClick { x, y } => self.double_click(Point::new(*x, *y)),
            InputEvent::Scroll { x, y, dx, dy, zoom } => self.scroll(*x, *y, *dx, *dy, *zoom),
            InputEvent::KeyDown { key, modifiers } => self.key_down(key, *modifiers),
            InputEvent::KeyUp { key, .. } => {
                if key == " " {
                    self.space_held = false;
                }
            }
            InputEvent::TextInput { text } => {
                if let Some(edit) = self.label_edit.as_mut() {
                    edit.draft.push_str(text);
                    self.engine.frame_mut().mark_overlays();
                }
            }
        }
        self.engine.frame().is_pending()
    }

    fn scroll(&mut self, x: f64, y: f64, dx: f64, dy: f64, zoom: f64) {
        if self.label_edit.is_some() {
            return;
        }
        if (zoom - 1.0).abs() > f64::EPSILON {
            self.engine.zoom_at(x, y, zoom);
        } else {
            self.engine.pan(-dx, -dy);
        }
    }

    fn key_down(&mut self, key: &str, modifiers: crate::input::Modifiers) {
        if self.label_edit.is_some() {
            match key {
                "Escape" => self.cancel_label_edit(),
                "Enter" if !modifiers.shift => self.commit_label_edit(),
                "Enter" => self.push_label_text("\n"),
                "Backspace" => {
                    if let Some(edit) = self.label_edit.as_mut() {
                        edit.draft.pop();
                        self.engine.frame_mut().mark_overlays();
                    }
                }
                _ => {}
            }
            return;
        }

        let Some(action) = ShortcutMap::resolve(key, modifiers) else {
            return;
        };
        log::debug!("shortcut {key:?} → {action:?}");
        match action {
            ShortcutAction::PanStart => self.space_held = true,
            ShortcutAction::Cancel => self.escape(),
            ShortcutAction::Delete => {
                if self.interaction.is_idle() {
                    self.delete_selection();
                }
            }
            ShortcutAction::SelectAll => {
                if self.interaction.is_idle() {
                    self.selection.nodes = self.engine.store.nodes().map(|n| n.id).collect();
                    self.selection.connection = None;
                    self.engine.frame_mut().mark_overlays();
                }
            }
            ShortcutAction::EditLabel => {
                if self.interaction.is_idle() {
                    match (self.selection.nodes.as_slice(), self.selection.connection) {
                        ([id], None) => self.begin_label_edit(LabelTarget::Node(*id)),
                        ([], Some(c)) => self.begin_label_edit(LabelTarget::Connection(c)),
                        _ => {}
                    }
                }
            }
            ShortcutAction::ZoomIn => self.zoom_center(self.config.zoom_step),
            ShortcutAction::ZoomOut => self.zoom_center(1.0 / self.config.zoom_step),
            ShortcutAction::ZoomReset => self.zoom_center(1.0 / self.engine.viewport.zoom),
        }
    }

    fn zoom_center(&mut self, factor: f64) {
        let c = self.engine.viewport.device_center();
        self.engine.zoom_at(c.x, c.y, factor);
    }

    /// Escape: cancel the live gesture, else the pending connection, else
    /// the selection. Never touches the store.
    fn escape(&mut self) {
        match self.interaction.kind() {
            InteractionKind::CreatingConnection | InteractionKind::RectSelecting => {
                log::debug!("escape cancels {:?}", self.interaction.kind());
                self.interaction = Interaction::Idle;
            }
            InteractionKind::Idle if self.pending.is_some() => {
                self.pending = None;
            }
            InteractionKind::Idle => self.selection.clear(),
            // Drags finish on pointer-up or cancel.
            _ => return,
        }
        self.engine.frame_mut().mark_overlays();
    }

    // ─── Label editing ───────────────────────────────────────────────────

    pub fn begin_label_edit(&mut self, target: LabelTarget) {
        let draft = match target {
            LabelTarget::Node(id) => self.engine.store.node(id).map(|n| n.text.clone()),
            LabelTarget::Connection(id) => self
                .engine
                .store
                .connection(id)
                .map(|c| c.label.clone().unwrap_or_default()),
        };
        let Some(draft) = draft else {
            log::debug!("label edit target {target:?} not found");
            return;
        };
        self.pending = None;
        self.label_edit = Some(LabelEdit { target, draft });
        self.engine.frame_mut().mark_overlays();
    }

    fn push_label_text(&mut self, text: &str) {
        if let Some(edit) = self.label_edit.as_mut() {
            edit.draft.push_str(text);
            self.engine.frame_mut().mark_overlays();
        }
    }

    /// Replace the draft wholesale (host-side input element).
    pub fn set_label_draft(&mut self, draft: &str) {
        if let Some(edit) = self.label_edit.as_mut() {
            edit.draft = draft.to_string();
            self.engine.frame_mut().mark_overlays();
        }
    }

    pub fn commit_label_edit(&mut self) {
        let Some(LabelEdit { target, draft }) = self.label_edit.take() else {
            return;
        };
        let mutation = match target {
            LabelTarget::Node(id) => Mutation::SetNodeText { id, text: draft },
            LabelTarget::Connection(id) => Mutation::SetConnectionLabel {
                id,
                label: (!draft.is_empty()).then_some(draft),
            },
        };
        self.run(mutation);
        self.engine.frame_mut().mark_overlays();
    }

    pub fn cancel_label_edit(&mut self) {
        if self.label_edit.take().is_some() {
            self.engine.frame_mut().mark_overlays();
        }
    }

    fn double_click(&mut self, device: Point) {
        if self.label_edit.is_some() || !self.interaction.is_idle() {
            return;
        }
        let world = self.to_world(device);
        let tol = self.config.tolerances(self.engine.viewport.zoom);
        match hit::hit_test(&self.engine.store, world, None, &tol) {
            Hit::NodeInterior(id) | Hit::NodeRing(id) => {
                self.selection.select_only(id);
                self.begin_label_edit(LabelTarget::Node(id));
            }
            Hit::ConnectionTrunk { connection, .. } | Hit::ControlPoint { connection, .. } => {
                self.selection.select_connection(connection);
                self.begin_label_edit(LabelTarget::Connection(connection));
            }
            Hit::PendingEndpoint | Hit::Empty => {}
        }
    }

    // ─── Mutation plumbing ───────────────────────────────────────────────

    /// Apply through the engine, turning errors into logs or notices.
    pub(crate) fn run(&mut self, mutation: Mutation) -> Option<Applied> {
        self.apply(mutation).ok()
    }

    /// Apply through the engine and keep selection consistent. Capacity
    /// and persistence errors are also queued as notices.
    pub fn apply(&mut self, mutation: Mutation) -> Result<Applied, SceneError> {
        let removal = matches!(
            mutation,
            Mutation::RemoveNode(_) | Mutation::RemoveConnection(_)
        );
        let result = self.engine.apply(mutation);
        match &result {
            Ok(_) if removal => self.after_removal(),
            Ok(_) => {}
            Err(e) => self.report(e),
        }
        result
    }

    pub(crate) fn report(&mut self, error: &SceneError) {
        if error.is_user_visible() {
            log::warn!("{error}");
            self.notices.push(Notice {
                message: error.to_string(),
            });
        } else {
            log::debug!("ignored: {error}");
        }
    }

    fn after_removal(&mut self) {
        self.selection.prune(&self.engine.store);
        if let Some(p) = self.pending
            && !self.engine.store.contains_node(p.source)
        {
            self.pending = None;
        }
        if let Some(edit) = &self.label_edit {
            let alive = match edit.target {
                LabelTarget::Node(id) => self.engine.store.contains_node(id),
                LabelTarget::Connection(id) => self.engine.store.connection(id).is_some(),
            };
            if !alive {
                self.label_edit = None;
            }
        }
        self.engine.frame_mut().mark_overlays();
    }

    fn delete_selection(&mut self) {
        let nodes = std::mem::take(&mut self.selection.nodes);
        for id in nodes {
            self.run(Mutation::RemoveNode(id));
        }
        if let Some(c) = self.selection.connection.take() {
            self.run(Mutation::RemoveConnection(c));
        }
        self.engine.frame_mut().mark_overlays();
    }

    pub(crate) fn to_world(&self, device: Point) -> Point {
        self.engine.viewport.screen_to_world(device.x, device.y)
    }

    // ─── Command surface ─────────────────────────────────────────────────

    pub fn add_node(&mut self, spec: NodeSpec) -> Result<NodeId, SceneError> {
        match self.apply(Mutation::AddNode(spec))? {
            Applied::Node(id) => Ok(id),
            other => Err(SceneError::InvalidGeometry(format!(
                "unexpected result {other:?}"
            ))),
        }
    }

    /// Node with the configured default shape and size.
    pub fn default_node_spec(&self, at: Point) -> NodeSpec {
        NodeSpec {
            position: at,
            shape: Shape::new(
                self.config.default_shape,
                self.config.default_node_width,
                self.config.default_node_height,
            ),
            ..NodeSpec::default()
        }
    }

    pub fn delete_nodes(&mut self, ids: &[NodeId]) -> Result<Vec<ConnectionId>, SceneError> {
        let mut cascaded = Vec::new();
        for id in ids {
            if let Applied::Cascaded(c) = self.apply(Mutation::RemoveNode(*id))? {
                cascaded.extend(c);
            }
        }
        Ok(cascaded)
    }

    pub fn add_connection(&mut self, a: NodeId, b: NodeId) -> Result<ConnectionId, SceneError> {
        match self.apply(Mutation::AddConnection { from: a, to: b })? {
            Applied::Connection(id) => Ok(id),
            other => Err(SceneError::InvalidGeometry(format!(
                "unexpected result {other:?}"
            ))),
        }
    }

    pub fn delete_connection(&mut self, id: ConnectionId) -> Result<(), SceneError> {
        self.apply(Mutation::RemoveConnection(id)).map(|_| ())
    }

    pub fn set_control_points(
        &mut self,
        connection: ConnectionId,
        points: Vec<Point>,
    ) -> Result<(), SceneError> {
        self.apply(Mutation::SetControlPoints { connection, points })
            .map(|_| ())
    }

    pub fn set_viewport(&mut self, origin: Point, zoom: f64) {
        self.engine.set_viewport(origin, zoom);
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.engine.resize(width, height);
    }

    pub fn select_nodes(&mut self, ids: &[NodeId]) {
        self.selection.nodes = ids
            .iter()
            .copied()
            .filter(|id| self.engine.store.contains_node(*id))
            .collect();
        self.selection.connection = None;
        self.engine.frame_mut().mark_overlays();
    }

    pub fn export_json(&self) -> Result<String, SceneError> {
        self.engine.export_json()
    }

    pub fn import_json(&mut self, json: &str) -> Result<(), SceneError> {
        let result = self.engine.import_json(json);
        match &result {
            Ok(()) => self.reset_ephemeral(),
            Err(e) => self.report(e),
        }
        result
    }

    pub fn snapshot(&self) -> Result<Vec<u8>, SceneError> {
        self.engine.snapshot()
    }

    pub fn apply_state(&mut self, snapshot: &[u8]) -> Result<(), SceneError> {
        let result = self.engine.apply_state(snapshot);
        match &result {
            Ok(()) => {
                self.selection.prune(&self.engine.store);
                self.pending = None;
                self.label_edit = None;
                self.interaction = Interaction::Idle;
            }
            Err(e) => self.report(e),
        }
        result
    }

    pub fn clear(&mut self) {
        self.engine.clear();
        self.reset_ephemeral();
    }

    fn reset_ephemeral(&mut self) {
        self.selection.clear();
        self.pending = None;
        self.label_edit = None;
        self.refused_press = None;
        self.interaction = Interaction::Idle;
    }

    // ─── Rendering ───────────────────────────────────────────────────────

    pub fn overlay_state(&self) -> OverlayState {
        let store = &self.engine.store;
        let mut overlay = OverlayState {
            selected_nodes: self.selection.nodes.clone(),
            selected_connections: self.selection.connection.into_iter().collect(),
            label_editor: self
                .label_edit
                .as_ref()
                .map(|e| (e.target, e.draft.clone())),
            ..OverlayState::default()
        };

        if let Some(p) = &self.pending
            && let Some(source) = store.node(p.source)
        {
            overlay.pending = Some(curve::preview(source, p.end, None));
        }

        match &self.interaction {
            Interaction::CreatingConnection {
                source, current, ..
            } => {
                if let Some(src) = store.node(*source) {
                    let ring = self.config.tolerances(self.engine.viewport.zoom).ring;
                    let target = hit::node_under(store, *current, ring)
                        .filter(|t| t != source)
                        .and_then(|t| store.node(t));
                    overlay.preview = Some(curve::preview(src, *current, target));
                }
            }
            Interaction::RectSelecting {
                anchor,
                current,
                visible: true,
                ..
            } => {
                overlay.marquee = Some(geometry::rect_from_corners(*anchor, *current));
            }
            _ => {}
        }
        overlay
    }

    pub fn render_tree(&self) -> RenderTree {
        build_tree(
            &self.engine.store,
            &self.engine.viewport,
            &self.overlay_state(),
            &self.config.render_options(),
        )
    }

    /// Once per animation frame: the tree to draw, if anything changed.
    pub fn frame(&mut self) -> Option<(DirtySet, RenderTree)> {
        let dirty = self.engine.flush_frame()?;
        Some((dirty, self.render_tree()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use pretty_assertions::assert_eq;

    fn editor() -> Editor {
        Editor::new(EditorConfig::default(), 800.0, 600.0)
    }

    #[test]
    fn select_all_then_delete_cascades() {
        let mut ed = editor();
        let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
        let b = ed.add_node(NodeSpec::at(400.0, 100.0)).unwrap();
        ed.add_connection(a, b).unwrap();

        ed.handle(&InputEvent::KeyDown {
            key: "a".into(),
            modifiers: Modifiers {
                ctrl: true,
                ..Modifiers::NONE
            },
        });
        assert_eq!(ed.selection().nodes, vec![a, b]);

        ed.handle(&InputEvent::key("Delete"));
        assert!(ed.store().is_empty());
        assert_eq!(ed.store().connection_count(), 0);
        assert!(ed.selection().is_empty());
    }

    #[test]
    fn keyboard_zoom_is_centered_and_reset_returns_to_one() {
        let mut ed = editor();
        let center_world = ed.viewport().screen_to_world(400.0, 300.0);
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        ed.handle(&InputEvent::KeyDown {
            key: "=".into(),
            modifiers: ctrl,
        });
        assert!((ed.viewport().zoom - 1.2).abs() < 1e-12);
        let after = ed.viewport().screen_to_world(400.0, 300.0);
        assert!((after - center_world).hypot() < 1e-9);

        ed.handle(&InputEvent::KeyDown {
            key: "0".into(),
            modifiers: ctrl,
        });
        assert!((ed.viewport().zoom - 1.0).abs() < 1e-12);
    }

    #[test]
    fn wheel_pans_and_pinch_zooms() {
        let mut ed = editor();
        ed.handle(&InputEvent::Scroll {
            x: 0.0,
            y: 0.0,
            dx: 10.0,
            dy: 20.0,
            zoom: 1.0,
        });
        assert_eq!(ed.viewport().origin, Point::new(10.0, 20.0));
        ed.handle(&InputEvent::Scroll {
            x: 100.0,
            y: 100.0,
            dx: 0.0,
            dy: 0.0,
            zoom: 2.0,
        });
        assert_eq!(ed.viewport().zoom, 2.0);
    }

    #[test]
    fn capacity_errors_become_notices() {
        let config = EditorConfig {
            max_nodes: Some(1),
            ..EditorConfig::default()
        };
        let mut ed = Editor::new(config, 800.0, 600.0);
        ed.add_node(NodeSpec::at(0.0, 0.0)).unwrap();
        assert!(ed.add_node(NodeSpec::at(10.0, 0.0)).is_err());
        let notices = ed.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("node limit"));
        assert!(ed.take_notices().is_empty());
    }

    #[test]
    fn failed_import_keeps_scene_and_reports() {
        let mut ed = editor();
        ed.add_node(NodeSpec::at(0.0, 0.0)).unwrap();
        assert!(ed.import_json("{\"nodes\": 7}").is_err());
        assert_eq!(ed.store().node_count(), 1);
        assert_eq!(ed.take_notices().len(), 1);
    }

    #[test]
    fn enter_edits_label_of_single_selection() {
        let mut ed = editor();
        let a = ed.add_node(NodeSpec::at(0.0, 0.0).with_text("Old")).unwrap();
        ed.select_nodes(&[a]);
        ed.handle(&InputEvent::key("Enter"));
        assert_eq!(ed.label_edit().map(|e| e.draft.as_str()), Some("Old"));
        ed.handle(&InputEvent::key("Backspace"));
        ed.handle(&InputEvent::TextInput { text: "k!".into() });
        ed.handle(&InputEvent::key("Enter"));
        assert!(ed.label_edit().is_none());
        assert_eq!(ed.store().node(a).unwrap().text, "Olk!");
    }

    #[test]
    fn frame_flushes_once() {
        let mut ed = editor();
        ed.add_node(NodeSpec::at(0.0, 0.0)).unwrap();
        ed.handle(&InputEvent::Scroll {
            x: 0.0,
            y: 0.0,
            dx: 1.0,
            dy: 1.0,
            zoom: 1.0,
        });
        let (dirty, tree) = ed.frame().unwrap();
        assert!(dirty.viewport);
        assert_eq!(tree.nodes.len(), 1);
        assert!(ed.frame().is_none());
    }
}
