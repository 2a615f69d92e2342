//! WASM bridge for Linkboard: exposes the editor to the browser host.
//!
//! Built with `wasm-pack build --target web`. The host forwards DOM pointer,
//! wheel, and keyboard events, then calls [`LbCanvas::frame`] once per
//! animation frame and draws the returned render tree.

use lb_core::{
    ConnectionId, ConnectionStyle, ImageOverlay, NodeId, NodeSpec, NodeStyle, Point, SceneDocument,
    SceneError, SceneEvent, Shape, ShapePatch, StylePatch, Subscription,
};
use lb_editor::{Editor, EditorConfig, InputEvent, Modifiers, Mutation, PointerButton};
use lb_render::{export_svg, render_svg};
use serde::Deserialize;
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// Node creation payload from the host. Only `x` and `y` are required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeInput {
    #[serde(default)]
    id: Option<String>,
    x: f64,
    y: f64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    shape: Option<Shape>,
    #[serde(default)]
    style: Option<NodeStyle>,
    #[serde(default)]
    image: Option<ImageOverlay>,
}

#[derive(Debug, Deserialize)]
struct PointInput {
    x: f64,
    y: f64,
}

/// The browser-facing canvas controller.
///
/// Owns the editor and a buffer of scene events the host drains with
/// [`LbCanvas::take_events`] (history, dirty-file tracking).
#[wasm_bindgen]
pub struct LbCanvas {
    editor: Editor,
    events: Rc<RefCell<Vec<SceneEvent>>>,
    _subscription: Subscription,
}

#[wasm_bindgen]
impl LbCanvas {
    #[wasm_bindgen(constructor)]
    pub fn new(width: f64, height: f64) -> Self {
        Self::build(EditorConfig::default(), width, height)
    }

    /// Construct with a JSON config (camelCase keys, all optional).
    pub fn with_config(config_json: &str, width: f64, height: f64) -> Result<LbCanvas, JsValue> {
        let config =
            EditorConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(Self::build(config, width, height))
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.editor.resize(width, height);
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Returns `true` when a redraw is owed.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_pointer_down(
        &mut self,
        pointer_id: u32,
        x: f64,
        y: f64,
        button: i16,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> bool {
        self.editor.handle(&InputEvent::PointerDown {
            pointer: pointer_id,
            x,
            y,
            button: PointerButton::from_dom(button),
            modifiers: modifiers(shift, ctrl, alt, meta),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn handle_pointer_move(
        &mut self,
        pointer_id: u32,
        x: f64,
        y: f64,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> bool {
        self.editor.handle(&InputEvent::PointerMove {
            pointer: pointer_id,
            x,
            y,
            modifiers: modifiers(shift, ctrl, alt, meta),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn handle_pointer_up(
        &mut self,
        pointer_id: u32,
        x: f64,
        y: f64,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> bool {
        self.editor.handle(&InputEvent::PointerUp {
            pointer: pointer_id,
            x,
            y,
            modifiers: modifiers(shift, ctrl, alt, meta),
        })
    }

    /// `pointercancel`, `lostpointercapture`, or window blur.
    pub fn handle_pointer_cancel(&mut self, pointer_id: u32) -> bool {
        self.editor.handle(&InputEvent::PointerCancel {
            pointer: pointer_id,
        })
    }

    pub fn handle_double_click(&mut self, x: f64, y: f64) -> bool {
        self.editor.handle(&InputEvent::DoubleClick { x, y })
    }

    /// Wheel or trackpad pinch. `zoom` is 1.0 for a plain scroll.
    pub fn handle_wheel(&mut self, x: f64, y: f64, dx: f64, dy: f64, zoom: f64) -> bool {
        self.editor.handle(&InputEvent::Scroll { x, y, dx, dy, zoom })
    }

    pub fn handle_key(&mut self, key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> bool {
        self.editor.handle(&InputEvent::KeyDown {
            key: key.to_string(),
            modifiers: modifiers(shift, ctrl, alt, meta),
        })
    }

    pub fn handle_key_up(&mut self, key: &str) -> bool {
        self.editor.handle(&InputEvent::KeyUp {
            key: key.to_string(),
            modifiers: Modifiers::NONE,
        })
    }

    /// Committed text from the label editor's input element.
    pub fn handle_text(&mut self, text: &str) -> bool {
        self.editor.handle(&InputEvent::TextInput {
            text: text.to_string(),
        })
    }

    /// Replace the label draft wholesale (the host owns the text field).
    pub fn set_label_draft(&mut self, draft: &str) {
        self.editor.set_label_draft(draft);
    }

    pub fn commit_label(&mut self) {
        self.editor.commit_label_edit();
    }

    pub fn cancel_label(&mut self) {
        self.editor.cancel_label_edit();
    }

    // ─── Rendering ───────────────────────────────────────────────────────

    /// `{"dirty":..,"tree":..}` for this animation frame, or an empty string
    /// when nothing changed since the last frame. `dirty` lists the node and
    /// connection ids touched since the previous frame so the host can patch
    /// only those; `tree` is always complete.
    pub fn frame(&mut self) -> String {
        match self.editor.frame() {
            Some((dirty, tree)) => json!({ "dirty": dirty, "tree": tree }).to_string(),
            None => String::new(),
        }
    }

    /// Current render tree JSON regardless of pending work.
    pub fn render_tree(&self) -> String {
        serde_json::to_string(&self.editor.render_tree()).unwrap_or_else(|_| "{}".to_string())
    }

    /// The visible canvas as SVG, overlays included.
    pub fn render_svg(&self) -> String {
        render_svg(&self.editor.render_tree())
    }

    /// The whole scene as a standalone SVG document.
    pub fn export_svg(&self) -> String {
        export_svg(self.editor.store())
    }

    // ─── State queries ───────────────────────────────────────────────────

    pub fn interaction(&self) -> String {
        serde_json::to_string(&self.editor.interaction_kind())
            .map(|s| s.trim_matches('"').to_string())
            .unwrap_or_default()
    }

    /// `{"nodes":[...],"connection":"..."|null}`
    pub fn get_selection(&self) -> String {
        let selection = self.editor.selection();
        json!({
            "nodes": selection.nodes,
            "connection": selection.connection,
        })
        .to_string()
    }

    /// `{"source":"...","x":..,"y":..}` or `null`.
    pub fn get_pending(&self) -> String {
        match self.editor.pending() {
            Some(p) => json!({ "source": p.source, "x": p.end.x, "y": p.end.y }).to_string(),
            None => "null".to_string(),
        }
    }

    /// Drain notices for the toast area. JSON array.
    pub fn take_notices(&mut self) -> String {
        serde_json::to_string(&self.editor.take_notices()).unwrap_or_else(|_| "[]".to_string())
    }

    /// Drain scene events since the last call. JSON array.
    pub fn take_events(&mut self) -> String {
        let events = std::mem::take(&mut *self.events.borrow_mut());
        serde_json::to_string(&events).unwrap_or_else(|_| "[]".to_string())
    }

    // ─── Command surface ─────────────────────────────────────────────────
    //
    // Each command returns `{"ok":true,...}` or `{"ok":false,"error":"..."}`.

    pub fn add_node(&mut self, spec_json: &str) -> String {
        let input: NodeInput = match serde_json::from_str(spec_json) {
            Ok(input) => input,
            Err(e) => return err_json(e),
        };
        let mut spec = NodeSpec::at(input.x, input.y).with_text(input.text);
        spec.id = input.id.as_deref().map(NodeId::intern);
        spec.shape = input.shape.unwrap_or_else(|| {
            self.editor.default_node_spec(Point::new(input.x, input.y)).shape
        });
        spec.style = input.style.unwrap_or_default();
        spec.image = input.image;
        match self.editor.add_node(spec) {
            Ok(id) => json!({ "ok": true, "id": id }).to_string(),
            Err(e) => err_json(e),
        }
    }

    /// `ids_json` is an array of node ids. Reports the cascaded connections.
    pub fn delete_nodes(&mut self, ids_json: &str) -> String {
        let ids: Vec<NodeId> = match serde_json::from_str(ids_json) {
            Ok(ids) => ids,
            Err(e) => return err_json(e),
        };
        match self.editor.delete_nodes(&ids) {
            Ok(cascaded) => json!({ "ok": true, "cascaded": cascaded }).to_string(),
            Err(e) => err_json(e),
        }
    }

    /// Returns the existing id when the pair is already connected.
    pub fn add_connection(&mut self, a: &str, b: &str) -> String {
        match self
            .editor
            .add_connection(NodeId::intern(a), NodeId::intern(b))
        {
            Ok(id) => json!({ "ok": true, "id": id }).to_string(),
            Err(e) => err_json(e),
        }
    }

    pub fn delete_connection(&mut self, id: &str) -> String {
        envelope(self.editor.delete_connection(ConnectionId::intern(id)))
    }

    /// `points_json`: `[{"x":..,"y":..}, ...]`, at most two.
    pub fn set_control_points(&mut self, id: &str, points_json: &str) -> String {
        let points: Vec<PointInput> = match serde_json::from_str(points_json) {
            Ok(points) => points,
            Err(e) => return err_json(e),
        };
        let points = points.into_iter().map(|p| Point::new(p.x, p.y)).collect();
        envelope(
            self.editor
                .set_control_points(ConnectionId::intern(id), points),
        )
    }

    pub fn set_viewport(&mut self, x: f64, y: f64, zoom: f64) {
        self.editor.set_viewport(Point::new(x, y), zoom);
    }

    /// `{"x":..,"y":..,"zoom":..,"visible":{x,y,width,height}}`; `visible`
    /// is the world rectangle currently on screen.
    pub fn get_viewport(&self) -> String {
        let vp = self.editor.viewport();
        let visible = vp.visible_world_rect();
        json!({
            "x": vp.origin.x,
            "y": vp.origin.y,
            "zoom": vp.zoom,
            "visible": {
                "x": visible.x0,
                "y": visible.y0,
                "width": visible.width(),
                "height": visible.height(),
            },
        })
        .to_string()
    }

    pub fn update_node_style(&mut self, id: &str, patch_json: &str) -> String {
        let patch: StylePatch = match serde_json::from_str(patch_json) {
            Ok(patch) => patch,
            Err(e) => return err_json(e),
        };
        self.mutate(Mutation::UpdateNodeStyle {
            id: NodeId::intern(id),
            patch,
        })
    }

    pub fn update_node_shape(&mut self, id: &str, patch_json: &str) -> String {
        let patch: ShapePatch = match serde_json::from_str(patch_json) {
            Ok(patch) => patch,
            Err(e) => return err_json(e),
        };
        self.mutate(Mutation::UpdateNodeShape {
            id: NodeId::intern(id),
            patch,
        })
    }

    pub fn set_node_text(&mut self, id: &str, text: &str) -> String {
        self.mutate(Mutation::SetNodeText {
            id: NodeId::intern(id),
            text: text.to_string(),
        })
    }

    /// `image_json`: `{"href":"...","opacity":..}` or `null` to clear.
    pub fn set_node_image(&mut self, id: &str, image_json: &str) -> String {
        let image: Option<ImageOverlay> = match serde_json::from_str(image_json) {
            Ok(image) => image,
            Err(e) => return err_json(e),
        };
        self.mutate(Mutation::SetNodeImage {
            id: NodeId::intern(id),
            image,
        })
    }

    pub fn bring_to_front(&mut self, id: &str) -> String {
        self.mutate(Mutation::BringToFront(NodeId::intern(id)))
    }

    /// Empty `label` clears it.
    pub fn set_connection_label(&mut self, id: &str, label: &str) -> String {
        self.mutate(Mutation::SetConnectionLabel {
            id: ConnectionId::intern(id),
            label: (!label.is_empty()).then(|| label.to_string()),
        })
    }

    pub fn update_connection_style(&mut self, id: &str, style_json: &str) -> String {
        let style: ConnectionStyle = match serde_json::from_str(style_json) {
            Ok(style) => style,
            Err(e) => return err_json(e),
        };
        self.mutate(Mutation::UpdateConnectionStyle {
            id: ConnectionId::intern(id),
            style,
        })
    }

    pub fn select_nodes(&mut self, ids_json: &str) -> bool {
        match serde_json::from_str::<Vec<NodeId>>(ids_json) {
            Ok(ids) => {
                self.editor.select_nodes(&ids);
                true
            }
            Err(e) => {
                log::debug!("select_nodes: {e}");
                false
            }
        }
    }

    pub fn clear(&mut self) {
        self.editor.clear();
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// `{"ok":true,"scene":{...}}`
    pub fn export_json(&self) -> String {
        match self.editor.export_json() {
            Ok(scene) => format!(r#"{{"ok":true,"scene":{scene}}}"#),
            Err(e) => err_json(e),
        }
    }

    /// All-or-nothing: on error the current scene is untouched.
    pub fn import_json(&mut self, json: &str) -> String {
        envelope(self.editor.import_json(json))
    }

    /// MessagePack snapshot for the history collaborator.
    pub fn snapshot(&self) -> Result<js_sys::Uint8Array, JsValue> {
        self.editor
            .snapshot()
            .map(|bytes| js_sys::Uint8Array::from(bytes.as_slice()))
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn apply_state(&mut self, snapshot: &[u8]) -> String {
        envelope(self.editor.apply_state(snapshot))
    }
}

impl LbCanvas {
    fn build(config: EditorConfig, width: f64, height: f64) -> Self {
        console_error_panic_hook_setup();
        let editor = Editor::new(config, width, height);
        let events: Rc<RefCell<Vec<SceneEvent>>> = Rc::default();
        let sink = events.clone();
        let subscription = editor
            .events()
            .subscribe(move |event| sink.borrow_mut().push(event.clone()));
        Self {
            editor,
            events,
            _subscription: subscription,
        }
    }

    fn mutate(&mut self, mutation: Mutation) -> String {
        envelope(self.editor.apply(mutation).map(|_| ()))
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }
}

fn modifiers(shift: bool, ctrl: bool, alt: bool, meta: bool) -> Modifiers {
    Modifiers {
        ctrl,
        shift,
        alt,
        meta,
    }
}

fn envelope(result: Result<(), SceneError>) -> String {
    match result {
        Ok(()) => r#"{"ok":true}"#.to_string(),
        Err(e) => err_json(e),
    }
}

fn err_json(e: impl std::fmt::Display) -> String {
    json!({ "ok": false, "error": e.to_string() }).to_string()
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("Linkboard WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone functions (no canvas needed) ─────────────────────────────

/// Validate exchange JSON without loading it.
/// Returns `{"ok":true,"nodes":n,"connections":m}` or `{"ok":false,"error":"..."}`.
#[wasm_bindgen]
pub fn validate_scene(json: &str) -> String {
    match SceneDocument::from_json(json).and_then(|doc| doc.validate().map(|()| doc)) {
        Ok(doc) => json!({
            "ok": true,
            "nodes": doc.nodes.len(),
            "connections": doc.connections.len(),
        })
        .to_string(),
        Err(e) => err_json(e),
    }
}
