//! End-to-end pointer and keyboard flows driven through `Editor::handle`.

use lb_core::{NodeSpec, Point, SceneEvent, Shape, ShapeKind};
use lb_editor::{Editor, EditorConfig, InputEvent, InteractionKind, Modifiers, PointerButton};
use lb_render::tree::LabelTarget;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn editor() -> Editor {
    Editor::new(EditorConfig::default(), 800.0, 600.0)
}

fn click(ed: &mut Editor, x: f64, y: f64) {
    ed.handle(&InputEvent::down(1, x, y));
    ed.handle(&InputEvent::up(1, x, y));
}

fn drag(ed: &mut Editor, from: (f64, f64), to: (f64, f64)) {
    ed.handle(&InputEvent::down(1, from.0, from.1));
    ed.handle(&InputEvent::moved(1, to.0, to.1));
    ed.handle(&InputEvent::up(1, to.0, to.1));
}

/// Two default rectangles on a horizontal line and the connection between
/// them. The trunk runs from (160, 300) to (640, 300).
fn connected_pair(ed: &mut Editor) -> lb_core::ConnectionId {
    let a = ed.add_node(NodeSpec::at(100.0, 300.0)).unwrap();
    let b = ed.add_node(NodeSpec::at(700.0, 300.0)).unwrap();
    ed.add_connection(a, b).unwrap()
}

fn point_count(ed: &Editor, c: lb_core::ConnectionId) -> usize {
    ed.store().connection(c).unwrap().control_points.len()
}

#[test]
fn trunk_clicks_add_then_click_near_point_removes() {
    let mut ed = editor();
    let c = connected_pair(&mut ed);

    click(&mut ed, 300.0, 300.0);
    assert_eq!(point_count(&ed, c), 1);
    click(&mut ed, 500.0, 300.0);
    assert_eq!(point_count(&ed, c), 2);

    click(&mut ed, 505.0, 302.0);
    assert_eq!(point_count(&ed, c), 1);
    let remaining = ed.store().connection(c).unwrap().control_points[0].position;
    assert!((remaining - Point::new(300.0, 300.0)).hypot() < 1e-6);
    assert!(ed.interaction().is_idle());
}

#[test]
fn trunk_click_at_capacity_raises_notice_and_stays_idle() {
    let mut ed = editor();
    let c = connected_pair(&mut ed);
    click(&mut ed, 300.0, 300.0);
    click(&mut ed, 500.0, 300.0);
    ed.take_notices();

    ed.handle(&InputEvent::down(1, 400.0, 300.0));
    assert_eq!(ed.interaction_kind(), InteractionKind::Idle);
    ed.handle(&InputEvent::up(1, 400.0, 300.0));

    assert_eq!(point_count(&ed, c), 2);
    let notices = ed.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.contains("control point limit"));
}

#[test]
fn dragging_a_control_point_moves_it() {
    let mut ed = editor();
    let c = connected_pair(&mut ed);
    click(&mut ed, 300.0, 300.0);

    drag(&mut ed, (300.0, 300.0), (320.0, 200.0));
    let conn = ed.store().connection(c).unwrap();
    assert_eq!(conn.control_points.len(), 1);
    assert_eq!(conn.control_points[0].position, Point::new(320.0, 200.0));
    assert_eq!(ed.selection().connection, Some(c));
}

#[test]
fn cancelling_a_fresh_control_point_removes_it() {
    let mut ed = editor();
    let c = connected_pair(&mut ed);
    ed.handle(&InputEvent::down(1, 300.0, 300.0));
    assert_eq!(point_count(&ed, c), 1);
    ed.handle(&InputEvent::PointerCancel { pointer: 1 });
    assert_eq!(point_count(&ed, c), 0);
}

#[test]
fn ring_drag_onto_another_node_connects_them() {
    let mut ed = editor();
    let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
    let b = ed.add_node(NodeSpec::at(400.0, 100.0)).unwrap();

    ed.handle(&InputEvent::down(1, 170.0, 100.0));
    assert_eq!(ed.interaction_kind(), InteractionKind::CreatingConnection);
    ed.handle(&InputEvent::moved(1, 300.0, 100.0));
    assert!(ed.render_tree().overlays.preview.is_some());
    ed.handle(&InputEvent::up(1, 400.0, 100.0));

    assert_eq!(ed.store().connection_count(), 1);
    assert!(ed.store().connection_between(b, a).is_some());
    assert!(ed.render_tree().overlays.preview.is_none());
}

#[test]
fn ring_drag_released_over_source_is_discarded() {
    let mut ed = editor();
    ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
    drag(&mut ed, (170.0, 100.0), (100.0, 100.0));
    assert_eq!(ed.store().connection_count(), 0);
    assert!(ed.pending().is_none());
}

#[test]
fn pending_connection_confirm_creates_one_node_and_one_connection() {
    let mut ed = editor();
    let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();

    drag(&mut ed, (170.0, 100.0), (400.0, 400.0));
    assert_eq!(ed.store().node_count(), 1);
    assert_eq!(ed.store().connection_count(), 0);
    let pending = ed.pending().copied().unwrap();
    assert_eq!(pending.source, a);
    assert!(ed.render_tree().overlays.pending.is_some());

    click(&mut ed, 405.0, 402.0);
    assert_eq!(ed.store().node_count(), 2);
    assert_eq!(ed.store().connection_count(), 1);
    assert!(ed.pending().is_none());

    let created = ed.selection().nodes[0];
    assert_eq!(ed.store().node(created).unwrap().position, Point::new(400.0, 400.0));
    assert!(ed.store().connection_between(a, created).is_some());
}

#[test]
fn escape_discards_pending_without_touching_the_store() {
    let mut ed = editor();
    ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
    drag(&mut ed, (170.0, 100.0), (400.0, 400.0));
    assert!(ed.pending().is_some());

    ed.handle(&InputEvent::key("Escape"));
    assert!(ed.pending().is_none());
    assert_eq!(ed.store().node_count(), 1);
    assert_eq!(ed.store().connection_count(), 0);
}

#[test]
fn press_elsewhere_discards_pending() {
    let mut ed = editor();
    ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
    drag(&mut ed, (170.0, 100.0), (400.0, 400.0));

    click(&mut ed, 600.0, 100.0);
    assert!(ed.pending().is_none());
    assert_eq!(ed.store().node_count(), 1);
    assert_eq!(ed.store().connection_count(), 0);
}

#[test]
fn other_pointers_are_ignored_while_captured() {
    let mut ed = editor();
    let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();

    ed.handle(&InputEvent::down(1, 100.0, 100.0));
    ed.handle(&InputEvent::down(2, 600.0, 500.0));
    ed.handle(&InputEvent::moved(2, 700.0, 500.0));
    ed.handle(&InputEvent::up(2, 700.0, 500.0));
    ed.handle(&InputEvent::PointerCancel { pointer: 2 });
    assert_eq!(ed.interaction_kind(), InteractionKind::DraggingNodes);
    assert_eq!(ed.store().node(a).unwrap().position, Point::new(100.0, 100.0));

    ed.handle(&InputEvent::moved(1, 150.0, 120.0));
    ed.handle(&InputEvent::up(1, 150.0, 120.0));
    assert_eq!(ed.store().node(a).unwrap().position, Point::new(150.0, 120.0));
    assert!(ed.interaction().is_idle());
}

#[test]
fn marquee_selects_intersecting_nodes() {
    let mut ed = editor();
    let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
    let b = ed.add_node(NodeSpec::at(300.0, 100.0)).unwrap();
    ed.add_node(NodeSpec::at(600.0, 400.0)).unwrap();

    ed.handle(&InputEvent::down(1, 20.0, 20.0));
    ed.handle(&InputEvent::moved(1, 350.0, 150.0));
    assert!(ed.render_tree().overlays.marquee.is_some());
    ed.handle(&InputEvent::up(1, 350.0, 150.0));

    assert_eq!(ed.selection().nodes, vec![a, b]);
    assert!(ed.render_tree().overlays.marquee.is_none());
}

#[test]
fn click_on_empty_canvas_clears_selection() {
    let mut ed = editor();
    let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
    ed.select_nodes(&[a]);
    click(&mut ed, 700.0, 50.0);
    assert!(ed.selection().is_empty());
}

#[test]
fn escape_cancels_marquee() {
    let mut ed = editor();
    ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
    ed.handle(&InputEvent::down(1, 20.0, 20.0));
    ed.handle(&InputEvent::moved(1, 350.0, 150.0));
    ed.handle(&InputEvent::key("Escape"));
    assert!(ed.interaction().is_idle());
    ed.handle(&InputEvent::up(1, 350.0, 150.0));
    assert!(ed.selection().is_empty());
}

#[test]
fn space_held_pans_instead_of_selecting() {
    let mut ed = editor();
    ed.handle(&InputEvent::key(" "));
    drag(&mut ed, (100.0, 100.0), (140.0, 130.0));
    assert_eq!(ed.viewport().origin, Point::new(-40.0, -30.0));
    ed.handle(&InputEvent::KeyUp {
        key: " ".into(),
        modifiers: Modifiers::NONE,
    });

    ed.handle(&InputEvent::PointerDown {
        pointer: 1,
        x: 10.0,
        y: 10.0,
        button: PointerButton::Primary,
        modifiers: Modifiers::NONE,
    });
    assert_eq!(ed.interaction_kind(), InteractionKind::RectSelecting);
}

#[test]
fn drag_follow_moves_control_points_with_the_midpoint() {
    let mut ed = editor();
    let c = connected_pair(&mut ed);
    click(&mut ed, 400.0, 300.0);
    let before = ed.store().connection(c).unwrap().control_points[0].position;

    // Grab the right-hand node and move it down 100: midpoint moves 50.
    drag(&mut ed, (700.0, 300.0), (700.0, 400.0));
    let after = ed.store().connection(c).unwrap().control_points[0].position;
    assert_eq!(after, before + lb_core::Vec2::new(0.0, 25.0));
}

#[test]
fn double_click_edits_node_text_and_blur_commits() {
    let mut ed = editor();
    let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();

    ed.handle(&InputEvent::DoubleClick { x: 100.0, y: 100.0 });
    assert_eq!(
        ed.label_edit().map(|e| e.target),
        Some(LabelTarget::Node(a))
    );
    assert!(ed.render_tree().overlays.label_editor.is_some());
    ed.handle(&InputEvent::TextInput {
        text: "Hello".into(),
    });

    // Blur: the press commits and does nothing else.
    ed.handle(&InputEvent::down(1, 600.0, 500.0));
    assert!(ed.interaction().is_idle());
    ed.handle(&InputEvent::up(1, 600.0, 500.0));
    assert!(ed.label_edit().is_none());
    assert_eq!(ed.store().node(a).unwrap().text, "Hello");
    assert_eq!(ed.selection().nodes, vec![a]);
}

#[test]
fn escape_discards_label_draft() {
    let mut ed = editor();
    let a = ed
        .add_node(NodeSpec::at(100.0, 100.0).with_text("Keep"))
        .unwrap();
    ed.handle(&InputEvent::DoubleClick { x: 100.0, y: 100.0 });
    ed.handle(&InputEvent::TextInput { text: "X".into() });
    ed.handle(&InputEvent::key("Escape"));
    assert!(ed.label_edit().is_none());
    assert_eq!(ed.store().node(a).unwrap().text, "Keep");
}

#[test]
fn double_click_on_trunk_edits_connection_label() {
    let mut ed = editor();
    let c = connected_pair(&mut ed);
    ed.handle(&InputEvent::DoubleClick { x: 400.0, y: 300.0 });
    assert_eq!(
        ed.label_edit().map(|e| e.target),
        Some(LabelTarget::Connection(c))
    );
    ed.handle(&InputEvent::TextInput { text: "yes".into() });
    ed.handle(&InputEvent::key("Enter"));
    assert_eq!(
        ed.store().connection(c).unwrap().label.as_deref(),
        Some("yes")
    );
}

#[test]
fn gestures_announce_scene_events() {
    let mut ed = editor();
    let seen: Rc<RefCell<Vec<SceneEvent>>> = Rc::default();
    let sink = seen.clone();
    let sub = ed
        .events()
        .subscribe(move |e| sink.borrow_mut().push(e.clone()));

    let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
    drag(&mut ed, (100.0, 100.0), (200.0, 100.0));
    assert_eq!(
        seen.borrow().as_slice(),
        &[
            SceneEvent::NodeAdded(a),
            SceneEvent::NodesMoved(vec![a]),
        ]
    );

    drop(sub);
    drag(&mut ed, (200.0, 100.0), (300.0, 100.0));
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn deleting_a_dragged_node_leaves_the_rest_following() {
    let mut ed = editor();
    let a = ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();
    let b = ed.add_node(NodeSpec::at(300.0, 100.0)).unwrap();
    ed.select_nodes(&[a, b]);

    ed.handle(&InputEvent::down(1, 100.0, 100.0));
    ed.handle(&InputEvent::moved(1, 110.0, 100.0));
    ed.delete_nodes(&[a]).unwrap();
    ed.handle(&InputEvent::moved(1, 200.0, 200.0));
    ed.handle(&InputEvent::up(1, 200.0, 200.0));

    assert!(ed.store().node(a).is_none());
    assert_eq!(ed.store().node(b).unwrap().position, Point::new(400.0, 200.0));
    assert!(ed.interaction().is_idle());
}

#[test]
fn ring_on_a_flat_diamond_follows_its_outline() {
    let mut ed = editor();
    let spec = NodeSpec::at(400.0, 300.0).with_shape(Shape::new(ShapeKind::Diamond, 200.0, 40.0));
    ed.add_node(spec).unwrap();

    // Bottom vertex sits at (400, 320); 70 below it is empty canvas.
    ed.handle(&InputEvent::down(1, 400.0, 390.0));
    assert_eq!(ed.interaction_kind(), InteractionKind::RectSelecting);
    ed.handle(&InputEvent::up(1, 400.0, 390.0));

    ed.handle(&InputEvent::down(1, 400.0, 330.0));
    assert_eq!(ed.interaction_kind(), InteractionKind::CreatingConnection);
}

#[test]
fn escape_during_connection_gesture_leaves_nothing_behind() {
    let mut ed = editor();
    ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();

    ed.handle(&InputEvent::down(1, 170.0, 100.0));
    ed.handle(&InputEvent::moved(1, 400.0, 400.0));
    assert_eq!(ed.interaction_kind(), InteractionKind::CreatingConnection);
    ed.handle(&InputEvent::key("Escape"));
    assert!(ed.interaction().is_idle());
    assert!(ed.render_tree().overlays.preview.is_none());

    ed.handle(&InputEvent::up(1, 400.0, 400.0));
    assert!(ed.pending().is_none());
    assert_eq!(ed.store().node_count(), 1);
    assert_eq!(ed.store().connection_count(), 0);
}

#[test]
fn alt_primary_and_middle_button_pan() {
    let mut ed = editor();
    ed.add_node(NodeSpec::at(100.0, 100.0)).unwrap();

    // Alt over a node still pans.
    ed.handle(&InputEvent::PointerDown {
        pointer: 1,
        x: 100.0,
        y: 100.0,
        button: PointerButton::Primary,
        modifiers: Modifiers {
            alt: true,
            ..Modifiers::NONE
        },
    });
    assert_eq!(ed.interaction_kind(), InteractionKind::PanningCanvas);
    ed.handle(&InputEvent::moved(1, 130.0, 110.0));
    ed.handle(&InputEvent::up(1, 130.0, 110.0));
    assert_eq!(ed.viewport().origin, Point::new(-30.0, -10.0));

    ed.handle(&InputEvent::PointerDown {
        pointer: 2,
        x: 500.0,
        y: 500.0,
        button: PointerButton::Middle,
        modifiers: Modifiers::NONE,
    });
    assert_eq!(ed.interaction_kind(), InteractionKind::PanningCanvas);
    ed.handle(&InputEvent::moved(2, 480.0, 520.0));
    ed.handle(&InputEvent::up(2, 480.0, 520.0));
    assert_eq!(ed.viewport().origin, Point::new(-10.0, -30.0));
    assert_eq!(
        ed.store().nodes().next().map(|n| n.position),
        Some(Point::new(100.0, 100.0))
    );
}

#[test]
fn double_click_at_capacity_raises_one_notice_then_edits_label() {
    let mut ed = editor();
    let c = connected_pair(&mut ed);
    click(&mut ed, 300.0, 300.0);
    click(&mut ed, 500.0, 300.0);
    ed.take_notices();

    click(&mut ed, 400.0, 300.0);
    click(&mut ed, 400.0, 300.0);
    ed.handle(&InputEvent::DoubleClick { x: 400.0, y: 300.0 });

    assert_eq!(ed.take_notices().len(), 1);
    assert_eq!(point_count(&ed, c), 2);
    assert_eq!(
        ed.label_edit().map(|e| e.target),
        Some(LabelTarget::Connection(c))
    );

    // A fresh click after the pair reports again.
    ed.cancel_label_edit();
    click(&mut ed, 400.0, 300.0);
    assert_eq!(ed.take_notices().len(), 1);
}
