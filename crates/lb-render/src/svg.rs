//! Render tree → SVG markup.
//!
//! `render_svg` draws what the viewport shows (group transform included,
//! overlays on top). `export_svg` fits the whole scene with a margin and
//! leaves interaction overlays out.

use crate::tree::{
    Bounds, ConnectionVisual, NodeVisual, OverlayState, Overlays, Primitive, RenderOptions,
    RenderTree, TextVisual, build_tree,
};
use lb_core::curve::num;
use lb_core::{Color, SceneStore, Viewport};
use std::fmt::Write as _;

const EXPORT_PADDING: f64 = 16.0;
const ACCENT: &str = "#4F7CFF";

fn svg_color(c: &Color) -> String {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    if (c.a - 1.0).abs() < f32::EPSILON {
        format!("#{:02X}{:02X}{:02X}", channel(c.r), channel(c.g), channel(c.b))
    } else {
        format!(
            "rgba({}, {}, {}, {})",
            channel(c.r),
            channel(c.g),
            channel(c.b),
            c.a
        )
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// SVG of the current view.
pub fn render_svg(tree: &RenderTree) -> String {
    let mut svg = String::new();
    let _ = writeln!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">",
        w = num(tree.width),
        h = num(tree.height)
    );
    svg.push_str("<style>\n  text { font-family: Inter, system-ui, sans-serif; }\n</style>\n");
    let [a, b, c, d, e, f] = tree.transform;
    let _ = writeln!(
        svg,
        "<g transform=\"matrix({} {} {} {} {} {})\">",
        num(a),
        num(b),
        num(c),
        num(d),
        num(e),
        num(f)
    );
    write_scene(&mut svg, &tree.connections, &tree.nodes);
    write_overlays(&mut svg, &tree.overlays);
    svg.push_str("</g>\n</svg>");
    svg
}

/// Standalone SVG of the whole scene, cropped to its content.
pub fn export_svg(store: &SceneStore) -> String {
    let content = store
        .nodes()
        .map(|n| n.bounds())
        .reduce(|acc, r| acc.union(r))
        .unwrap_or(kurbo::Rect::new(0.0, 0.0, 800.0, 600.0));
    let area = content.inflate(EXPORT_PADDING, EXPORT_PADDING);

    let mut viewport = Viewport::new(area.width(), area.height());
    viewport.set(area.origin(), 1.0);
    let tree = build_tree(
        store,
        &viewport,
        &OverlayState::default(),
        &RenderOptions::default(),
    );
    render_svg(&tree)
}

fn write_scene(out: &mut String, connections: &[ConnectionVisual], nodes: &[NodeVisual]) {
    for conn in connections {
        write_connection(out, conn);
    }
    for node in nodes {
        write_node(out, node);
    }
}

fn write_connection(out: &mut String, conn: &ConnectionVisual) {
    let dash = if conn.dashed {
        " stroke-dasharray=\"6 4\""
    } else {
        ""
    };
    let _ = writeln!(
        out,
        "  <path data-id=\"{}\" d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"{dash} />",
        escape(conn.id.as_str()),
        conn.d,
        svg_color(&conn.stroke),
        conn.stroke_width
    );
    // Transparent, wider stroke for pointer hits.
    let _ = writeln!(
        out,
        "  <path data-hit=\"{}\" d=\"{}\" fill=\"none\" stroke=\"transparent\" stroke-width=\"{}\" />",
        escape(conn.id.as_str()),
        conn.d,
        num(conn.hit_width)
    );
    if let Some(label) = &conn.label {
        write_text(out, label);
    }
}

fn write_node(out: &mut String, node: &NodeVisual) {
    let paint = format!(
        "fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"",
        svg_color(&node.fill),
        svg_color(&node.stroke),
        node.stroke_width
    );
    let id = escape(node.id.as_str());
    let _ = match &node.primitive {
        Primitive::Ellipse { cx, cy, rx, ry } => writeln!(
            out,
            "  <ellipse data-id=\"{id}\" cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" {paint} />",
            num(*cx),
            num(*cy),
            num(*rx),
            num(*ry)
        ),
        Primitive::Rect {
            x,
            y,
            width,
            height,
            corner_radius,
        } => writeln!(
            out,
            "  <rect data-id=\"{id}\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{r}\" ry=\"{r}\" {paint} />",
            num(*x),
            num(*y),
            num(*width),
            num(*height),
            r = num(*corner_radius)
        ),
        Primitive::Polygon { points } => {
            let pts: Vec<String> = points
                .iter()
                .map(|[x, y]| format!("{},{}", num(*x), num(*y)))
                .collect();
            writeln!(
                out,
                "  <polygon data-id=\"{id}\" points=\"{}\" {paint} />",
                pts.join(" ")
            )
        }
    };
    if let Some(img) = &node.image {
        let b = img.bounds;
        let _ = writeln!(
            out,
            "  <image href=\"{}\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" opacity=\"{}\" preserveAspectRatio=\"xMidYMid slice\" />",
            escape(&img.href),
            num(b.x),
            num(b.y),
            num(b.width),
            num(b.height),
            img.opacity
        );
    }
    write_text(out, &node.text);
}

fn write_text(out: &mut String, text: &TextVisual) {
    if text.lines.is_empty() {
        return;
    }
    // Vertically center the block on the anchor.
    let total = text.lines.len() as f64 * text.line_height;
    let mut y = text.y - total / 2.0 + text.line_height / 2.0;
    for line in &text.lines {
        let _ = writeln!(
            out,
            "  <text x=\"{}\" y=\"{}\" font-size=\"{}\" font-weight=\"{}\" fill=\"{}\" text-anchor=\"middle\" dominant-baseline=\"central\">{}</text>",
            num(text.x),
            num(y),
            text.font_size,
            text.font_weight,
            svg_color(&text.color),
            escape(line)
        );
        y += text.line_height;
    }
}

fn rect_attrs(b: &Bounds) -> String {
    format!(
        "x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\"",
        num(b.x),
        num(b.y),
        num(b.width),
        num(b.height)
    )
}

fn write_overlays(out: &mut String, overlays: &Overlays) {
    for b in &overlays.selection {
        let _ = writeln!(
            out,
            "  <rect class=\"selection\" {} fill=\"none\" stroke=\"{ACCENT}\" vector-effect=\"non-scaling-stroke\" />",
            rect_attrs(b)
        );
    }
    for h in &overlays.handles {
        let _ = writeln!(
            out,
            "  <circle class=\"handle\" cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"#FFFFFF\" stroke=\"{ACCENT}\" vector-effect=\"non-scaling-stroke\" />",
            num(h.x),
            num(h.y),
            num(h.radius)
        );
    }
    if let Some(d) = &overlays.preview {
        let _ = writeln!(
            out,
            "  <path class=\"preview\" d=\"{d}\" fill=\"none\" stroke=\"{ACCENT}\" stroke-dasharray=\"4 4\" vector-effect=\"non-scaling-stroke\" />"
        );
    }
    if let Some(p) = &overlays.pending {
        let _ = writeln!(
            out,
            "  <path class=\"pending\" d=\"{}\" fill=\"none\" stroke=\"{ACCENT}\" stroke-dasharray=\"4 4\" vector-effect=\"non-scaling-stroke\" />",
            p.d
        );
        let _ = writeln!(
            out,
            "  <circle class=\"pending\" cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{ACCENT}\" fill-opacity=\"0.2\" stroke=\"{ACCENT}\" vector-effect=\"non-scaling-stroke\" />",
            num(p.x),
            num(p.y),
            num(p.radius)
        );
    }
    if let Some(m) = &overlays.marquee {
        let _ = writeln!(
            out,
            "  <rect class=\"marquee\" {} fill=\"{ACCENT}\" fill-opacity=\"0.08\" stroke=\"{ACCENT}\" vector-effect=\"non-scaling-stroke\" />",
            rect_attrs(m)
        );
    }
}
