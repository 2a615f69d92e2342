pub mod hit;
pub mod svg;
pub mod tree;

pub use hit::{Hit, HitTolerances, hit_test, node_under, nodes_in_rect};
pub use svg::{export_svg, render_svg};
pub use tree::{OverlayState, RenderOptions, RenderTree, build_tree};
