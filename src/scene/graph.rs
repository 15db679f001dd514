//! Graphviz dump of a scene tree, for debugging layering problems.

use super::gizmo::{Gizmo, GizmoRef};
use std::fmt::Write;

fn label(g: &dyn Gizmo) -> String {
    let name = g.type_name().rsplit("::").next().unwrap_or("Gizmo");
    let mut flags = String::new();
    if !g.core().local_alive() {
        flags.push_str(" dead");
    }
    if !g.core().local_active() {
        flags.push_str(" inactive");
    }
    if !g.core().local_visible() {
        flags.push_str(" hidden");
    }
    format!("{name}{flags}")
}

fn node_id(g: &dyn Gizmo) -> usize {
    g as *const dyn Gizmo as *const () as usize
}

fn visit(g: &dyn Gizmo, out: &mut String) {
    let id = node_id(g);
    let _ = writeln!(out, "  n{id:x} [label=\"{}\"];", label(g));
    let Some(container) = g.as_container() else {
        return;
    };
    for child in container.children().snapshot() {
        let _ = writeln!(out, "  n{id:x} -> n{:x};", node_id(&*child));
        visit(&*child, out);
    }
}

/// Renders `root` and its descendants as a DOT digraph. Edges follow child
/// order, back to front.
pub fn to_dot(root: &GizmoRef) -> String {
    let mut out = String::from("digraph scene {\n");
    visit(&**root, &mut out);
    out.push_str("}\n");
    out
}
