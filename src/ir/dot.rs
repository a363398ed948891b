//! GraphViz output.
//!
//! Renders the live graph bottom-to-top: control nodes as yellow boxes, φs
//! light yellow, control edges red, memory edges blue, and the back edges
//! of loops and φs unconstrained so the layout does not contort around the
//! cycle. Lexical scopes are not IR nodes; the generator visits the
//! parser's scope stack and draws each frame as a table cluster with dashed
//! edges to the bound nodes.

use std::collections::HashSet;
use std::fmt::Write;

use crate::ir::{Graph, NodeId, Op};
use crate::parse::scope::{ScopeId, Scopes};
use crate::types::Type;

/// Unique dot identifier, e.g. `Add12` or `Region30`.
fn unique_name(g: &Graph, node: NodeId) -> String {
    match &g[node] {
        Op::Constant(_) => format!("Con_{node}"),
        // Strip `$`: graphviz dislikes it in identifiers.
        op => format!("{}{}", op.label().replace('$', ""), node),
    }
}

pub fn generate(
    g: &Graph,
    scopes: &Scopes,
    live_scopes: &[ScopeId],
    source: &str,
) -> String {
    let all = find_all(g, scopes, live_scopes);
    let mut sb = String::new();

    let _ = writeln!(sb, "digraph \"{}\" {{", source.replace('\"', "\\\""));
    let _ = writeln!(sb, "\trankdir=BT;");
    let _ = writeln!(sb, "\tconcentrate=\"true\";");
    nodes(&mut sb, g, &all);
    for &s in live_scopes {
        scope_cluster(&mut sb, g, scopes, s);
    }
    node_edges(&mut sb, g, &all);
    for &s in live_scopes {
        scope_edges(&mut sb, g, scopes, s);
    }
    let _ = writeln!(sb, "}}");
    sb
}

fn nodes(sb: &mut String, g: &Graph, all: &HashSet<NodeId>) {
    let _ = writeln!(sb, "\tsubgraph cluster_Nodes {{");
    for &n in all {
        if matches!(g[n], Op::Proj { .. }) {
            continue;
        }
        let _ = write!(sb, "\t\t{} [ ", unique_name(g, n));
        let lab = g[n].glabel();
        if g[n].is_multi() {
            let _ = writeln!(sb, "shape=plaintext label=<");
            let _ = writeln!(
                sb,
                "\t\t\t<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\" CELLPADDING=\"4\">"
            );
            let _ = writeln!(sb, "\t\t\t<TR><TD BGCOLOR=\"yellow\">{lab}</TD></TR>");
            let _ = write!(sb, "\t\t\t<TR>");
            for &user in &g.outputs[n.index()] {
                if user == NodeId::KEEP {
                    continue;
                }
                if let Op::Proj { index, label } = &g[user] {
                    let color = if g.is_cfg(user) { " BGCOLOR=\"yellow\"" } else { "" };
                    let _ = write!(sb, "<TD PORT=\"p{index}\"{color}>{label}</TD>");
                }
            }
            let _ = writeln!(sb, "</TR>");
            let _ = write!(sb, "\t\t\t</TABLE>>\n\t\t");
        } else {
            if g.is_cfg(n) {
                let _ = write!(sb, "shape=box style=filled fillcolor=yellow ");
            } else if matches!(g[n], Op::Phi { .. }) {
                let _ = write!(sb, "style=filled fillcolor=lightyellow ");
            }
            let _ = write!(sb, "label=\"{lab}\" ");
        }
        let _ = writeln!(sb, "];");
    }

    // Keep each region on a rank with its φs.
    for &n in all {
        if matches!(g[n], Op::Region | Op::Loop { .. }) {
            let _ = write!(sb, "\t\t{{ rank=same; {};", unique_name(g, n));
            for &phi in &g.outputs[n.index()] {
                if phi != NodeId::KEEP && matches!(g[phi], Op::Phi { .. }) {
                    let _ = write!(sb, "{};", unique_name(g, phi));
                }
            }
            let _ = writeln!(sb, "}}");
        }
    }
    let _ = writeln!(sb, "\t}}");
}

fn is_mem(g: &Graph, node: NodeId) -> bool {
    match &g[node] {
        Op::Store { .. } => true,
        Op::Phi { .. } | Op::Proj { .. } => {
            matches!(g.ty[node.index()].as_deref(), Some(Type::Mem(_)))
        }
        _ => false,
    }
}

fn def_name(g: &Graph, def: NodeId) -> String {
    match &g[def] {
        Op::Proj { index, .. } => {
            let parent = g.inputs[def.index()][0].expect("projection without parent");
            format!("{}:p{index}", unique_name(g, parent))
        }
        _ => unique_name(g, def),
    }
}

fn node_edges(sb: &mut String, g: &Graph, all: &HashSet<NodeId>) {
    let _ = writeln!(sb, "\tedge [ fontname=Helvetica, fontsize=8 ];");
    for &n in all {
        if matches!(g[n], Op::Constant(_) | Op::Proj { .. }) {
            continue;
        }
        for (i, def) in g.inputs[n.index()].iter().enumerate() {
            let Some(def) = *def else { continue };

            if matches!(g[n], Op::Phi { .. }) && matches!(g[def], Op::Region | Op::Loop { .. }) {
                let _ = writeln!(
                    sb,
                    "\t{} -> {} [style=dotted taillabel={i}];",
                    unique_name(g, n),
                    unique_name(g, def)
                );
                continue;
            }

            let _ = write!(sb, "\t{} -> {}", unique_name(g, n), def_name(g, def));
            let _ = write!(sb, "[taillabel={i}");
            if matches!(g[n], Op::New(_)) {
                let _ = write!(sb, " color=green");
            } else if g.is_cfg(def) {
                let _ = write!(sb, " color=red");
            } else if is_mem(g, def) {
                let _ = write!(sb, " color=blue");
            }
            if i == 2 && matches!(g[n], Op::Phi { .. } | Op::Loop { .. }) {
                let _ = write!(sb, " constraint=false");
            }
            let _ = writeln!(sb, "];");
        }
    }
}

fn scope_name(s: ScopeId, level: usize) -> String {
    format!("scope{s}_{level}")
}

fn port_name(scope: &str, var: &str) -> String {
    format!("{scope}_{}", var.replace('$', ""))
}

fn scope_cluster(sb: &mut String, _g: &Graph, scopes: &Scopes, s: ScopeId) {
    if scopes.is_dead(s) {
        return;
    }
    let _ = writeln!(sb, "\tnode [shape=plaintext];");
    let depth = scopes.depth(s);
    for level in (0..depth).rev() {
        let name = scope_name(s, level);
        let _ = writeln!(sb, "\tsubgraph cluster_{name} {{");
        let _ = writeln!(sb, "\t\t{name} [label=<");
        let _ = writeln!(
            sb,
            "\t\t\t<TABLE BORDER=\"0\" CELLBORDER=\"1\" CELLSPACING=\"0\">"
        );
        let _ = write!(sb, "\t\t\t<TR><TD BGCOLOR=\"cyan\">{level}</TD>");
        for (var, _) in scopes.frame_bindings(s, level) {
            let port = port_name(&name, var);
            let _ = write!(sb, "<TD PORT=\"{port}\">{var}</TD>");
        }
        let _ = writeln!(sb, "</TR>");
        let _ = writeln!(sb, "\t\t\t</TABLE>>];");
    }
    for _ in 0..depth {
        let _ = writeln!(sb, "\t}}");
    }
}

fn scope_edges(sb: &mut String, g: &Graph, scopes: &Scopes, s: ScopeId) {
    if scopes.is_dead(s) {
        return;
    }
    let _ = writeln!(sb, "\tedge [style=dashed color=cornflowerblue];");
    for level in 0..scopes.depth(s) {
        let name = scope_name(s, level);
        for (var, def) in scopes.frame_bindings(s, level) {
            let port = port_name(&name, var);
            let _ = writeln!(sb, "\t{name}:\"{port}\" -> {};", def_name(g, def));
        }
    }
}

/// Every node reachable from the stop node or a live scope binding; mid
/// parse the stop may reach nothing yet, so the bindings carry the graph.
fn find_all(g: &Graph, scopes: &Scopes, live_scopes: &[ScopeId]) -> HashSet<NodeId> {
    let mut all = HashSet::new();
    if g.stop != NodeId::KEEP && !g.is_dead(g.stop) {
        walk(g, &mut all, g.stop);
    }
    for &s in live_scopes {
        if scopes.is_dead(s) {
            continue;
        }
        for level in 0..scopes.depth(s) {
            for (_, node) in scopes.frame_bindings(s, level) {
                walk(g, &mut all, node);
            }
        }
    }
    all
}

fn walk(g: &Graph, all: &mut HashSet<NodeId>, node: NodeId) {
    if node == NodeId::KEEP || all.contains(&node) || g.is_dead(node) {
        return;
    }
    all.insert(node);
    for &def in g.inputs[node.index()].iter().flatten() {
        walk(g, all, def);
    }
    for &user in &g.outputs[node.index()] {
        walk(g, all, user);
    }
}
