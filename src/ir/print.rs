//! Expression-style printing of the program reachable from a node.
//!
//! Used by tests as the oracle: `return (arg+1);`. Regions and loops print
//! as bare labels without node numbers so the printed form is stable under
//! graph renumbering. A node already printed in the current expression
//! prints as its label only (`Phi_x`), which keeps cyclic graphs finite.

use std::cell::RefCell;
use std::fmt::{self, Display};

use crate::ir::{Graph, NodeId, Op};
use crate::types::{Ptr, Type};

pub struct PrintNode<'a, 't> {
    node: Option<NodeId>,
    graph: &'a Graph<'t>,
    visited: &'a RefCell<Vec<bool>>,
}

impl<'t> Graph<'t> {
    pub fn print(&self, node: NodeId) -> String {
        let visited = RefCell::new(vec![false; self.len()]);
        PrintNode {
            node: Some(node),
            graph: self,
            visited: &visited,
        }
        .to_string()
    }
}

impl Display for PrintNode<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(node) = self.node else {
            return write!(f, "____");
        };
        let g = self.graph;

        if g.is_dead(node) {
            return write!(f, "{}:DEAD", node);
        }

        if self.visited.borrow()[node.index()] && !matches!(g[node], Op::Constant(_)) {
            return write!(f, "{}", g[node].label());
        }
        self.visited.borrow_mut()[node.index()] = true;

        let print = |n| PrintNode {
            node: n,
            graph: g,
            visited: self.visited,
        };
        let input = |i| print(g.inputs[node.index()][i]);
        let mut binary = |op: &str| write!(f, "({}{}{})", input(1), op, input(2));

        match &g[node] {
            Op::Add => binary("+"),
            Op::Sub => binary("-"),
            Op::Mul => binary("*"),
            Op::Div => binary("/"),
            Op::Cmp(op) => binary(op.str()),
            Op::Minus => write!(f, "(-{})", input(1)),
            Op::Not => write!(f, "(!{})", input(1)),
            Op::Return => write!(f, "return {};", input(1)),
            Op::Constant(ty) => match **ty {
                // Null constants print as the value, not the pointer type.
                Type::Ptr(Ptr { nil: true, .. }) => write!(f, "null"),
                _ => write!(f, "{ty}"),
            },
            Op::Start { .. } => write!(f, "Start"),
            Op::Stop => {
                if let Some(ret) = g.unique_input(node) {
                    write!(f, "{}", print(Some(ret)))
                } else {
                    write!(f, "Stop[ ")?;
                    for &ret in &g.inputs[node.index()] {
                        write!(f, "{} ", print(ret))?;
                    }
                    write!(f, "]")
                }
            }
            Op::Proj { label, .. } => write!(f, "{label}"),
            Op::If => write!(f, "if( {} )", input(1)),
            Op::Phi { .. } => {
                write!(f, "Phi(")?;
                for (i, &in_) in g.inputs[node.index()].iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", print(in_))?;
                }
                write!(f, ")")
            }
            Op::Region => write!(f, "Region"),
            Op::Loop { .. } => write!(f, "Loop"),
            Op::New(ty) => match **ty {
                Type::Ptr(Ptr { to: crate::types::Obj::Def(sd), .. }) => {
                    write!(f, "new {}", sd.name)
                }
                _ => write!(f, "new"),
            },
            Op::Load { fname, .. } => write!(f, "{}.{fname}", input(2)),
            Op::Store { fname, .. } => write!(f, "{}.{fname}={}", input(2), input(3)),
        }
    }
}
