//! Local rewrites applied as nodes are built.
//!
//! `peephole` computes the node's type, replaces any non-constant node whose
//! type names a single value with a Constant, then tries the idealize rules.
//! The original node is collected when the rewrite leaves it unused.

use crate::ir::{CmpOp, Graph, NodeId, Op};
use crate::types::{Int, Obj, Ptr, Type, TypeStore};
use crate::types::Ty;

impl<'t> Graph<'t> {
    /// Canonicalize a freshly built (or rewired) node. Returns the node to
    /// use in its place, which may be the node itself.
    pub fn peephole(&mut self, node: NodeId, types: &TypeStore<'t>) -> NodeId {
        let ty = self.compute(node, types);
        self.ty[node.index()] = Some(ty);

        if self.disable_peephole {
            return node;
        }

        if !matches!(self[node], Op::Constant(_)) && ty.is_constant() {
            let start = self.start;
            let con = self.add(Op::Constant(ty), vec![Some(start)]);
            let con = self.peephole(con, types);
            return self.dce(node, con);
        }

        if let Some(better) = self.idealize(node, types) {
            let better = self.peephole(better, types);
            return self.dce(node, better);
        }

        node
    }

    /// Worklist variant: returns a replacement only when progress was made.
    pub(super) fn peephole_opt(&mut self, node: NodeId, types: &TypeStore<'t>) -> Option<NodeId> {
        let ty = self.compute(node, types);
        self.ty[node.index()] = Some(ty);

        if !matches!(self[node], Op::Constant(_)) && ty.is_constant() {
            let start = self.start;
            let con = self.add(Op::Constant(ty), vec![Some(start)]);
            return Some(self.peephole(con, types));
        }

        let better = self.idealize(node, types)?;
        Some(self.peephole(better, types))
    }

    fn dce(&mut self, old: NodeId, new: NodeId) -> NodeId {
        if new != old && self.is_unused(old) {
            self.keep(new);
            self.kill(old);
            self.unkeep(new);
        }
        new
    }

    fn input_ty(&self, node: NodeId, index: usize) -> Option<Ty<'t>> {
        self.inputs[node.index()][index].and_then(|n| self.ty[n.index()])
    }

    fn compute(&self, node: NodeId, types: &TypeStore<'t>) -> Ty<'t> {
        match &self[node] {
            Op::Constant(ty) => *ty,
            Op::Start { args } => *args,
            Op::Stop => types.bot,
            Op::Return => {
                let ctrl = self.input_ty(node, 0).unwrap_or(types.bot);
                let data = self.input_ty(node, 1).unwrap_or(types.bot);
                types.tuple(&[ctrl, data])
            }
            Op::Add => self.compute_binary(node, types, i64::wrapping_add),
            Op::Sub => self.compute_binary(node, types, i64::wrapping_sub),
            Op::Mul => self.compute_binary(node, types, i64::wrapping_mul),
            Op::Div => self.compute_binary(node, types, |a, b| {
                if b == 0 {
                    0
                } else {
                    a.wrapping_div(b)
                }
            }),
            Op::Cmp(op) => {
                self.compute_binary(node, types, |a, b| op.compute(a, b) as i64)
            }
            Op::Minus => match self.input_ty(node, 1).as_deref() {
                Some(Type::Int(Int::Constant(v))) => types.int(v.wrapping_neg()),
                Some(Type::Int(_)) => types.int_bot,
                _ => types.bot,
            },
            Op::Not => match self.input_ty(node, 1).as_deref() {
                Some(Type::Int(Int::Constant(0))) => types.int_one,
                Some(Type::Int(Int::Constant(_))) => types.int_zero,
                Some(Type::Int(_)) => types.int_bot,
                // !null is true, !ptr is false; a maybe-null pointer is unknown.
                Some(Type::Ptr(Ptr { to: Obj::Top, nil: true })) => types.int_one,
                Some(Type::Ptr(Ptr { nil: false, .. })) => types.int_zero,
                Some(Type::Ptr(_)) => types.int_bot,
                _ => types.bot,
            },
            Op::If => {
                // A dead test produces no live projections.
                if self.input_ty(node, 0) == Some(types.xctrl) {
                    return types.if_neither;
                }
                match self.input_ty(node, 1).as_deref() {
                    Some(Type::Int(Int::Constant(0))) => types.if_false,
                    Some(Type::Int(Int::Constant(_))) => types.if_true,
                    Some(Type::Ptr(Ptr { to: Obj::Top, nil: true })) => types.if_false,
                    _ => types.if_both,
                }
            }
            Op::Proj { index, .. } => match self.input_ty(node, 0).as_deref() {
                Some(Type::Tuple(elems)) => elems[*index],
                _ => types.bot,
            },
            Op::Region => self.compute_region(node, types),
            Op::Loop { pending } => {
                if *pending {
                    types.ctrl
                } else {
                    self.compute_region(node, types)
                }
            }
            Op::Phi { .. } => {
                if self.in_progress(node) {
                    return types.bot;
                }
                let mut ty = types.top;
                for i in 1..self.inputs[node.index()].len() {
                    let t = self.input_ty(node, i).unwrap_or(types.bot);
                    ty = types.meet(ty, t);
                }
                ty
            }
            Op::New(ptr) => *ptr,
            Op::Load { ty, .. } => *ty,
            Op::Store { alias, .. } => types.mem(*alias),
        }
    }

    fn compute_region(&self, node: NodeId, types: &TypeStore<'t>) -> Ty<'t> {
        let mut ty = types.xctrl;
        for i in 1..self.inputs[node.index()].len() {
            let t = self.input_ty(node, i).unwrap_or(types.ctrl);
            ty = types.meet(ty, t);
        }
        ty
    }

    fn compute_binary<F: Fn(i64, i64) -> i64>(
        &self,
        node: NodeId,
        types: &TypeStore<'t>,
        op: F,
    ) -> Ty<'t> {
        let Some(lhs) = self.input_ty(node, 1) else {
            return types.bot;
        };
        let Some(rhs) = self.input_ty(node, 2) else {
            return types.bot;
        };
        match (&*lhs, &*rhs) {
            (Type::Int(Int::Constant(a)), Type::Int(Int::Constant(b))) => types.int(op(*a, *b)),
            (Type::Int(_), Type::Int(_)) => types.meet(lhs, rhs),
            _ => types.bot,
        }
    }

    /// Shape rewrites. Returns a replacement node; the caller peepholes it.
    fn idealize(&mut self, node: NodeId, types: &TypeStore<'t>) -> Option<NodeId> {
        match &self[node] {
            Op::Add => self.idealize_add(node, types),
            Op::Sub => self.idealize_sub(node, types),
            Op::Mul => self.idealize_mul(node),
            Op::Div => self.idealize_div(node),
            Op::Minus => self.idealize_minus(node),
            Op::Cmp(op) => self.idealize_cmp(*op, node, types),
            Op::Phi { .. } => self.idealize_phi(node, types),
            Op::Region | Op::Loop { .. } => self.idealize_region(node, types),
            Op::Proj { index, .. } => self.idealize_proj(node, *index, types),
            Op::Load { .. } => self.idealize_load(node),
            _ => None,
        }
    }

    fn idealize_add(&mut self, node: NodeId, types: &TypeStore<'t>) -> Option<NodeId> {
        let lhs = self.inputs[node.index()][1]?;
        let rhs = self.inputs[node.index()][2]?;
        let t1 = self.ty[lhs.index()]?;
        let t2 = self.ty[rhs.index()]?;

        // x + 0
        if t2 == types.int_zero {
            return Some(lhs);
        }

        // x + x becomes x * 2
        if lhs == rhs {
            let two = self.add(Op::Constant(types.int_two), vec![Some(self.start)]);
            let two = self.peephole(two, types);
            return Some(self.add(Op::Mul, vec![None, Some(lhs), Some(two)]));
        }

        // Constants go right so the folds below see them in one place.
        if t1.is_constant() && !t2.is_constant() {
            return Some(self.swap_12(node));
        }

        // (x + c1) + c2 becomes x + (c1 + c2), which then folds.
        if t2.is_constant() && matches!(self[lhs], Op::Add) {
            let c1 = self.inputs[lhs.index()][2]?;
            if self.ty[c1.index()]?.is_constant() {
                let x = self.inputs[lhs.index()][1]?;
                let folded = self.add(Op::Add, vec![None, Some(c1), Some(rhs)]);
                let folded = self.peephole(folded, types);
                return Some(self.add(Op::Add, vec![None, Some(x), Some(folded)]));
            }
        }

        None
    }

    fn idealize_sub(&mut self, node: NodeId, types: &TypeStore<'t>) -> Option<NodeId> {
        let lhs = self.inputs[node.index()][1]?;
        let rhs = self.inputs[node.index()][2]?;
        if lhs == rhs {
            let zero = self.add(Op::Constant(types.int_zero), vec![Some(self.start)]);
            return Some(zero);
        }
        if self.ty[rhs.index()] == Some(types.int_zero) {
            return Some(lhs);
        }
        None
    }

    fn idealize_mul(&mut self, node: NodeId) -> Option<NodeId> {
        let lhs = self.inputs[node.index()][1]?;
        let rhs = self.inputs[node.index()][2]?;
        let t1 = self.ty[lhs.index()]?;
        let t2 = self.ty[rhs.index()]?;

        if matches!(*t2, Type::Int(Int::Constant(1))) {
            return Some(lhs);
        }
        if t1.is_constant() && !t2.is_constant() {
            return Some(self.swap_12(node));
        }
        None
    }

    fn idealize_div(&mut self, node: NodeId) -> Option<NodeId> {
        let rhs = self.inputs[node.index()][2]?;
        if matches!(*self.ty[rhs.index()]?, Type::Int(Int::Constant(1))) {
            return self.inputs[node.index()][1];
        }
        None
    }

    fn idealize_minus(&mut self, node: NodeId) -> Option<NodeId> {
        let input = self.inputs[node.index()][1]?;
        if matches!(self[input], Op::Minus) {
            return self.inputs[input.index()][1];
        }
        None
    }

    fn idealize_cmp(&mut self, op: CmpOp, node: NodeId, types: &TypeStore<'t>) -> Option<NodeId> {
        let lhs = self.inputs[node.index()][1]?;
        let rhs = self.inputs[node.index()][2]?;
        if lhs == rhs {
            // x==x and x<=x hold, x<x does not.
            let value = if op.compute(3, 3) {
                types.int_one
            } else {
                types.int_zero
            };
            let con = self.add(Op::Constant(value), vec![Some(self.start)]);
            return Some(con);
        }
        None
    }

    fn idealize_phi(&mut self, node: NodeId, types: &TypeStore<'t>) -> Option<NodeId> {
        if self.in_progress(node) {
            return None;
        }
        let region = self.inputs[node.index()][0]?;
        if !matches!(self[region], Op::Region | Op::Loop { .. }) || self.in_progress(region) {
            return None;
        }

        // Phi(x, x) is x.
        let first = self.inputs[node.index()][1];
        if first.is_some()
            && self.inputs[node.index()][2..].iter().all(|&i| i == first)
        {
            return first;
        }

        // A φ whose other operands are dead or itself folds to its one live
        // input.
        let mut live = None;
        for i in 1..self.inputs[node.index()].len() {
            let pred = self.inputs[region.index()][i]?;
            if self.ty[pred.index()] == Some(types.xctrl) {
                continue;
            }
            if self.inputs[node.index()][i] == Some(node) {
                continue;
            }
            match live {
                None => live = self.inputs[node.index()][i],
                Some(l) if Some(l) == self.inputs[node.index()][i] => {}
                _ => return None,
            }
        }
        live
    }

    fn idealize_region(&mut self, node: NodeId, types: &TypeStore<'t>) -> Option<NodeId> {
        if self.in_progress(node) {
            return None;
        }
        // Collapse a region with a single live predecessor, unless φs still
        // index its predecessor list.
        if self.outputs[node.index()]
            .iter()
            .any(|&u| u != NodeId::KEEP && matches!(self[u], Op::Phi { .. }))
        {
            return None;
        }
        let mut live = None;
        for i in 1..self.inputs[node.index()].len() {
            let pred = self.inputs[node.index()][i]?;
            if self.ty[pred.index()] == Some(types.xctrl) {
                continue;
            }
            if live.is_some() {
                return None;
            }
            live = Some(pred);
        }
        live
    }

    fn idealize_proj(&mut self, node: NodeId, index: usize, types: &TypeStore<'t>) -> Option<NodeId> {
        let parent = self.inputs[node.index()][0]?;
        if !matches!(self[parent], Op::If) {
            return None;
        }
        // When the other arm of the test is dead, this projection is the
        // test's incoming control.
        if let Some(Type::Tuple(elems)) = self.ty[parent.index()].as_deref() {
            if elems[1 - index] == types.xctrl && elems[index] == types.ctrl {
                return self.inputs[parent.index()][0];
            }
        }
        None
    }

    fn idealize_load(&mut self, node: NodeId) -> Option<NodeId> {
        let Op::Load { alias, .. } = self[node] else {
            return None;
        };
        let mem = self.inputs[node.index()][1]?;
        let ptr = self.inputs[node.index()][2]?;
        // A load straight after a store to the same field through the same
        // pointer is the stored value.
        if let Op::Store { alias: st_alias, .. } = self[mem] {
            if st_alias == alias && self.inputs[mem.index()][2] == Some(ptr) {
                return self.inputs[mem.index()][3];
            }
        }
        None
    }
}
